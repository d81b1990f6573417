//! TOML configuration.
//!
//! Loaded once by the CLI and passed down; nothing reads it globally.
//! `[store]` and `[docs]` are required, every other section has defaults.
//! See `config/doc-rag.example.toml`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use doc_rag_core::chunk::ChunkerConfig;
use doc_rag_core::retrieve::RetrievalParams;
use doc_rag_core::tokenizer::{DEFAULT_TOKENIZER, KNOWN_TOKENIZERS};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const PROVIDERS: &[&str] = &["ollama", "disabled"];

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub docs: DocsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// SQLite database file.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocsConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.markdown".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_min_tokens")]
    pub min_tokens: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_target_tokens")]
    pub target_tokens: usize,
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_tokens: default_min_tokens(),
            max_tokens: default_max_tokens(),
            target_tokens: default_target_tokens(),
            tokenizer: default_tokenizer(),
        }
    }
}

impl ChunkingConfig {
    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            min_tokens: self.min_tokens,
            max_tokens: self.max_tokens,
            target_tokens: self.target_tokens,
        }
    }
}

fn default_min_tokens() -> usize {
    100
}
fn default_max_tokens() -> usize {
    1000
}
fn default_target_tokens() -> usize {
    500
}
fn default_tokenizer() -> String {
    DEFAULT_TOKENIZER.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            top_k: self.top_k,
            similarity_threshold: self.similarity_threshold,
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_similarity_threshold() -> f64 {
    0.3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    /// Overrides the known dimensionality for `model`.
    #[serde(default)]
    pub dims: Option<usize>,
    /// PEM file added to the HTTP client's trusted roots.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            url: default_url(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout(),
            dims: None,
            ca_cert: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_generation_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_generation_model(),
            url: default_url(),
            max_tokens: default_generation_max_tokens(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout(),
            ca_cert: None,
        }
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_embedding_model() -> String {
    "granite-embedding:278m".to_string()
}
fn default_generation_model() -> String {
    "granite4".to_string()
}
fn default_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    3
}
fn default_embedding_timeout() -> u64 {
    60
}
fn default_generation_timeout() -> u64 {
    120
}
fn default_generation_max_tokens() -> usize {
    2048
}
fn default_temperature() -> f32 {
    0.3
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `console` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "console".to_string()
}

/// `doc-rag serve` listener.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let c = &config.chunking;
    if c.min_tokens == 0 {
        bail!("chunking.min_tokens must be > 0");
    }
    if c.min_tokens > c.target_tokens {
        bail!(
            "chunking.min_tokens ({}) must be <= chunking.target_tokens ({})",
            c.min_tokens,
            c.target_tokens
        );
    }
    if c.target_tokens > c.max_tokens {
        bail!(
            "chunking.target_tokens ({}) must be <= chunking.max_tokens ({})",
            c.target_tokens,
            c.max_tokens
        );
    }
    if !KNOWN_TOKENIZERS.contains(&c.tokenizer.as_str()) {
        bail!(
            "Unknown chunking.tokenizer: '{}'. Must be one of: {}.",
            c.tokenizer,
            KNOWN_TOKENIZERS.join(", ")
        );
    }

    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.similarity_threshold) {
        bail!("retrieval.similarity_threshold must be in [0.0, 1.0]");
    }

    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if config.generation.max_tokens == 0 {
        bail!("generation.max_tokens must be > 0");
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0 when set");
    }
    for (key, provider) in [
        ("embedding.provider", &config.embedding.provider),
        ("generation.provider", &config.generation.provider),
    ] {
        if !PROVIDERS.contains(&provider.as_str()) {
            bail!(
                "Unknown {}: '{}'. Must be ollama or disabled.",
                key,
                provider
            );
        }
    }

    if config.server.bind.parse::<std::net::SocketAddr>().is_err() {
        bail!(
            "server.bind must be a socket address like 127.0.0.1:8080, got '{}'",
            config.server.bind
        );
    }

    match config.logging.format.as_str() {
        "console" | "json" => {}
        other => bail!(
            "Unknown logging.format: '{}'. Must be console or json.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[store]
path = "./data/doc-rag.sqlite"

[docs]
root = "./docs"
"#;

    fn parse(extra: &str) -> Result<Config> {
        let config: Config = toml::from_str(&format!("{MINIMAL}\n{extra}"))?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.chunking.min_tokens, 100);
        assert_eq!(config.chunking.max_tokens, 1000);
        assert_eq!(config.chunking.target_tokens, 500);
        assert_eq!(config.chunking.tokenizer, "cl100k_base");
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.similarity_threshold, 0.3);
        assert_eq!(config.embedding.model, "granite-embedding:278m");
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.generation.model, "granite4");
        assert_eq!(config.docs.include_globs, vec!["**/*.md", "**/*.markdown"]);
        assert_eq!(config.logging.format, "console");
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_rejects_bad_bind_address() {
        let err = parse("[server]\nbind = \"localhost\"\n").unwrap_err();
        assert!(err.to_string().contains("server.bind"));
    }

    #[test]
    fn test_rejects_min_above_target() {
        let err = parse("[chunking]\nmin_tokens = 600\ntarget_tokens = 500\n").unwrap_err();
        assert!(err.to_string().contains("min_tokens"));
    }

    #[test]
    fn test_rejects_target_above_max() {
        let err = parse("[chunking]\ntarget_tokens = 800\nmax_tokens = 700\n").unwrap_err();
        assert!(err.to_string().contains("target_tokens"));
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        assert!(parse("[retrieval]\nsimilarity_threshold = 1.5\n").is_err());
        assert!(parse("[retrieval]\ntop_k = 0\n").is_err());
    }

    #[test]
    fn test_rejects_unknown_names() {
        assert!(parse("[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse("[generation]\nprovider = \"watsonx\"\n").is_err());
        assert!(parse("[chunking]\ntokenizer = \"bert\"\n").is_err());
        assert!(parse("[logging]\nformat = \"xml\"\n").is_err());
        assert!(parse("[embedding]\nbatch_size = 0\n").is_err());
    }

    #[test]
    fn test_load_config_reports_path() {
        let err = load_config(Path::new("/definitely/missing/doc-rag.toml")).unwrap_err();
        assert!(err.to_string().contains("/definitely/missing/doc-rag.toml"));
    }
}
