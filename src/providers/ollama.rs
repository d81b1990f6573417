//! Ollama HTTP providers.
//!
//! Embeddings use `POST /api/embed` with a batched `input` array.
//! Generation uses `POST /api/chat` with `stream: false`. Availability is
//! checked with `GET /api/tags`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;

use doc_rag_core::embedding::{Embedder, Embedding};
use doc_rag_core::generation::{GenerationRequest, GenerationResult, Generator};

use super::{build_client, post_json_with_retry};
use crate::config::{EmbeddingConfig, GenerationConfig};

/// Vector sizes of common Ollama embedding models.
const KNOWN_DIMENSIONS: &[(&str, usize)] = &[
    ("granite-embedding:278m", 768),
    ("nomic-embed-text", 768),
    ("mxbai-embed-large", 1024),
    ("all-minilm", 384),
];

const FALLBACK_DIMENSIONS: usize = 768;

pub fn known_dimensions(model: &str) -> Option<usize> {
    KNOWN_DIMENSIONS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, dims)| *dims)
}

fn base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

async fn server_models(client: &reqwest::Client, url: &str) -> Option<Vec<String>> {
    let response = match client.get(format!("{}/api/tags", url)).send().await {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            tracing::warn!(url, status = %r.status(), "Ollama not available");
            return None;
        }
        Err(e) => {
            tracing::warn!(url, error = %e, "Ollama not available");
            return None;
        }
    };
    let json: serde_json::Value = response.json().await.ok()?;
    Some(
        json.get("models")
            .and_then(|m| m.as_array())
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    )
}

fn parse_embed_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|item| {
            let values = item
                .as_array()
                .ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not an array"))?;
            Ok(values
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect())
        })
        .collect()
}

fn token_field(json: &serde_json::Value, key: &str) -> usize {
    json.get(key).and_then(|v| v.as_u64()).unwrap_or(0) as usize
}

pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let dims = config
            .dims
            .or_else(|| known_dimensions(&config.model))
            .unwrap_or(FALLBACK_DIMENSIONS);
        Ok(Self {
            client: build_client(config.timeout_secs, config.ca_cert.as_deref())?,
            url: base_url(&config.url),
            model: config.model.clone(),
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String], batch_size: usize) -> Result<Vec<Embedding>> {
        let endpoint = format!("{}/api/embed", self.url);
        let mut results = Vec::with_capacity(texts.len());

        for batch in texts.chunks(batch_size.max(1)) {
            let body = json!({
                "model": self.model,
                "input": batch,
            });
            let response = post_json_with_retry(&self.client, &endpoint, &body, self.max_retries)
                .await
                .map_err(|e| anyhow!("{} (is Ollama running at {}?)", e, self.url))?;
            let vectors = parse_embed_response(&response)?;
            if vectors.len() != batch.len() {
                anyhow::bail!(
                    "Ollama returned {} embeddings for {} inputs",
                    vectors.len(),
                    batch.len()
                );
            }

            // Only attributable to a single input.
            let token_count = if batch.len() == 1 {
                token_field(&response, "prompt_eval_count")
            } else {
                0
            };
            results.extend(vectors.into_iter().map(|vector| Embedding {
                vector,
                model_id: self.model.clone(),
                token_count,
            }));
            tracing::debug!(batch = batch.len(), total = results.len(), "embedded batch");
        }

        Ok(results)
    }

    async fn is_available(&self) -> bool {
        server_models(&self.client, &self.url).await.is_some()
    }
}

pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs, config.ca_cert.as_deref())?,
            url: base_url(&config.url),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    fn chat_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let mut messages = Vec::new();
        if !request.system_prompt.is_empty() {
            messages.push(json!({"role": "system", "content": request.system_prompt}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let mut options = json!({
            "temperature": request.temperature,
            "num_predict": request.max_tokens,
        });
        if !request.stop_sequences.is_empty() {
            options["stop"] = json!(request.stop_sequences);
        }

        json!({
            "model": self.model,
            "messages": messages,
            "options": options,
            "stream": false,
        })
    }
}

fn parse_chat_response(json: &serde_json::Value, fallback_model: &str) -> Result<GenerationResult> {
    let text = json
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing message content"))?;
    let model_id = json
        .get("model")
        .and_then(|m| m.as_str())
        .unwrap_or(fallback_model);

    Ok(GenerationResult {
        text: text.to_string(),
        model_id: model_id.to_string(),
        prompt_tokens: token_field(json, "prompt_eval_count"),
        completion_tokens: token_field(json, "eval_count"),
    })
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let endpoint = format!("{}/api/chat", self.url);
        let response =
            post_json_with_retry(&self.client, &endpoint, &self.chat_body(request), self.max_retries)
                .await
                .map_err(|e| anyhow!("{} (is Ollama running at {}?)", e, self.url))?;
        parse_chat_response(&response, &self.model)
    }

    /// Reachable and serving this model (tag optional).
    async fn is_available(&self) -> bool {
        let Some(models) = server_models(&self.client, &self.url).await else {
            return false;
        };
        let base = self.model.split(':').next().unwrap_or(&self.model);
        models.iter().any(|m| m.contains(base))
    }
}
