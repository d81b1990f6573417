//! Embedding and generation providers.
//!
//! - **[`DisabledEmbedder`] / [`DisabledGenerator`]**: fail every call; used
//!   when a provider is set to `"disabled"`.
//! - **[`ollama::OllamaEmbedder`] / [`ollama::OllamaGenerator`]**: call a
//!   local or remote Ollama server.
//!
//! # Retry Strategy
//!
//! HTTP calls go through [`post_json_with_retry`]:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

pub mod ollama;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use doc_rag_core::embedding::{Embedder, Embedding};
use doc_rag_core::generation::{GenerationRequest, GenerationResult, Generator};

use crate::config::{EmbeddingConfig, GenerationConfig};

/// Embedder that rejects every call.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_id(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_batch(&self, _texts: &[String], _batch_size: usize) -> Result<Vec<Embedding>> {
        bail!("Embedding provider is disabled")
    }
    async fn is_available(&self) -> bool {
        false
    }
}

/// Generator that rejects every call.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_id(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationResult> {
        bail!("Generation provider is disabled")
    }
    async fn is_available(&self) -> bool {
        false
    }
}

pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(ollama::OllamaEmbedder::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(ollama::OllamaGenerator::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

/// Build an HTTP client, trusting `ca_cert` in addition to the default roots.
pub(crate) fn build_client(timeout_secs: u64, ca_cert: Option<&Path>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs));
    if let Some(path) = ca_cert {
        let pem = std::fs::read(path)
            .with_context(|| format!("Failed to read CA certificate: {}", path.display()))?;
        let cert = reqwest::Certificate::from_pem(&pem)
            .with_context(|| format!("Invalid CA certificate: {}", path.display()))?;
        builder = builder.add_root_certificate(cert);
    }
    Ok(builder.build()?)
}

/// POST `body` as JSON and return the decoded JSON response, retrying
/// transient failures with exponential backoff.
pub(crate) async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    body: &serde_json::Value,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(attempt, delay_secs = delay.as_secs(), url, "retrying request");
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow!("API error {} from {}: {}", status, url, body_text));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("API error {} from {}: {}", status, url, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow!("Connection error calling {}: {}", url, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("Request to {} failed after retries", url)))
}
