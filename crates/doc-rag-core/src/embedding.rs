//! Embedding provider trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! plus pure helpers for vector serialization and distance computation.
//!
//! Concrete providers (Ollama, disabled) live in the `doc-rag` app crate.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// One embedding vector plus the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub model_id: String,
    /// Tokens consumed, when the backend reports it (otherwise `0`).
    pub token_count: usize,
}

/// Trait for embedding providers.
///
/// Implementations must return exactly one [`Embedding`] per input text,
/// in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"nomic-embed-text"`).
    fn model_id(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `768`).
    fn dims(&self) -> usize;

    /// Embed `texts`, sending at most `batch_size` texts per backend call.
    async fn embed_batch(&self, texts: &[String], batch_size: usize) -> Result<Vec<Embedding>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_batch(&[text.to_string()], 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))
    }

    /// Whether the backend is reachable and ready.
    async fn is_available(&self) -> bool;
}

/// Encode a float vector as little-endian `f32` bytes.
///
/// ```rust
/// use doc_rag_core::embedding::{blob_to_vec, vec_to_blob};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode bytes produced by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Squared Euclidean distance between two vectors.
///
/// Returns `f64::INFINITY` for vectors of different lengths so that
/// mismatched records sort last and fall below any similarity threshold.
pub fn squared_l2_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = (*x as f64) - (*y as f64);
            d * d
        })
        .sum()
}
