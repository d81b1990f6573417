//! Query-time retrieval over a [`VectorStore`].
//!
//! # Algorithm
//!
//! 1. A blank query returns no results and never reaches the embedder.
//! 2. The query is embedded once.
//! 3. The store returns the `top_k` nearest records, optionally restricted
//!    by category equality and document path prefix.
//! 4. Each squared-L2 distance `d` is mapped to `similarity = 1 / (1 + d)`.
//! 5. Results below `similarity_threshold` are dropped; store order is kept.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::embedding::Embedder;
use crate::models::{ChunkMetadata, RetrievedChunk};
use crate::store::{MetadataFilter, VectorStore};

/// Retrieval tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    pub top_k: usize,
    /// Minimum similarity in `[0, 1]` a result must reach to be returned.
    pub similarity_threshold: f64,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.3,
        }
    }
}

/// Optional per-call overrides and filters.
#[derive(Debug, Clone, Default)]
pub struct RetrieveOptions {
    pub top_k: Option<usize>,
    pub category: Option<String>,
    pub path_prefix: Option<String>,
}

/// Map a squared-L2 distance to a similarity in `(0, 1]`.
///
/// ```rust
/// use doc_rag_core::retrieve::similarity_from_distance;
///
/// assert_eq!(similarity_from_distance(0.0), 1.0);
/// assert!(similarity_from_distance(0.1) > similarity_from_distance(1.0));
/// ```
pub fn similarity_from_distance(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

/// Chunk position parsed from an id of the form `{prefix}_{index}`.
fn chunk_index(chunk_id: &str) -> usize {
    chunk_id
        .rsplit_once('_')
        .and_then(|(_, idx)| idx.parse().ok())
        .unwrap_or(usize::MAX)
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    params: RetrievalParams,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        params: RetrievalParams,
    ) -> Self {
        Self {
            embedder,
            store,
            params,
        }
    }

    /// Retrieve chunks relevant to `query`, most similar first.
    pub async fn retrieve(
        &self,
        query: &str,
        options: &RetrieveOptions,
    ) -> Result<Vec<RetrievedChunk>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let top_k = options
            .top_k
            .filter(|k| *k > 0)
            .unwrap_or(self.params.top_k);
        let filter = MetadataFilter {
            category: options.category.clone(),
            document_path: None,
            path_prefix: options.path_prefix.clone(),
        };

        let embedding = self
            .embedder
            .embed(query)
            .await
            .context("Failed to embed query")?;

        let hits = self
            .store
            .query(
                &embedding.vector,
                top_k,
                (!filter.is_empty()).then_some(&filter),
            )
            .await
            .context("Vector store query failed")?;

        let results: Vec<RetrievedChunk> = hits
            .into_iter()
            .filter_map(|hit| {
                let similarity = similarity_from_distance(hit.distance);
                (similarity >= self.params.similarity_threshold).then(|| RetrievedChunk {
                    chunk_id: hit.id,
                    content: hit.document,
                    metadata: ChunkMetadata::from_store_metadata(&hit.metadata),
                    similarity,
                })
            })
            .collect();

        tracing::debug!(
            top_k,
            returned = results.len(),
            threshold = self.params.similarity_threshold,
            "retrieved chunks"
        );
        Ok(results)
    }

    /// All chunks of one document, in chunk order, with similarity `1.0`.
    pub async fn retrieve_by_document(&self, document_path: &str) -> Result<Vec<RetrievedChunk>> {
        let mut entries = self
            .store
            .get(Some(&MetadataFilter::by_document(document_path)))
            .await
            .with_context(|| format!("Failed to load chunks for {}", document_path))?;
        entries.sort_by_key(|e| chunk_index(&e.id));

        Ok(entries
            .into_iter()
            .map(|e| RetrievedChunk {
                metadata: ChunkMetadata::from_store_metadata(&e.metadata),
                chunk_id: e.id,
                content: e.document,
                similarity: 1.0,
            })
            .collect())
    }

    /// Sorted distinct categories present in the store.
    pub async fn categories(&self) -> Result<Vec<String>> {
        let entries = self.store.get(None).await?;
        let set: BTreeSet<String> = entries
            .into_iter()
            .filter_map(|e| e.metadata.get("category").cloned())
            .filter(|c| !c.is_empty())
            .collect();
        Ok(set.into_iter().collect())
    }

    /// Sorted distinct `(document_path, category)` pairs.
    pub async fn documents(&self) -> Result<Vec<(String, String)>> {
        let entries = self.store.get(None).await?;
        let set: BTreeSet<(String, String)> = entries
            .into_iter()
            .filter_map(|e| {
                let path = e.metadata.get("document_path")?.clone();
                let category = e.metadata.get("category").cloned().unwrap_or_default();
                Some((path, category))
            })
            .collect();
        Ok(set.into_iter().collect())
    }
}
