//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the only way the retriever and indexer
//! touch persisted chunks, so backends are pluggable (SQLite in the app
//! crate, [`memory::InMemoryVectorStore`] here).
//!
//! Records carry string-valued metadata ([`StoreMetadata`]); conversion to
//! and from the typed [`ChunkMetadata`](crate::models::ChunkMetadata)
//! happens at this boundary.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, StoreMetadata};

/// A vector plus the chunk text and metadata stored with it.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub document: String,
    pub metadata: StoreMetadata,
}

impl VectorRecord {
    /// Build a record from an embedded chunk.
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.chunk_id.clone(),
            vector,
            document: chunk.content.clone(),
            metadata: chunk.metadata.to_store_metadata(&chunk.chunk_id),
        }
    }
}

/// One nearest-neighbour result.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: StoreMetadata,
    /// Squared Euclidean distance to the query vector.
    pub distance: f64,
}

/// A stored record without its vector.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub id: String,
    pub document: String,
    pub metadata: StoreMetadata,
}

/// Metadata predicate. All set fields must match; an empty filter matches
/// every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    /// `category` equals this value.
    pub category: Option<String>,
    /// `document_path` equals this value.
    pub document_path: Option<String>,
    /// `document_path` starts with this value.
    pub path_prefix: Option<String>,
}

impl MetadataFilter {
    pub fn by_document(path: &str) -> Self {
        Self {
            document_path: Some(path.to_string()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.document_path.is_none() && self.path_prefix.is_none()
    }

    pub fn matches(&self, metadata: &StoreMetadata) -> bool {
        let field = |key: &str| metadata.get(key).map(String::as_str).unwrap_or("");
        if let Some(cat) = &self.category {
            if field("category") != cat {
                return false;
            }
        }
        if let Some(path) = &self.document_path {
            if field("document_path") != path {
                return false;
            }
        }
        if let Some(prefix) = &self.path_prefix {
            if !field("document_path").starts_with(prefix.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Abstract vector storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Insert or replace records by id |
/// | [`query`](VectorStore::query) | Nearest neighbours, closest first |
/// | [`get`](VectorStore::get) | All records matching a filter |
/// | [`delete`](VectorStore::delete) | Remove records by id |
/// | [`count`](VectorStore::count) | Total number of records |
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Return at most `top_k` records matching `filter`, ordered by
    /// ascending distance. An empty store yields an empty list.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>>;

    async fn get(&self, filter: Option<&MetadataFilter>) -> Result<Vec<StoredEntry>>;

    /// Delete records by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<()>;

    async fn count(&self) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(path: &str, category: &str) -> StoreMetadata {
        let mut m = StoreMetadata::new();
        m.insert("document_path".into(), path.into());
        m.insert("category".into(), category.into());
        m
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let f = MetadataFilter::default();
        assert!(f.is_empty());
        assert!(f.matches(&StoreMetadata::new()));
    }

    #[test]
    fn test_category_and_prefix_combined() {
        let f = MetadataFilter {
            category: Some("runbook".into()),
            path_prefix: Some("runbooks/".into()),
            ..Default::default()
        };
        assert!(f.matches(&meta("runbooks/pods.md", "runbook")));
        assert!(!f.matches(&meta("guides/pods.md", "runbook")));
        assert!(!f.matches(&meta("runbooks/pods.md", "howto")));
    }

    #[test]
    fn test_document_path_is_exact() {
        let f = MetadataFilter::by_document("a.md");
        assert!(f.matches(&meta("a.md", "x")));
        assert!(!f.matches(&meta("a.md.bak", "x")));
    }
}
