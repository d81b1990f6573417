//! Core data models that flow through the chunking and retrieval pipeline.
//!
//! [`ChunkMetadata`] is the typed form of a chunk's metadata. The
//! string-valued map required by vector stores is produced only at the
//! store boundary by [`ChunkMetadata::to_store_metadata`] and parsed back
//! by [`ChunkMetadata::from_store_metadata`].

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// String-valued metadata as persisted by a vector store.
pub type StoreMetadata = BTreeMap<String, String>;

/// Separator used to build a [`HeadingContext::breadcrumb`].
pub const BREADCRUMB_SEPARATOR: &str = " > ";

/// A parsed input document.
///
/// `path` is the identity key (relative to the docs root) and
/// `content_hash` is the change-detection key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: String,
    /// Body text with any front matter removed.
    pub content: String,
    pub title: String,
    pub category: String,
    pub tags: Vec<String>,
    /// SHA-256 hex digest of the raw source.
    pub content_hash: String,
}

impl Document {
    /// Build a document, hashing `raw` to obtain its content hash.
    ///
    /// `raw` is the full source (front matter included) so that a
    /// metadata-only edit still changes the hash.
    pub fn from_raw(
        path: impl Into<String>,
        raw: &str,
        content: impl Into<String>,
        title: impl Into<String>,
        category: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            title: title.into(),
            category: category.into(),
            tags,
            content_hash: content_hash(raw),
        }
    }
}

/// SHA-256 hex digest of `text`.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The (h1, h2, h3) heading hierarchy active at a point in a document.
///
/// This is a plain value: sections take their own copy, so later changes
/// to a running context never reach sections already captured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadingContext {
    pub h1: String,
    pub h2: String,
    pub h3: String,
}

impl HeadingContext {
    pub fn with_title(title: &str) -> Self {
        Self {
            h1: title.to_string(),
            ..Self::default()
        }
    }

    /// Record a heading of the given level.
    ///
    /// Level 1 clears h2 and h3, level 2 clears h3, level 3 sets h3.
    /// Levels 4 to 6 are not tracked.
    pub fn apply_heading(&mut self, level: usize, text: &str) {
        match level {
            1 => {
                self.h1 = text.to_string();
                self.h2.clear();
                self.h3.clear();
            }
            2 => {
                self.h2 = text.to_string();
                self.h3.clear();
            }
            3 => self.h3 = text.to_string(),
            _ => {}
        }
    }

    /// Non-empty levels joined with `" > "`.
    pub fn breadcrumb(&self) -> String {
        [&self.h1, &self.h2, &self.h3]
            .iter()
            .filter(|h| !h.is_empty())
            .map(|h| h.as_str())
            .collect::<Vec<_>>()
            .join(BREADCRUMB_SEPARATOR)
    }
}

/// A contiguous span of document text belonging to one heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub content: String,
    pub context: HeadingContext,
    /// `0` for text before the first heading, otherwise the heading level.
    pub level: usize,
}

/// Metadata carried by every [`Chunk`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChunkMetadata {
    pub document_path: String,
    pub category: String,
    pub h1: String,
    pub h2: String,
    pub h3: String,
    pub breadcrumb: String,
    /// Comma-joined tag list.
    pub tags: String,
    pub content_hash: String,
    /// Set at embedding time.
    pub embedding_model: String,
    /// ISO-8601 UTC, set at embedding time.
    pub ingested_at: String,
}

impl ChunkMetadata {
    /// Serialize to the string map persisted alongside each vector.
    pub fn to_store_metadata(&self, chunk_id: &str) -> StoreMetadata {
        let mut m = StoreMetadata::new();
        m.insert("chunk_id".into(), chunk_id.to_string());
        m.insert("document_path".into(), self.document_path.clone());
        m.insert("category".into(), self.category.clone());
        m.insert("h1".into(), self.h1.clone());
        m.insert("h2".into(), self.h2.clone());
        m.insert("h3".into(), self.h3.clone());
        m.insert("breadcrumb".into(), self.breadcrumb.clone());
        m.insert("tags".into(), self.tags.clone());
        m.insert("content_hash".into(), self.content_hash.clone());
        m.insert("embedding_model".into(), self.embedding_model.clone());
        m.insert("ingested_at".into(), self.ingested_at.clone());
        m
    }

    /// Parse a stored metadata map. Missing keys become empty strings.
    pub fn from_store_metadata(meta: &StoreMetadata) -> Self {
        let get = |key: &str| meta.get(key).cloned().unwrap_or_default();
        Self {
            document_path: get("document_path"),
            category: get("category"),
            h1: get("h1"),
            h2: get("h2"),
            h3: get("h3"),
            breadcrumb: get("breadcrumb"),
            tags: get("tags"),
            content_hash: get("content_hash"),
            embedding_model: get("embedding_model"),
            ingested_at: get("ingested_at"),
        }
    }
}

/// The unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// `{first 12 chars of content hash}_{index}`.
    pub chunk_id: String,
    pub content: String,
    pub token_count: usize,
    pub metadata: ChunkMetadata,
}

/// A chunk returned by the retriever, with its similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// `1 / (1 + distance)`, in `(0, 1]`.
    pub similarity: f64,
}

impl RetrievedChunk {
    /// Breadcrumb if present, otherwise the document path.
    pub fn source_label(&self) -> &str {
        if self.metadata.breadcrumb.is_empty() {
            &self.metadata.document_path
        } else {
            &self.metadata.breadcrumb
        }
    }
}
