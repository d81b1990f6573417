//! Heading-aware semantic chunker.
//!
//! Splits markdown documents into [`Chunk`]s bounded by a token budget
//! while keeping track of the heading hierarchy each chunk belongs to.
//!
//! # Algorithm
//!
//! 1. Split the document into sections at heading lines
//!    ([`sections::split_sections`]). Text before the first heading becomes
//!    a level-0 section; a document without headings is one section.
//! 2. Pack each section ([`packer::pack_section`]). A section within
//!    `max_tokens` is kept whole. Larger sections are split on blank lines
//!    with code blocks and tables protected ([`atomic`]), so an atomic unit
//!    is never cut even if it alone exceeds `max_tokens`.
//! 3. Merge undersized neighbours that share an h2
//!    ([`merge::merge_small_chunks`]) and renumber ids from 0.
//!
//! Chunk ids are `{first 12 chars of content hash}_{index}`, so identical
//! input always yields identical ids.
//!
//! # Example
//!
//! ```rust
//! use doc_rag_core::chunk::{Chunker, ChunkerConfig};
//! use doc_rag_core::tokenizer::HeuristicCounter;
//!
//! let chunker = Chunker::new(ChunkerConfig::default(), Box::new(HeuristicCounter));
//! let chunks = chunker.chunk_document(
//!     "# Guide\n\nHello world.",
//!     "guide.md",
//!     "0123456789abcdef",
//!     "howto",
//!     &[],
//!     "Guide",
//! );
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_id, "0123456789ab_0");
//! ```

pub mod atomic;
pub mod merge;
pub mod packer;
pub mod sections;

use tracing::debug;

use crate::models::{Chunk, ChunkMetadata, Document};
use crate::tokenizer::TokenCounter;

pub use atomic::extract_atomic_units;
pub use merge::merge_small_chunks;
pub use packer::pack_section;
pub use sections::split_sections;

/// Number of content-hash characters used as the chunk id prefix.
const ID_HASH_PREFIX_LEN: usize = 12;

/// Token budgets for chunking.
///
/// Not validated here; `min_tokens <= target_tokens <= max_tokens` is
/// checked when configuration is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Chunks below this size are candidates for merging.
    pub min_tokens: usize,
    /// Upper bound for a chunk, except for a single oversized atomic unit.
    pub max_tokens: usize,
    /// Upper bound for the combined size of a merge.
    pub target_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_tokens: 100,
            max_tokens: 1000,
            target_tokens: 500,
        }
    }
}

/// Build a chunk id from a content hash and an index.
pub fn chunk_id(content_hash: &str, index: usize) -> String {
    format!("{}_{}", hash_prefix(content_hash), index)
}

fn hash_prefix(content_hash: &str) -> &str {
    match content_hash.char_indices().nth(ID_HASH_PREFIX_LEN) {
        Some((end, _)) => &content_hash[..end],
        None => content_hash,
    }
}

/// Stateless chunker: token budgets plus a token counter.
pub struct Chunker {
    config: ChunkerConfig,
    counter: Box<dyn TokenCounter>,
}

impl Chunker {
    pub fn new(config: ChunkerConfig, counter: Box<dyn TokenCounter>) -> Self {
        Self { config, counter }
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.counter.count_tokens(text)
    }

    /// Chunk a parsed [`Document`].
    pub fn chunk(&self, doc: &Document) -> Vec<Chunk> {
        self.chunk_document(
            &doc.content,
            &doc.path,
            &doc.content_hash,
            &doc.category,
            &doc.tags,
            &doc.title,
        )
    }

    /// Split document text into ordered chunks.
    ///
    /// `title` seeds h1 for text that precedes any level-1 heading.
    /// Always returns at least one chunk.
    pub fn chunk_document(
        &self,
        content: &str,
        document_path: &str,
        content_hash: &str,
        category: &str,
        tags: &[String],
        title: &str,
    ) -> Vec<Chunk> {
        let tags = tags.join(",");
        let sections = split_sections(content, title);

        let mut chunks = Vec::new();
        for section in &sections {
            for piece in pack_section(&section.content, self.counter.as_ref(), self.config.max_tokens) {
                chunks.push(Chunk {
                    chunk_id: chunk_id(content_hash, chunks.len()),
                    content: piece.content,
                    token_count: piece.token_count,
                    metadata: ChunkMetadata {
                        document_path: document_path.to_string(),
                        category: category.to_string(),
                        h1: section.context.h1.clone(),
                        h2: section.context.h2.clone(),
                        h3: section.context.h3.clone(),
                        breadcrumb: section.context.breadcrumb(),
                        tags: tags.clone(),
                        content_hash: content_hash.to_string(),
                        embedding_model: String::new(),
                        ingested_at: String::new(),
                    },
                });
            }
        }

        let chunks = merge_small_chunks(
            chunks,
            self.config.min_tokens,
            self.config.target_tokens,
            content_hash,
        );

        debug!(
            path = document_path,
            sections = sections.len(),
            chunks = chunks.len(),
            tokenizer = self.counter.name(),
            "chunked document"
        );

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{HeuristicCounter, TiktokenCounter};
    use std::collections::HashSet;

    fn tiktoken_chunker(min: usize, max: usize, target: usize) -> Chunker {
        Chunker::new(
            ChunkerConfig {
                min_tokens: min,
                max_tokens: max,
                target_tokens: target,
            },
            Box::new(TiktokenCounter::cl100k().unwrap()),
        )
    }

    fn long_code_block(lines: usize) -> String {
        let body: Vec<String> = (0..lines)
            .map(|i| format!("let value_{i} = compute_something({i}, \"argument\");"))
            .collect();
        format!("```rust\n{}\n```", body.join("\n"))
    }

    #[test]
    fn test_chunk_id_prefix() {
        assert_eq!(chunk_id("abc123def456789", 3), "abc123def456_3");
        assert_eq!(chunk_id("abc123", 0), "abc123_0");
    }

    #[test]
    fn test_no_headings_single_chunk_with_title() {
        let chunker = tiktoken_chunker(100, 1000, 500);
        let chunks = chunker.chunk_document(
            "Plain text without any heading.\n\nSecond paragraph.",
            "notes.md",
            "ffffeeeeddddcccc",
            "general",
            &[],
            "Notes",
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.h1, "Notes");
        assert_eq!(chunks[0].metadata.breadcrumb, "Notes");
    }

    #[test]
    fn test_empty_document_yields_one_chunk() {
        let chunker = tiktoken_chunker(100, 1000, 500);
        let chunks = chunker.chunk_document("", "empty.md", "00", "general", &[], "Empty");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "");
        assert_eq!(chunks[0].token_count, 0);
    }

    #[test]
    fn test_small_section_token_count_matches() {
        let chunker = tiktoken_chunker(1, 1000, 500);
        let content = "## Only\n\nA short section body.";
        let chunks = chunker.chunk_document(content, "a.md", "abc", "general", &[], "A");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].token_count, chunker.count_tokens(content));
    }

    #[test]
    fn test_pod_troubleshooting_breadcrumbs() {
        let chunker = tiktoken_chunker(100, 500, 500);
        let content = "# Pod Troubleshooting\n\n## CrashLoopBackOff\n\nCheck logs first.\n\n## ImagePullBackOff\n\nVerify image name.";
        let chunks = chunker.chunk_document(
            content,
            "runbooks/pods.md",
            "0123456789abcdef0123",
            "runbook",
            &["k8s".to_string()],
            "Pod Troubleshooting",
        );
        let crumbs: Vec<&str> = chunks.iter().map(|c| c.metadata.breadcrumb.as_str()).collect();
        assert!(crumbs.contains(&"Pod Troubleshooting > CrashLoopBackOff"));
        assert!(crumbs.contains(&"Pod Troubleshooting > ImagePullBackOff"));

        let crash = chunks
            .iter()
            .find(|c| c.metadata.h2 == "CrashLoopBackOff")
            .unwrap();
        assert!(crash.content.contains("Check logs first."));
        assert!(!crash.content.contains("Verify image name."));
    }

    #[test]
    fn test_oversized_code_block_kept_whole() {
        let chunker = tiktoken_chunker(100, 500, 500);
        let code = long_code_block(120);
        assert!(chunker.count_tokens(&code) > 500);

        let chunks = chunker.chunk_document(&code, "code.md", "abcdef123456", "general", &[], "Code");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].token_count > 500);
        assert_eq!(chunks[0].content, code);
    }

    #[test]
    fn test_code_block_never_split_in_large_section() {
        let chunker = tiktoken_chunker(20, 120, 60);
        let prose = "Restart the deployment and watch the rollout status carefully before moving on.";
        let code = long_code_block(30);
        let content = format!(
            "# Deploy\n\n{p}\n\n{p}\n\n{c}\n\n{p}\n\n{p}",
            p = prose,
            c = code
        );
        let chunks = chunker.chunk_document(&content, "d.md", "abcabcabcabc", "howto", &[], "Deploy");

        let with_fence: Vec<&Chunk> = chunks.iter().filter(|c| c.content.contains("```")).collect();
        assert_eq!(with_fence.len(), 1);
        assert!(with_fence[0].content.contains(&code));
        for c in &chunks {
            assert!(c.token_count <= 120 || c.content.contains("```"));
        }
    }

    #[test]
    fn test_ids_unique_and_prefixed() {
        let chunker = tiktoken_chunker(1, 40, 20);
        let content = (0..12)
            .map(|i| format!("## Section {i}\n\nContent for section number {i} goes here."))
            .collect::<Vec<_>>()
            .join("\n\n");
        let hash = "abc123def456aaaa";
        let chunks = chunker.chunk_document(&content, "t.md", hash, "general", &[], "T");

        let ids: HashSet<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids.len(), chunks.len());
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_id, format!("abc123def456_{i}"));
        }
    }

    #[test]
    fn test_metadata_propagated() {
        let chunker = tiktoken_chunker(100, 1000, 500);
        let tags = vec!["k8s".to_string(), "troubleshooting".to_string()];
        let chunks = chunker.chunk_document(
            "# Test\n\nContent here.",
            "docs/runbook.md",
            "abc123def456",
            "runbook",
            &tags,
            "Test Title",
        );
        let m = &chunks[0].metadata;
        assert_eq!(m.document_path, "docs/runbook.md");
        assert_eq!(m.category, "runbook");
        assert_eq!(m.tags, "k8s,troubleshooting");
        assert_eq!(m.content_hash, "abc123def456");
        assert_eq!(m.h1, "Test");
        assert!(m.embedding_model.is_empty());
        assert!(m.ingested_at.is_empty());
    }

    #[test]
    fn test_small_paragraphs_merge_within_subsection() {
        let chunker = Chunker::new(
            ChunkerConfig {
                min_tokens: 50,
                max_tokens: 8,
                target_tokens: 200,
            },
            Box::new(HeuristicCounter),
        );
        let content = "## Section\n\nAlpha paragraph.\n\nBravo paragraph.\n\nCharlie paragraph.";
        let chunks = chunker.chunk_document(content, "m.md", "aaaa", "general", &[], "M");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("Alpha"));
        assert!(chunks[0].content.contains("Charlie"));
    }

    #[test]
    fn test_deterministic() {
        let chunker = tiktoken_chunker(10, 60, 40);
        let content = "# A\n\nOne two three.\n\n## B\n\nFour five six.\n\n### C\n\nSeven eight.";
        let a = chunker.chunk_document(content, "x.md", "123456789012345", "g", &[], "X");
        let b = chunker.chunk_document(content, "x.md", "123456789012345", "g", &[], "X");
        assert_eq!(a, b);
    }

    #[test]
    fn test_chunk_from_document() {
        let chunker = tiktoken_chunker(100, 1000, 500);
        let doc = Document::from_raw(
            "guides/setup.md",
            "# Setup\n\nInstall it.",
            "# Setup\n\nInstall it.",
            "Setup",
            "howto",
            vec!["install".into()],
        );
        let chunks = chunker.chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].chunk_id.starts_with(&doc.content_hash[..12]));
        assert_eq!(chunks[0].metadata.tags, "install");
    }
}
