//! # doc-rag core
//!
//! Pure logic for doc-rag: data models, token counting, heading-aware
//! chunking, the embedding / generation / vector-store contracts, the
//! retriever, the incremental indexer, and answer assembly.
//!
//! This crate contains no tokio, sqlx, HTTP client, or filesystem I/O.
//! Concrete providers and the SQLite store live in the `doc-rag` app
//! crate; [`store::memory::InMemoryVectorStore`] is provided here for
//! tests and embedding in other hosts.
//!
//! ## Pipeline
//!
//! ```text
//! Document ──▶ chunk::Chunker ──▶ Vec<Chunk> ──▶ index::Indexer ──▶ VectorStore
//!                                                                   │
//!  question ──▶ retrieve::Retriever ◀───────────────────────────────┘
//!                      │
//!                      ▼
//!              answer::Answerer ──▶ Generator
//! ```

pub mod answer;
pub mod chunk;
pub mod embedding;
pub mod generation;
pub mod index;
pub mod models;
pub mod retrieve;
pub mod store;
pub mod tokenizer;
