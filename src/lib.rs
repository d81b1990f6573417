//! # doc-rag
//!
//! Local retrieval-augmented question answering over a tree of markdown
//! documentation.
//!
//! The chunking, indexing, retrieval and answer assembly logic lives in the
//! `doc-rag-core` crate and is storage- and provider-agnostic. This crate
//! supplies the pieces that touch the outside world: TOML configuration,
//! document discovery and parsing, a SQLite vector store, Ollama providers
//! and the `doc-rag` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Markdown   │──▶│   Indexer    │──▶│  SQLite  │
//! │  docs tree  │   │ Chunk+Embed  │   │  chunks  │
//! └─────────────┘   └──────────────┘   └────┬─────┘
//!                                           │
//!                      ┌────────────────────┤
//!                      ▼                    ▼
//!                 ┌──────────┐        ┌──────────┐
//!                 │  search  │        │   ask    │
//!                 │ (ranked) │        │ (Ollama) │
//!                 └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! doc-rag init                          # create database
//! doc-rag ingest                        # chunk + embed ./docs
//! doc-rag search "pod crashloop"        # ranked chunks
//! doc-rag ask "How do I debug a CrashLoopBackOff?"
//! doc-rag serve                         # MCP server for AI tools
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`parser`] | Document discovery, front matter, title and category |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite-backed vector store |
//! | [`providers`] | Ollama embedding and generation providers |
//! | [`pipeline`] | Config → store, chunker, retriever, answerer |
//! | [`ingest`] | `doc-rag ingest` |
//! | [`search`] | `doc-rag search` and `doc-rag show` |
//! | [`ask`] | `doc-rag ask` |
//! | [`status`] | `doc-rag status` |
//! | [`clean`] | `doc-rag clean` |
//! | [`mcp`] | `query_docs`, `list_sources` and `reingest` tools, MCP bridge |
//! | [`server`] | `doc-rag serve`: MCP and HTTP endpoints |

pub mod ask;
pub mod clean;
pub mod config;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod mcp;
pub mod migrate;
pub mod parser;
pub mod pipeline;
pub mod providers;
pub mod search;
pub mod server;
pub mod sqlite_store;
pub mod status;
