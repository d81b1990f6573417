//! Wiring from [`Config`] to the core pipeline components.
//!
//! Every command builds what it needs through these helpers so the
//! SQLite store, providers and chunker are configured the same way.

use anyhow::{Context, Result};
use std::sync::Arc;

use doc_rag_core::answer::Answerer;
use doc_rag_core::chunk::Chunker;
use doc_rag_core::retrieve::Retriever;
use doc_rag_core::tokenizer::counter_from_name;

use crate::config::Config;
use crate::providers;
use crate::sqlite_store::SqliteVectorStore;

pub async fn open_store(config: &Config) -> Result<Arc<SqliteVectorStore>> {
    let store = SqliteVectorStore::open(&config.store.path)
        .await
        .with_context(|| format!("Failed to open store: {}", config.store.path.display()))?;
    Ok(Arc::new(store))
}

pub fn build_chunker(config: &Config) -> Result<Chunker> {
    let counter = counter_from_name(&config.chunking.tokenizer)?;
    Ok(Chunker::new(config.chunking.chunker_config(), counter))
}

pub fn build_retriever(config: &Config, store: Arc<SqliteVectorStore>) -> Result<Retriever> {
    Ok(Retriever::new(
        providers::create_embedder(&config.embedding)?,
        store,
        config.retrieval.params(),
    ))
}

pub fn build_answerer(config: &Config, store: Arc<SqliteVectorStore>) -> Result<Answerer> {
    let generator = providers::create_generator(&config.generation)?;
    Ok(Answerer::new(build_retriever(config, store)?, generator)
        .with_sampling(config.generation.max_tokens, config.generation.temperature))
}
