//! Ingestion command.
//!
//! Discovers and parses the docs tree, then hands the document set to the
//! [`Indexer`](doc_rag_core::index::Indexer): unchanged documents are
//! skipped, changed ones are re-chunked and re-embedded, and documents that
//! disappeared from disk have their chunks removed. An empty docs tree is
//! reported and leaves the store untouched.

use std::sync::Arc;

use anyhow::{bail, Result};
use doc_rag_core::index::{DocumentStatus, DryRunReport, IndexReport, Indexer};
use doc_rag_core::models::Document;
use doc_rag_core::store::VectorStore;
use tracing::info;

use crate::config::Config;
use crate::parser;
use crate::pipeline;
use crate::providers;
use crate::sqlite_store::SqliteVectorStore;

pub async fn run_ingest(config: &Config, full: bool, dry_run: bool) -> Result<()> {
    let documents = parser::parse_all(&config.docs)?;
    info!(documents = documents.len(), root = %config.docs.root.display(), "parsed documents");
    if documents.is_empty() {
        println!("No documents found in {}", config.docs.root.display());
        return Ok(());
    }

    let store = pipeline::open_store(config).await?;

    if dry_run {
        let embedder = providers::create_embedder(&config.embedding)?;
        let indexer = Indexer::new(
            pipeline::build_chunker(config)?,
            embedder,
            store.clone(),
            config.embedding.batch_size,
        );
        let report = indexer.dry_run(&documents, full).await?;
        print_dry_run(&report);
        store.close().await;
        return Ok(());
    }

    let report = index_documents(config, store.clone(), &documents, full).await?;
    let total = store.count().await?;
    print_report(&report, total);

    store.close().await;
    Ok(())
}

/// Index `documents` into `store` with the configured embedder.
///
/// Fails before touching the store when the embedding provider is disabled
/// or unreachable.
pub async fn index_documents(
    config: &Config,
    store: Arc<SqliteVectorStore>,
    documents: &[Document],
    full: bool,
) -> Result<IndexReport> {
    if !config.embedding.is_enabled() {
        bail!("Ingest requires an embedding provider. Set [embedding] provider in config.");
    }
    let embedder = providers::create_embedder(&config.embedding)?;
    if !embedder.is_available().await {
        bail!(
            "Embedding provider not available: model '{}' at {}",
            config.embedding.model,
            config.embedding.url
        );
    }

    let indexer = Indexer::new(
        pipeline::build_chunker(config)?,
        embedder,
        store,
        config.embedding.batch_size,
    );
    indexer.run(documents, full).await
}

fn print_report(report: &IndexReport, total_chunks: usize) {
    if let Some(mismatch) = &report.model_mismatch {
        println!(
            "Warning: index was built with '{}' but the active model is '{}'. Run `doc-rag ingest --full` to re-embed.",
            mismatch.stored, mismatch.current
        );
    }
    println!("Ingestion complete");
    println!("  New documents:           {}", report.new);
    println!("  Updated documents:       {}", report.updated);
    println!("  Skipped (unchanged):     {}", report.unchanged);
    println!("  Removed orphans:         {}", report.orphaned);
    println!("  Chunks embedded:         {}", report.chunks_embedded);
    println!("  Chunks deleted:          {}", report.chunks_deleted);
    println!("  Total chunks in database: {}", total_chunks);
}

fn print_dry_run(report: &DryRunReport) {
    println!("ingest (dry-run)");
    for entry in &report.documents {
        let label = match entry.status {
            DocumentStatus::New => "new",
            DocumentStatus::Updated => "updated",
            DocumentStatus::Unchanged => "unchanged",
        };
        println!("  {:<10} {:>4} chunks  {}", label, entry.chunk_count, entry.path);
    }
    for path in &report.orphaned {
        println!("  {:<10} {:>4}         {}", "orphaned", "-", path);
    }
    println!("  documents: {}", report.documents.len());
    println!("  estimated chunks: {}", report.total_chunks);
}
