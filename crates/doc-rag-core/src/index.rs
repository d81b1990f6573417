//! Incremental indexing by content hash.
//!
//! # Algorithm
//!
//! 1. Read `document_path → (content_hash, embedding_model)` from the
//!    store. The first record seen for a path wins.
//! 2. Classify each current document:
//!    - **unchanged**: a prior record exists with an equal hash (skipped
//!      unless `full`),
//!    - **updated**: a prior record exists and the hash differs, or `full`
//!      is set,
//!    - **new**: no prior record.
//! 3. Paths in the store but absent from the current set are **orphans**.
//! 4. Old chunks of updated documents are deleted before the new chunks
//!    are embedded. Orphans' chunks are deleted.
//! 5. Queued chunks are embedded in fixed-size batches, in order. Every
//!    chunk in the run gets the embedder's model id and one shared UTC
//!    timestamp. A failing batch aborts the run, and chunks already stored
//!    for that run's documents are removed again.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chunk::Chunker;
use crate::embedding::Embedder;
use crate::models::{Chunk, Document};
use crate::store::{MetadataFilter, VectorRecord, VectorStore};

/// Hash and model recorded for a previously indexed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedDocument {
    pub content_hash: String,
    pub embedding_model: String,
}

/// How a document is treated by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    New,
    Updated,
    Unchanged,
}

/// Classification of a document set against the store.
#[derive(Debug, Default)]
pub struct IndexPlan<'a> {
    pub new: Vec<&'a Document>,
    pub updated: Vec<&'a Document>,
    pub unchanged: Vec<&'a Document>,
    /// Indexed paths with no current document.
    pub orphaned: Vec<String>,
}

impl<'a> IndexPlan<'a> {
    /// Documents that will be (re)chunked, updated first.
    pub fn to_process(&self) -> impl Iterator<Item = (&'a Document, DocumentStatus)> + '_ {
        self.updated
            .iter()
            .map(|d| (*d, DocumentStatus::Updated))
            .chain(self.new.iter().map(|d| (*d, DocumentStatus::New)))
    }
}

/// Stored embedding model differs from the active embedder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelMismatch {
    pub stored: String,
    pub current: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub orphaned: usize,
    pub chunks_embedded: usize,
    pub chunks_deleted: usize,
    pub model_mismatch: Option<ModelMismatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DryRunEntry {
    pub path: String,
    pub status: DocumentStatus,
    /// Chunks the document would produce (`0` when unchanged).
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DryRunReport {
    pub documents: Vec<DryRunEntry>,
    pub orphaned: Vec<String>,
    pub total_chunks: usize,
}

/// Classify `documents` against previously indexed hashes.
///
/// Pure: performs no I/O.
pub fn plan<'a>(
    documents: &'a [Document],
    existing: &BTreeMap<String, IndexedDocument>,
    full: bool,
) -> IndexPlan<'a> {
    let mut plan = IndexPlan::default();
    for doc in documents {
        match existing.get(&doc.path) {
            Some(prev) if prev.content_hash == doc.content_hash && !full => {
                plan.unchanged.push(doc)
            }
            Some(_) => plan.updated.push(doc),
            None => plan.new.push(doc),
        }
    }

    let current: BTreeSet<&str> = documents.iter().map(|d| d.path.as_str()).collect();
    plan.orphaned = existing
        .keys()
        .filter(|path| !current.contains(path.as_str()))
        .cloned()
        .collect();
    plan
}

/// Drives chunking, embedding and store writes for a document set.
pub struct Indexer {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl Indexer {
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        batch_size: usize,
    ) -> Self {
        Self {
            chunker,
            embedder,
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Map of indexed document path to its stored hash and model.
    pub async fn existing_hashes(&self) -> Result<BTreeMap<String, IndexedDocument>> {
        let entries = self
            .store
            .get(None)
            .await
            .context("Failed to read indexed documents")?;

        let mut out = BTreeMap::new();
        for entry in entries {
            let Some(path) = entry.metadata.get("document_path") else {
                continue;
            };
            out.entry(path.clone()).or_insert_with(|| IndexedDocument {
                content_hash: entry.metadata.get("content_hash").cloned().unwrap_or_default(),
                embedding_model: entry
                    .metadata
                    .get("embedding_model")
                    .cloned()
                    .unwrap_or_default(),
            });
        }
        Ok(out)
    }

    /// Delete every chunk of one document. Returns the number removed.
    pub async fn delete_document_chunks(&self, document_path: &str) -> Result<usize> {
        let entries = self
            .store
            .get(Some(&MetadataFilter::by_document(document_path)))
            .await
            .with_context(|| format!("Failed to list chunks for {}", document_path))?;
        if entries.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = entries.into_iter().map(|e| e.id).collect();
        self.store
            .delete(&ids)
            .await
            .with_context(|| format!("Failed to delete chunks for {}", document_path))?;
        debug!(path = document_path, deleted = ids.len(), "deleted document chunks");
        Ok(ids.len())
    }

    /// Report whether indexed chunks were embedded with a different model.
    ///
    /// Advisory only: logs a warning and never blocks indexing.
    pub async fn check_model_mismatch(&self) -> Result<Option<ModelMismatch>> {
        let existing = self.existing_hashes().await?;
        Ok(self.mismatch_in(&existing))
    }

    fn mismatch_in(&self, existing: &BTreeMap<String, IndexedDocument>) -> Option<ModelMismatch> {
        let current = self.embedder.model_id();
        let stored = existing
            .values()
            .map(|d| d.embedding_model.as_str())
            .find(|m| !m.is_empty() && *m != current)?;
        warn!(
            stored,
            current,
            "indexed chunks were embedded with a different model; run a full ingest to re-embed"
        );
        Some(ModelMismatch {
            stored: stored.to_string(),
            current: current.to_string(),
        })
    }

    /// Embed and store chunks in batches. Returns the number stored.
    pub async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let ingested_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let model_id = self.embedder.model_id().to_string();
        let total_batches = chunks.len().div_ceil(self.batch_size);

        for (i, batch) in chunks.chunks(self.batch_size).enumerate() {
            let batch_no = i + 1;
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self
                .embedder
                .embed_batch(&texts, self.batch_size)
                .await
                .with_context(|| format!("embedding batch {} of {} failed", batch_no, total_batches))?;
            if embeddings.len() != batch.len() {
                bail!(
                    "embedding batch {} returned {} vectors for {} chunks",
                    batch_no,
                    embeddings.len(),
                    batch.len()
                );
            }

            let records: Vec<VectorRecord> = batch
                .iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| {
                    let mut chunk = chunk.clone();
                    chunk.metadata.embedding_model = model_id.clone();
                    chunk.metadata.ingested_at = ingested_at.clone();
                    VectorRecord::from_chunk(&chunk, embedding.vector)
                })
                .collect();
            self.store
                .upsert(&records)
                .await
                .with_context(|| format!("storing batch {} of {} failed", batch_no, total_batches))?;
            debug!(batch = batch_no, total_batches, chunks = batch.len(), "embedded batch");
        }
        Ok(chunks.len())
    }

    /// Bring the store in line with `documents`.
    pub async fn run(&self, documents: &[Document], full: bool) -> Result<IndexReport> {
        let existing = self.existing_hashes().await?;
        let model_mismatch = self.mismatch_in(&existing);
        let plan = plan(documents, &existing, full);

        let mut report = IndexReport {
            new: plan.new.len(),
            updated: plan.updated.len(),
            unchanged: plan.unchanged.len(),
            orphaned: plan.orphaned.len(),
            model_mismatch,
            ..Default::default()
        };

        let mut queued = Vec::new();
        for (doc, status) in plan.to_process() {
            if status == DocumentStatus::Updated {
                report.chunks_deleted += self.delete_document_chunks(&doc.path).await?;
            }
            let chunks = self.chunker.chunk(doc);
            debug!(path = %doc.path, ?status, chunks = chunks.len(), "queued document");
            queued.extend(chunks);
        }

        for path in &plan.orphaned {
            let removed = self.delete_document_chunks(path).await?;
            info!(path = %path, removed, "removed orphaned document");
            report.chunks_deleted += removed;
        }

        report.chunks_embedded = match self.embed_chunks(&queued).await {
            Ok(stored) => stored,
            Err(err) => {
                self.discard_queued(&plan).await;
                return Err(err);
            }
        };

        info!(
            new = report.new,
            updated = report.updated,
            unchanged = report.unchanged,
            orphaned = report.orphaned,
            chunks_embedded = report.chunks_embedded,
            "index run complete"
        );
        Ok(report)
    }

    /// Remove whatever earlier batches stored for the documents of a failed
    /// run, so the next run sees them as new instead of unchanged.
    async fn discard_queued(&self, plan: &IndexPlan<'_>) {
        for (doc, _) in plan.to_process() {
            match self.delete_document_chunks(&doc.path).await {
                Ok(0) => {}
                Ok(removed) => warn!(path = %doc.path, removed, "discarded partially indexed document"),
                Err(e) => warn!(path = %doc.path, error = %e, "failed to discard partially indexed document"),
            }
        }
    }

    /// Plan a run and count the chunks it would produce, without writing.
    pub async fn dry_run(&self, documents: &[Document], full: bool) -> Result<DryRunReport> {
        let existing = self.existing_hashes().await?;
        let plan = plan(documents, &existing, full);

        let mut report = DryRunReport {
            orphaned: plan.orphaned.clone(),
            ..Default::default()
        };
        for (doc, status) in plan.to_process() {
            let chunk_count = self.chunker.chunk(doc).len();
            report.total_chunks += chunk_count;
            report.documents.push(DryRunEntry {
                path: doc.path.clone(),
                status,
                chunk_count,
            });
        }
        for doc in &plan.unchanged {
            report.documents.push(DryRunEntry {
                path: doc.path.clone(),
                status: DocumentStatus::Unchanged,
                chunk_count: 0,
            });
        }
        report.documents.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkerConfig;
    use crate::embedding::Embedding;
    use crate::store::memory::InMemoryVectorStore;
    use crate::tokenizer::HeuristicCounter;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the size of each batch it receives.
    struct RecordingEmbedder {
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Embedder for RecordingEmbedder {
        fn model_id(&self) -> &str {
            "recording"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_batch(&self, texts: &[String], _batch_size: usize) -> Result<Vec<Embedding>> {
            self.batches.lock().unwrap().push(texts.len());
            Ok(texts
                .iter()
                .map(|t| Embedding {
                    vector: vec![t.len() as f32, 1.0],
                    model_id: "recording".into(),
                    token_count: 0,
                })
                .collect())
        }
        async fn is_available(&self) -> bool {
            true
        }
    }

    /// Succeeds for the first `ok_calls` batches, then fails every call.
    struct FlakyEmbedder {
        ok_calls: usize,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        fn model_id(&self) -> &str {
            "flaky"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_batch(&self, texts: &[String], _batch_size: usize) -> Result<Vec<Embedding>> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls > self.ok_calls {
                bail!("connection reset");
            }
            Ok(texts
                .iter()
                .map(|_| Embedding {
                    vector: vec![1.0, 0.0],
                    model_id: "flaky".into(),
                    token_count: 0,
                })
                .collect())
        }
        async fn is_available(&self) -> bool {
            true
        }
    }

    fn doc(path: &str, body: &str) -> Document {
        Document::from_raw(path, body, body, "Doc", "general", vec![])
    }

    fn existing(entries: &[(&str, &str)]) -> BTreeMap<String, IndexedDocument> {
        entries
            .iter()
            .map(|(path, hash)| {
                (
                    path.to_string(),
                    IndexedDocument {
                        content_hash: hash.to_string(),
                        embedding_model: "m".into(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_plan_classifies_documents() {
        let docs = vec![doc("same.md", "same"), doc("changed.md", "v2"), doc("fresh.md", "x")];
        let prior = existing(&[
            ("same.md", docs[0].content_hash.as_str()),
            ("changed.md", "oldhash"),
            ("gone.md", "h"),
        ]);
        let plan = plan(&docs, &prior, false);
        assert_eq!(plan.unchanged.len(), 1);
        assert_eq!(plan.unchanged[0].path, "same.md");
        assert_eq!(plan.updated[0].path, "changed.md");
        assert_eq!(plan.new[0].path, "fresh.md");
        assert_eq!(plan.orphaned, vec!["gone.md".to_string()]);
    }

    #[test]
    fn test_plan_full_reprocesses_unchanged_as_updated() {
        let docs = vec![doc("same.md", "same")];
        let prior = existing(&[("same.md", docs[0].content_hash.as_str())]);
        let plan = plan(&docs, &prior, true);
        assert!(plan.unchanged.is_empty());
        assert_eq!(plan.updated.len(), 1);
    }

    #[tokio::test]
    async fn test_embed_chunks_batches_in_order_and_stamps_metadata() {
        let embedder = Arc::new(RecordingEmbedder {
            batches: Mutex::new(Vec::new()),
        });
        let store = Arc::new(InMemoryVectorStore::new());
        let chunker = Chunker::new(ChunkerConfig::default(), Box::new(HeuristicCounter));
        let indexer = Indexer::new(chunker, embedder.clone(), store.clone(), 2);

        let chunks: Vec<Chunk> = (0..5)
            .map(|i| Chunk {
                chunk_id: format!("abc_{i}"),
                content: format!("chunk {i}"),
                token_count: 2,
                metadata: Default::default(),
            })
            .collect();
        assert_eq!(indexer.embed_chunks(&chunks).await.unwrap(), 5);
        assert_eq!(*embedder.batches.lock().unwrap(), vec![2, 2, 1]);

        let stored = store.get(None).await.unwrap();
        assert_eq!(stored.len(), 5);
        let stamp = &stored[0].metadata["ingested_at"];
        assert!(stamp.ends_with('Z'));
        for entry in &stored {
            assert_eq!(entry.metadata["embedding_model"], "recording");
            assert_eq!(&entry.metadata["ingested_at"], stamp);
        }
    }

    #[tokio::test]
    async fn test_failed_batch_discards_partial_document() {
        let store = Arc::new(InMemoryVectorStore::new());
        let sections = doc(
            "ops.md",
            "## One\n\nalpha.\n\n## Two\n\nbeta.\n\n## Three\n\ngamma.",
        );
        let docs = vec![sections];

        let flaky = Arc::new(FlakyEmbedder {
            ok_calls: 1,
            calls: Mutex::new(0),
        });
        let chunker = Chunker::new(ChunkerConfig::default(), Box::new(HeuristicCounter));
        assert_eq!(chunker.chunk(&docs[0]).len(), 3);
        let indexer = Indexer::new(chunker, flaky.clone(), store.clone(), 1);

        let err = indexer.run(&docs, false).await.unwrap_err();
        assert!(format!("{:#}", err).contains("embedding batch 2 of 3 failed"));
        assert_eq!(*flaky.calls.lock().unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 0);

        let healthy = Arc::new(RecordingEmbedder {
            batches: Mutex::new(Vec::new()),
        });
        let chunker = Chunker::new(ChunkerConfig::default(), Box::new(HeuristicCounter));
        let indexer = Indexer::new(chunker, healthy, store.clone(), 1);
        let report = indexer.run(&docs, false).await.unwrap();
        assert_eq!(report.new, 1);
        assert_eq!(report.unchanged, 0);
        assert_eq!(report.chunks_embedded, 3);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_failed_run_keeps_untouched_documents() {
        let store = Arc::new(InMemoryVectorStore::new());
        let stable = doc("stable.md", "## Stable\n\nkept.");
        let recording = Arc::new(RecordingEmbedder {
            batches: Mutex::new(Vec::new()),
        });
        let chunker = Chunker::new(ChunkerConfig::default(), Box::new(HeuristicCounter));
        Indexer::new(chunker, recording, store.clone(), 1)
            .run(std::slice::from_ref(&stable), false)
            .await
            .unwrap();

        let docs = vec![stable, doc("fresh.md", "## A\n\none.\n\n## B\n\ntwo.")];
        let flaky = Arc::new(FlakyEmbedder {
            ok_calls: 1,
            calls: Mutex::new(0),
        });
        let chunker = Chunker::new(ChunkerConfig::default(), Box::new(HeuristicCounter));
        let indexer = Indexer::new(chunker, flaky, store.clone(), 1);
        assert!(indexer.run(&docs, false).await.is_err());

        let remaining = store.get(None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].metadata["document_path"], "stable.md");
    }

    #[tokio::test]
    async fn test_check_model_mismatch_reports_stored_model() {
        let store = Arc::new(InMemoryVectorStore::new());
        let recording = Arc::new(RecordingEmbedder {
            batches: Mutex::new(Vec::new()),
        });
        let chunker = Chunker::new(ChunkerConfig::default(), Box::new(HeuristicCounter));
        let indexer = Indexer::new(chunker, recording, store.clone(), 8);
        indexer.run(&[doc("a.md", "# A\n\nbody")], false).await.unwrap();
        assert_eq!(indexer.check_model_mismatch().await.unwrap(), None);

        let other = Arc::new(FlakyEmbedder {
            ok_calls: 0,
            calls: Mutex::new(0),
        });
        let chunker = Chunker::new(ChunkerConfig::default(), Box::new(HeuristicCounter));
        let mismatch = Indexer::new(chunker, other, store, 8)
            .check_model_mismatch()
            .await
            .unwrap();
        assert_eq!(
            mismatch,
            Some(ModelMismatch {
                stored: "recording".into(),
                current: "flaky".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let embedder = Arc::new(RecordingEmbedder {
            batches: Mutex::new(Vec::new()),
        });
        let store = Arc::new(InMemoryVectorStore::new());
        let chunker = Chunker::new(ChunkerConfig::default(), Box::new(HeuristicCounter));
        let indexer = Indexer::new(chunker, embedder.clone(), store.clone(), 32);

        let docs = vec![doc("b.md", "# B\n\nbody"), doc("a.md", "# A\n\nbody")];
        let report = indexer.dry_run(&docs, false).await.unwrap();
        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.documents[0].path, "a.md");
        assert!(report
            .documents
            .iter()
            .all(|d| d.status == DocumentStatus::New && d.chunk_count == 1));
        assert_eq!(report.total_chunks, 2);
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(embedder.batches.lock().unwrap().is_empty());
    }
}
