//! In-memory [`VectorStore`] implementation for tests and embedded use.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`, kept in insertion
//! order. Queries are brute-force squared-L2 over all matching records.

use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;

use super::{MetadataFilter, QueryHit, StoredEntry, VectorRecord, VectorStore};
use crate::embedding::squared_l2_distance;

/// In-memory vector store.
#[derive(Default)]
pub struct InMemoryVectorStore {
    records: RwLock<Vec<VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err<T>(_: PoisonError<T>) -> anyhow::Error {
    anyhow::anyhow!("in-memory store lock poisoned")
}

fn passes(filter: Option<&MetadataFilter>, record: &VectorRecord) -> bool {
    filter.map_or(true, |f| f.matches(&record.metadata))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut stored = self.records.write().map_err(lock_err)?;
        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>> {
        let stored = self.records.read().map_err(lock_err)?;
        let mut hits: Vec<QueryHit> = stored
            .iter()
            .filter(|r| passes(filter, r))
            .map(|r| QueryHit {
                id: r.id.clone(),
                document: r.document.clone(),
                metadata: r.metadata.clone(),
                distance: squared_l2_distance(vector, &r.vector),
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn get(&self, filter: Option<&MetadataFilter>) -> Result<Vec<StoredEntry>> {
        let stored = self.records.read().map_err(lock_err)?;
        Ok(stored
            .iter()
            .filter(|r| passes(filter, r))
            .map(|r| StoredEntry {
                id: r.id.clone(),
                document: r.document.clone(),
                metadata: r.metadata.clone(),
            })
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut stored = self.records.write().map_err(lock_err)?;
        stored.retain(|r| !ids.contains(&r.id));
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().map_err(lock_err)?.len())
    }
}
