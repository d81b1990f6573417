//! SQLite-backed [`VectorStore`] implementation.
//!
//! One row per chunk: the text, the embedding as a little-endian `f32`
//! BLOB, and the metadata map as JSON. `document_path` and `category` are
//! also stored as indexed columns so filters run in SQL. Nearest-neighbour
//! search is a brute-force squared-L2 scan over the filtered rows.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use doc_rag_core::embedding::{blob_to_vec, squared_l2_distance, vec_to_blob};
use doc_rag_core::models::StoreMetadata;
use doc_rag_core::store::{MetadataFilter, QueryHit, StoredEntry, VectorRecord, VectorStore};

use crate::db;
use crate::migrate;

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the database at `path` and ensure the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::create_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Delete every chunk. Returns the number of rows removed.
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chunks")
            .execute(&self.pool)
            .await
            .context("Failed to clear chunks")?;
        Ok(result.rows_affected())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Build a `WHERE` clause and its bind values, in placeholder order.
fn filter_sql(filter: Option<&MetadataFilter>) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();

    if let Some(f) = filter {
        if let Some(category) = &f.category {
            clauses.push("category = ?");
            binds.push(category.clone());
        }
        if let Some(path) = &f.document_path {
            clauses.push("document_path = ?");
            binds.push(path.clone());
        }
        if let Some(prefix) = &f.path_prefix {
            clauses.push("substr(document_path, 1, length(?)) = ?");
            binds.push(prefix.clone());
            binds.push(prefix.clone());
        }
    }

    if clauses.is_empty() {
        (String::new(), binds)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), binds)
    }
}

fn decode_metadata(row: &SqliteRow) -> Result<StoreMetadata> {
    let json: String = row.get("metadata_json");
    let id: String = row.get("id");
    serde_json::from_str(&json).with_context(|| format!("Corrupt metadata for chunk {}", id))
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            let field = |key: &str| record.metadata.get(key).cloned().unwrap_or_default();
            let metadata_json = serde_json::to_string(&record.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO chunks (id, document, embedding, dims, document_path, category, metadata_json)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    document = excluded.document,
                    embedding = excluded.embedding,
                    dims = excluded.dims,
                    document_path = excluded.document_path,
                    category = excluded.category,
                    metadata_json = excluded.metadata_json
                "#,
            )
            .bind(&record.id)
            .bind(&record.document)
            .bind(vec_to_blob(&record.vector))
            .bind(record.vector.len() as i64)
            .bind(field("document_path"))
            .bind(field("category"))
            .bind(metadata_json)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert chunk {}", record.id))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>> {
        let (where_sql, binds) = filter_sql(filter);
        let sql = format!(
            "SELECT id, document, embedding, metadata_json FROM chunks{}",
            where_sql
        );
        let mut query = sqlx::query(&sql);
        for value in &binds {
            query = query.bind(value.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            hits.push(QueryHit {
                id: row.get("id"),
                document: row.get("document"),
                metadata: decode_metadata(row)?,
                distance: squared_l2_distance(vector, &blob_to_vec(&blob)),
            });
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn get(&self, filter: Option<&MetadataFilter>) -> Result<Vec<StoredEntry>> {
        let (where_sql, binds) = filter_sql(filter);
        let sql = format!(
            "SELECT id, document, metadata_json FROM chunks{} ORDER BY rowid",
            where_sql
        );
        let mut query = sqlx::query(&sql);
        for value in &binds {
            query = query.bind(value.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                Ok(StoredEntry {
                    id: row.get("id"),
                    document: row.get("document"),
                    metadata: decode_metadata(row)?,
                })
            })
            .collect()
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM chunks WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
