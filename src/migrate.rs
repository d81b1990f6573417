use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the chunk table and its indexes. Idempotent.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            document TEXT NOT NULL,
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            document_path TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT '',
            metadata_json TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_path ON chunks(document_path)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_category ON chunks(category)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(&config.store.path).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}
