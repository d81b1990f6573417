//! Index status overview.
//!
//! Shows provider reachability, what is indexed (chunk and document counts,
//! embedding models, last ingest time) and a per-category breakdown. Used
//! by `doc-rag status` to confirm that ingestion is working before asking
//! questions.

use anyhow::Result;
use chrono::{DateTime, Utc};
use doc_rag_core::index::Indexer;
use sqlx::Row;

use crate::config::Config;
use crate::pipeline;
use crate::providers;

struct CategoryStats {
    category: String,
    doc_count: i64,
    chunk_count: i64,
}

pub async fn run_status(config: &Config) -> Result<()> {
    let embedder = providers::create_embedder(&config.embedding)?;
    let generator = providers::create_generator(&config.generation)?;
    let embed_ok = embedder.is_available().await;
    let generate_ok = generator.is_available().await;

    let store = pipeline::open_store(config).await?;
    let pool = store.pool();

    let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(pool)
        .await?;
    let total_docs: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT document_path) FROM chunks")
        .fetch_one(pool)
        .await?;
    let models: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT model FROM (
             SELECT json_extract(metadata_json, '$.embedding_model') AS model FROM chunks
         ) WHERE model IS NOT NULL AND model != '' ORDER BY model",
    )
    .fetch_all(pool)
    .await?;
    let last_ingest: Option<String> =
        sqlx::query_scalar("SELECT MAX(json_extract(metadata_json, '$.ingested_at')) FROM chunks")
            .fetch_one(pool)
            .await?;

    let mismatch = if config.embedding.is_enabled() {
        Indexer::new(
            pipeline::build_chunker(config)?,
            embedder.clone(),
            store.clone(),
            config.embedding.batch_size,
        )
        .check_model_mismatch()
        .await?
    } else {
        None
    };

    let db_size = std::fs::metadata(&config.store.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("doc-rag status");
    println!("==============");
    println!();
    println!("  Providers:");
    println!(
        "    Embedding:   {} ({}) {}",
        embedder.model_id(),
        config.embedding.provider,
        availability(embed_ok)
    );
    println!(
        "    Generation:  {} ({}) {}",
        generator.model_id(),
        config.generation.provider,
        availability(generate_ok)
    );
    println!();
    println!("  Database:");
    println!("    Path:        {}", config.store.path.display());
    println!("    Size:        {}", format_bytes(db_size));
    println!("    Documents:   {}", total_docs);
    println!("    Chunks:      {}", total_chunks);
    println!(
        "    Embedding model: {}",
        if models.is_empty() {
            "-".to_string()
        } else {
            models.join(", ")
        }
    );
    println!(
        "    Last ingest: {}",
        last_ingest
            .as_deref()
            .map(format_ts_relative)
            .unwrap_or_else(|| "never".to_string())
    );
    if let Some(mismatch) = &mismatch {
        println!(
            "    Warning: index was built with '{}' but the active model is '{}'. Run `doc-rag ingest --full`.",
            mismatch.stored, mismatch.current
        );
    }

    let rows = sqlx::query(
        r#"
        SELECT
            category,
            COUNT(DISTINCT document_path) AS doc_count,
            COUNT(*) AS chunk_count
        FROM chunks
        GROUP BY category
        ORDER BY doc_count DESC, category
        "#,
    )
    .fetch_all(pool)
    .await?;

    let categories: Vec<CategoryStats> = rows
        .iter()
        .map(|row| CategoryStats {
            category: row.get("category"),
            doc_count: row.get("doc_count"),
            chunk_count: row.get("chunk_count"),
        })
        .collect();

    if !categories.is_empty() {
        println!();
        println!("  By category:");
        println!("    {:<24} {:>6} {:>8}", "CATEGORY", "DOCS", "CHUNKS");
        println!("    {}", "-".repeat(40));
        for c in &categories {
            println!(
                "    {:<24} {:>6} {:>8}",
                c.category, c.doc_count, c.chunk_count
            );
        }
    }

    println!();
    println!("  Paths:");
    println!("    Docs root:   {}", config.docs.root.display());
    println!();

    store.close().await;
    Ok(())
}

fn availability(ok: bool) -> &'static str {
    if ok {
        "[available]"
    } else {
        "[unavailable]"
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Render an RFC 3339 timestamp relative to now (e.g. "3 hours ago").
fn format_ts_relative(ts: &str) -> String {
    let Ok(parsed) = DateTime::parse_from_rfc3339(ts) else {
        return ts.to_string();
    };
    let then = parsed.with_timezone(&Utc);
    let delta = (Utc::now() - then).num_seconds();

    if delta < 0 {
        then.format("%Y-%m-%d %H:%M").to_string()
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        then.format("%Y-%m-%d %H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_ts_relative() {
        let two_hours_ago = (Utc::now() - chrono::Duration::hours(2)).to_rfc3339();
        assert_eq!(format_ts_relative(&two_hours_ago), "2 hours ago");
        assert_eq!(
            format_ts_relative("2020-01-02T03:04:05Z"),
            "2020-01-02 03:04"
        );
        assert_eq!(format_ts_relative("garbage"), "garbage");
    }
}
