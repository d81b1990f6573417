//! Semantic search and document display commands.

use anyhow::Result;
use doc_rag_core::models::RetrievedChunk;
use doc_rag_core::retrieve::RetrieveOptions;

use crate::config::Config;
use crate::pipeline;

/// Width of the content preview printed per hit.
const PREVIEW_CHARS: usize = 240;

pub async fn run_search(config: &Config, query: &str, options: &RetrieveOptions) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let store = pipeline::open_store(config).await?;
    let retriever = pipeline::build_retriever(config, store.clone())?;
    let results = retriever.retrieve(query, options).await?;

    if results.is_empty() {
        println!("No results.");
    } else {
        for (i, chunk) in results.iter().enumerate() {
            print_hit(i + 1, chunk);
        }
    }

    store.close().await;
    Ok(())
}

/// Print every chunk of one document, in order.
pub async fn run_show(config: &Config, path: &str) -> Result<()> {
    let store = pipeline::open_store(config).await?;
    let retriever = pipeline::build_retriever(config, store.clone())?;
    let chunks = retriever.retrieve_by_document(path).await?;

    if chunks.is_empty() {
        println!("No chunks indexed for {}", path);
    }
    for chunk in &chunks {
        println!("--- {} ({})", chunk.chunk_id, chunk.source_label());
        println!("{}", chunk.content);
        println!();
    }

    store.close().await;
    Ok(())
}

fn print_hit(rank: usize, chunk: &RetrievedChunk) {
    println!(
        "{}. [{:.3}] {}  ({})",
        rank,
        chunk.similarity,
        chunk.metadata.document_path,
        chunk.source_label()
    );
    if !chunk.metadata.category.is_empty() {
        println!("    category: {}", chunk.metadata.category);
    }
    println!("    {}", preview(&chunk.content));
    println!();
}

fn preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_flattens_and_truncates() {
        assert_eq!(preview("a\n\n  b\tc"), "a b c");
        let long = "word ".repeat(100);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert!(p.chars().count() <= PREVIEW_CHARS + 3);
    }
}
