//! Question answering command: retrieve, then generate a grounded answer.

use anyhow::{bail, Result};
use doc_rag_core::answer::RagAnswer;
use doc_rag_core::retrieve::RetrieveOptions;

use crate::config::Config;
use crate::pipeline;

pub async fn run_ask(config: &Config, question: &str, options: &RetrieveOptions) -> Result<()> {
    if question.trim().is_empty() {
        bail!("Question must not be empty");
    }

    let store = pipeline::open_store(config).await?;
    let answerer = pipeline::build_answerer(config, store.clone())?;
    let answer = answerer.answer(question, options).await?;
    print_answer(&answer);

    store.close().await;
    Ok(())
}

fn print_answer(answer: &RagAnswer) {
    println!("Answer:");
    println!("{}", answer.answer);

    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!(
                "  - {} ({}) [{:.3}]",
                source.metadata.document_path,
                source.source_label(),
                source.similarity
            );
        }
    }

    tracing::info!(
        model = %answer.model,
        prompt_tokens = answer.prompt_tokens,
        completion_tokens = answer.completion_tokens,
        "answered question"
    );
}
