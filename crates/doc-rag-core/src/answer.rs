//! Answer assembly: retrieved chunks → prompt → generator.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::generation::{GenerationRequest, Generator};
use crate::models::RetrievedChunk;
use crate::retrieve::{RetrieveOptions, Retriever};

pub const SYSTEM_PROMPT: &str = "You are an SRE (Site Reliability Engineering) assistant specialized in OpenShift and Kubernetes infrastructure.

Your role is to help engineers with:
- Troubleshooting cluster issues
- Understanding runbooks and procedures
- Explaining architecture decisions
- Providing operational guidance

Guidelines:
1. Always cite your sources by referencing the document sections provided
2. If the context doesn't contain relevant information, explicitly say so
3. Be concise but thorough in your explanations
4. When discussing commands, include the exact syntax
5. Highlight any warnings or caveats mentioned in the documentation
6. If multiple approaches exist, present them with their trade-offs

When you don't have enough context to answer fully, acknowledge this and suggest what additional information might be helpful.";

/// Returned without a generation call when retrieval finds nothing.
pub const NO_CONTEXT_ANSWER: &str = "I couldn't find any relevant documentation to answer your question. Please try rephrasing or check if the topic is covered in the documentation.";

pub const DEFAULT_ANSWER_MAX_TOKENS: usize = 2048;
pub const DEFAULT_ANSWER_TEMPERATURE: f32 = 0.3;
const SOURCE_SEPARATOR: &str = "\n\n---\n\n";

/// Fill the question template.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Based on the following documentation excerpts, answer the user's question.

## Documentation Context

{context}

## Question

{question}

## Instructions

1. Answer the question using the provided documentation context
2. Cite specific sources using the breadcrumb paths (e.g., \"According to [Runbook > Pod Troubleshooting > CrashLoopBackOff]...\")
3. If the context doesn't fully answer the question, acknowledge what's missing
4. Provide actionable steps when applicable

Answer:"
    )
}

/// Number and label each chunk as a source block.
///
/// ```rust
/// use doc_rag_core::answer::build_context;
/// use doc_rag_core::models::{ChunkMetadata, RetrievedChunk};
///
/// let chunk = RetrievedChunk {
///     chunk_id: "abc_0".into(),
///     content: "Restart the pod.".into(),
///     metadata: ChunkMetadata {
///         breadcrumb: "Pods > Restart".into(),
///         category: "runbook".into(),
///         ..Default::default()
///     },
///     similarity: 0.9,
/// };
/// assert_eq!(
///     build_context(&[chunk]),
///     "### Source 1: Pods > Restart [runbook]\n\nRestart the pod."
/// );
/// ```
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let header = if chunk.metadata.category.is_empty() {
                format!("### Source {}: {}", i + 1, chunk.source_label())
            } else {
                format!(
                    "### Source {}: {} [{}]",
                    i + 1,
                    chunk.source_label(),
                    chunk.metadata.category
                )
            };
            format!("{}\n\n{}", header, chunk.content)
        })
        .collect::<Vec<_>>()
        .join(SOURCE_SEPARATOR)
}

#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<RetrievedChunk>,
    pub query: String,
    pub model: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

pub struct Answerer {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    max_tokens: usize,
    temperature: f32,
}

impl Answerer {
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>) -> Self {
        Self {
            retriever,
            generator,
            max_tokens: DEFAULT_ANSWER_MAX_TOKENS,
            temperature: DEFAULT_ANSWER_TEMPERATURE,
        }
    }

    pub fn with_sampling(mut self, max_tokens: usize, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub async fn answer(&self, question: &str, options: &RetrieveOptions) -> Result<RagAnswer> {
        let sources = self.retriever.retrieve(question, options).await?;

        if sources.is_empty() {
            return Ok(RagAnswer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources,
                query: question.to_string(),
                model: self.generator.model_id().to_string(),
                prompt_tokens: 0,
                completion_tokens: 0,
            });
        }

        let request = GenerationRequest {
            prompt: build_prompt(&build_context(&sources), question),
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stop_sequences: Vec::new(),
        };
        let result = self
            .generator
            .generate(&request)
            .await
            .context("Answer generation failed")?;

        tracing::debug!(
            sources = sources.len(),
            prompt_tokens = result.prompt_tokens,
            completion_tokens = result.completion_tokens,
            "generated answer"
        );

        Ok(RagAnswer {
            answer: result.text.trim().to_string(),
            sources,
            query: question.to_string(),
            model: result.model_id,
            prompt_tokens: result.prompt_tokens,
            completion_tokens: result.completion_tokens,
        })
    }
}
