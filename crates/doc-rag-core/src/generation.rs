//! Text generation contract.
//!
//! The retriever's output is consumed by a [`Generator`] through
//! [`crate::answer::Answerer`]. Concrete backends live in the app crate.

use anyhow::Result;
use async_trait::async_trait;

/// Inputs for one generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_prompt: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub stop_sequences: Vec<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: String::new(),
            max_tokens: 1024,
            temperature: 0.7,
            stop_sequences: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerationResult {
    pub text: String,
    pub model_id: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn model_id(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult>;

    async fn is_available(&self) -> bool;
}
