//! Token counting for chunk budgets.
//!
//! The chunker measures every span through a [`TokenCounter`]. Counts only
//! need to be deterministic and roughly aligned with the downstream model's
//! context accounting; exact agreement with a particular model is not
//! required.
//!
//! - [`TiktokenCounter`] uses a BPE vocabulary bundled with `tiktoken-rs`
//!   (`cl100k_base` by default). No network access is needed.
//! - [`HeuristicCounter`] uses a 4 chars ≈ 1 token ratio.
//!
//! ```rust
//! use doc_rag_core::tokenizer::{HeuristicCounter, TokenCounter};
//!
//! assert_eq!(HeuristicCounter.count_tokens("abcdefgh"), 2);
//! assert_eq!(HeuristicCounter.count_tokens(""), 0);
//! ```

use anyhow::{bail, Context, Result};
use tiktoken_rs::CoreBPE;

/// Default vocabulary name.
pub const DEFAULT_TOKENIZER: &str = "cl100k_base";

/// Names accepted by [`counter_from_name`].
pub const KNOWN_TOKENIZERS: &[&str] = &[
    "cl100k_base",
    "o200k_base",
    "p50k_base",
    "r50k_base",
    "heuristic",
];

/// Approximate characters-per-token ratio used by [`HeuristicCounter`].
const CHARS_PER_TOKEN: usize = 4;

/// Counts tokens in a span of text.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;

    /// Vocabulary name, for logs.
    fn name(&self) -> &str;
}

/// BPE token counter backed by a `tiktoken-rs` vocabulary.
pub struct TiktokenCounter {
    name: String,
    bpe: CoreBPE,
}

impl TiktokenCounter {
    /// Load a bundled vocabulary by name.
    ///
    /// Supported: `cl100k_base`, `o200k_base`, `p50k_base`, `r50k_base`.
    pub fn new(name: &str) -> Result<Self> {
        let bpe = match name {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "o200k_base" => tiktoken_rs::o200k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "r50k_base" => tiktoken_rs::r50k_base(),
            other => bail!("Unknown tokenizer vocabulary: '{}'", other),
        }
        .with_context(|| format!("Failed to load tokenizer vocabulary '{}'", name))?;

        Ok(Self {
            name: name.to_string(),
            bpe,
        })
    }

    pub fn cl100k() -> Result<Self> {
        Self::new(DEFAULT_TOKENIZER)
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_ordinary(text).len()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Character-ratio estimate: `ceil(chars / 4)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(CHARS_PER_TOKEN)
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

/// Build a counter from a configuration name.
///
/// `"heuristic"` selects [`HeuristicCounter`]; anything else is treated as
/// a `tiktoken-rs` vocabulary name.
pub fn counter_from_name(name: &str) -> Result<Box<dyn TokenCounter>> {
    match name {
        "heuristic" => Ok(Box::new(HeuristicCounter)),
        other => Ok(Box::new(TiktokenCounter::new(other)?)),
    }
}
