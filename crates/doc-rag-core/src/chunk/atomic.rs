//! Atomic units: spans that must never be split across chunks.
//!
//! Two kinds are recognized: complete fenced code blocks (triple backticks,
//! including any language tag) and pipe tables (two or more consecutive
//! lines that each start and end with `|`). An unterminated fence does not
//! match and is treated as ordinary text.
//!
//! [`Protected`] swaps each unit for a placeholder so paragraph splitting
//! cannot cut through it, and restores the originals afterwards.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid code fence regex"));

static PIPE_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\|.*\|[ \t]*$(?:\n\|.*\|[ \t]*$)+").expect("valid pipe table regex")
});

const PLACEHOLDER_OPEN: char = '\u{E000}';
const PLACEHOLDER_CLOSE: char = '\u{E001}';

/// Byte ranges of complete fenced code blocks.
pub(crate) fn code_fence_spans(text: &str) -> Vec<Range<usize>> {
    CODE_FENCE.find_iter(text).map(|m| m.range()).collect()
}

fn atomic_spans(text: &str) -> Vec<Range<usize>> {
    let fences = code_fence_spans(text);
    let mut spans: Vec<Range<usize>> = PIPE_TABLE
        .find_iter(text)
        .map(|m| m.range())
        .filter(|t| !fences.iter().any(|f| f.start < t.end && t.start < f.end))
        .collect();
    spans.extend(fences);
    spans.sort_by_key(|r| r.start);
    spans
}

/// Literal code blocks and tables in `text`, in document order.
pub fn extract_atomic_units(text: &str) -> Vec<&str> {
    atomic_spans(text)
        .into_iter()
        .map(|r| &text[r])
        .collect()
}

/// Text with its atomic units replaced by placeholders.
#[derive(Debug, Clone)]
pub struct Protected {
    pub text: String,
    units: Vec<String>,
}

impl Protected {
    pub fn new(text: &str) -> Self {
        let spans = atomic_spans(text);
        let mut out = String::with_capacity(text.len());
        let mut units = Vec::with_capacity(spans.len());
        let mut cursor = 0;

        for span in spans {
            out.push_str(&text[cursor..span.start]);
            out.push_str(&placeholder(units.len()));
            units.push(text[span.clone()].to_string());
            cursor = span.end;
        }
        out.push_str(&text[cursor..]);

        Self { text: out, units }
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Put the original units back into a fragment of [`Protected::text`].
    pub fn restore(&self, fragment: &str) -> String {
        if self.units.is_empty() || !fragment.contains(PLACEHOLDER_OPEN) {
            return fragment.to_string();
        }
        let mut restored = fragment.to_string();
        for (i, unit) in self.units.iter().enumerate() {
            restored = restored.replace(&placeholder(i), unit);
        }
        restored
    }
}

fn placeholder(index: usize) -> String {
    format!("{}ATOMIC_{}{}", PLACEHOLDER_OPEN, index, PLACEHOLDER_CLOSE)
}
