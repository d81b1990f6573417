//! Token-budgeted packing of one section into chunk-sized pieces.

use regex::Regex;
use std::sync::LazyLock;

use super::atomic::Protected;
use crate::tokenizer::TokenCounter;

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n+").expect("valid paragraph regex"));

const PARAGRAPH_JOINER: &str = "\n\n";

/// Final text of one chunk and its token count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub content: String,
    pub token_count: usize,
}

struct Buffer<'a> {
    paragraphs: Vec<&'a str>,
    tokens: usize,
}

impl<'a> Buffer<'a> {
    fn joined_with(&self, next: &str) -> String {
        let mut s = self.paragraphs.join(PARAGRAPH_JOINER);
        s.push_str(PARAGRAPH_JOINER);
        s.push_str(next);
        s
    }

    fn flush(&mut self, protected: &Protected, out: &mut Vec<Piece>) {
        if self.paragraphs.is_empty() {
            return;
        }
        out.push(Piece {
            content: protected.restore(&self.paragraphs.join(PARAGRAPH_JOINER)),
            token_count: self.tokens,
        });
        self.paragraphs.clear();
        self.tokens = 0;
    }
}

/// Split `content` into pieces of at most `max_tokens`.
///
/// Content that already fits is returned whole. Otherwise code blocks and
/// tables are protected, the rest is split on blank lines, and paragraphs
/// are packed greedily. A paragraph that alone exceeds `max_tokens` is
/// emitted as its own piece rather than cut.
pub fn pack_section(content: &str, counter: &dyn TokenCounter, max_tokens: usize) -> Vec<Piece> {
    let total = counter.count_tokens(content);
    if total <= max_tokens {
        return vec![Piece {
            content: content.to_string(),
            token_count: total,
        }];
    }

    let protected = Protected::new(content);
    let mut pieces = Vec::new();
    let mut buffer = Buffer {
        paragraphs: Vec::new(),
        tokens: 0,
    };

    let paragraphs = PARAGRAPH_BREAK
        .split(&protected.text)
        .map(str::trim)
        .filter(|p| !p.is_empty());

    for para in paragraphs {
        let para_tokens = counter.count_tokens(&protected.restore(para));

        if para_tokens > max_tokens {
            buffer.flush(&protected, &mut pieces);
            pieces.push(Piece {
                content: protected.restore(para),
                token_count: para_tokens,
            });
            continue;
        }

        if buffer.paragraphs.is_empty() {
            buffer.paragraphs.push(para);
            buffer.tokens = para_tokens;
            continue;
        }

        let combined = counter.count_tokens(&protected.restore(&buffer.joined_with(para)));
        if combined > max_tokens {
            buffer.flush(&protected, &mut pieces);
            buffer.paragraphs.push(para);
            buffer.tokens = para_tokens;
        } else {
            buffer.paragraphs.push(para);
            buffer.tokens = combined;
        }
    }
    buffer.flush(&protected, &mut pieces);

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::HeuristicCounter;

    /// One token per whitespace-separated word.
    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count_tokens(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
        fn name(&self) -> &str {
            "words"
        }
    }

    #[test]
    fn test_fitting_section_returned_whole() {
        let text = "## Heading\n\nShort body.";
        let pieces = pack_section(text, &HeuristicCounter, 500);
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].content, text);
        assert_eq!(pieces[0].token_count, HeuristicCounter.count_tokens(text));
    }

    #[test]
    fn test_greedy_packing_respects_budget() {
        let text = "a b c\n\nd e f\n\ng h i\n\nj k l";
        let pieces = pack_section(text, &WordCounter, 6);
        let contents: Vec<&str> = pieces.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, vec!["a b c\n\nd e f", "g h i\n\nj k l"]);
        assert!(pieces.iter().all(|p| p.token_count <= 6));
    }

    #[test]
    fn test_oversized_paragraph_emitted_alone() {
        let text = "one two\n\nthree four five six seven eight\n\nnine";
        let pieces = pack_section(text, &WordCounter, 4);
        let contents: Vec<&str> = pieces.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["one two", "three four five six seven eight", "nine"]
        );
        assert_eq!(pieces[1].token_count, 6);
    }

    #[test]
    fn test_code_block_with_blank_lines_kept_whole() {
        let code = "```sh\necho one\n\necho two\n\necho three\n```";
        let text = format!("intro words here\n\n{}\n\noutro words here", code);
        let pieces = pack_section(&text, &WordCounter, 4);
        let holding: Vec<&Piece> = pieces.iter().filter(|p| p.content.contains("```")).collect();
        assert_eq!(holding.len(), 1);
        assert!(holding[0].content.contains(code));
        assert_eq!(holding[0].token_count, WordCounter.count_tokens(code));
    }

    #[test]
    fn test_table_kept_whole() {
        let table = "| col | val |\n|---|---|\n| a | 1 |\n| b | 2 |";
        let text = format!("lead in text\n\n{}\n\ntrailing words", table);
        let pieces = pack_section(&text, &WordCounter, 5);
        assert!(pieces.iter().any(|p| p.content == table));
    }

    #[test]
    fn test_no_placeholder_leaks() {
        let text = "x x x x\n\n```\ny\n```\n\n| a |\n| b |\n\nz z z z";
        for p in pack_section(text, &WordCounter, 3) {
            assert!(!p.content.contains('\u{E000}'));
            assert!(!p.content.contains('\u{E001}'));
        }
    }
}
