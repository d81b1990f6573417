//! Heading-boundary section splitting.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

use super::atomic::code_fence_spans;
use crate::models::{HeadingContext, Section};

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(#{1,6})[ \t]+(.+)$").expect("valid heading regex"));

struct Heading<'a> {
    span: Range<usize>,
    level: usize,
    line: &'a str,
    text: &'a str,
}

/// Heading lines in document order, skipping any inside a fenced code block.
fn find_headings(content: &str) -> Vec<Heading<'_>> {
    let fences = code_fence_spans(content);
    HEADING
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if fences.iter().any(|f| f.contains(&whole.start())) {
                return None;
            }
            Some(Heading {
                span: whole.range(),
                level: caps.get(1)?.as_str().len(),
                line: whole.as_str().trim_end(),
                text: caps.get(2)?.as_str().trim(),
            })
        })
        .collect()
}

/// Split `content` into sections at heading boundaries.
///
/// `fallback_title` seeds h1 for any text before the first level-1
/// heading. Each section owns a copy of the heading context active when
/// it began.
pub fn split_sections(content: &str, fallback_title: &str) -> Vec<Section> {
    let mut context = HeadingContext::with_title(fallback_title);
    let headings = find_headings(content);

    if headings.is_empty() {
        return vec![Section {
            content: content.trim().to_string(),
            context,
            level: 1,
        }];
    }

    let mut sections = Vec::with_capacity(headings.len() + 1);

    let intro = content[..headings[0].span.start].trim();
    if !intro.is_empty() {
        sections.push(Section {
            content: intro.to_string(),
            context: context.clone(),
            level: 0,
        });
    }

    for (i, heading) in headings.iter().enumerate() {
        context.apply_heading(heading.level, heading.text);

        let end = headings
            .get(i + 1)
            .map(|next| next.span.start)
            .unwrap_or(content.len());
        let body = content[heading.span.end..end].trim();

        let text = if body.is_empty() {
            heading.line.to_string()
        } else {
            format!("{}\n\n{}", heading.line, body)
        };

        sections.push(Section {
            content: text,
            context: context.clone(),
            level: heading.level,
        });
    }

    sections
}
