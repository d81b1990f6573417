//! Coalescing of undersized adjacent chunks.
//!
//! Two neighbours merge when the first is below `min_tokens`, their summed
//! token counts fit in `target_tokens`, and both share the same h2. The
//! merged chunk keeps the first chunk's metadata and may keep absorbing
//! following chunks under the same rule. h1 and h3 are not compared, so a
//! merge can cross h3 boundaries inside one h2.

use super::chunk_id;
use crate::models::Chunk;

fn should_merge(current: &Chunk, next: &Chunk, min_tokens: usize, target_tokens: usize) -> bool {
    current.token_count < min_tokens
        && current.token_count + next.token_count <= target_tokens
        && current.metadata.h2 == next.metadata.h2
}

/// Merge small chunks left to right, then renumber ids from 0 under
/// `content_hash`.
pub fn merge_small_chunks(
    chunks: Vec<Chunk>,
    min_tokens: usize,
    target_tokens: usize,
    content_hash: &str,
) -> Vec<Chunk> {
    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());
    let mut current: Option<Chunk> = None;

    for chunk in chunks {
        current = match current.take() {
            None => Some(chunk),
            Some(mut cur) if should_merge(&cur, &chunk, min_tokens, target_tokens) => {
                cur.content.push_str("\n\n");
                cur.content.push_str(&chunk.content);
                cur.token_count += chunk.token_count;
                Some(cur)
            }
            Some(cur) => {
                merged.push(cur);
                Some(chunk)
            }
        };
    }
    merged.extend(current);

    for (i, chunk) in merged.iter_mut().enumerate() {
        chunk.chunk_id = chunk_id(content_hash, i);
    }
    merged
}
