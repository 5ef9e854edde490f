//! Paragraph-boundary text chunker with overlap.
//!
//! Splits extracted document text into [`Chunk`]s bounded by a character
//! budget. Splitting prefers paragraph boundaries (`\n\n`); oversized
//! paragraphs are hard-split at word boundaries. Consecutive chunks share a
//! configurable overlap so retrieval does not lose context at cut points.
//!
//! Each chunk receives a v4 UUID plus a SHA-256 hash of its text for
//! staleness detection, and contiguous indices starting at 0.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::models::Chunk;

pub fn chunk_text(document_locator: &str, text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let max_chars = config.max_chars;
    let overlap = config.overlap_chars.min(max_chars.saturating_sub(1));

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current_buf = String::new();
    let mut chunk_index: i64 = 0;

    let flush = |buf: &mut String, index: &mut i64, chunks: &mut Vec<Chunk>| {
        if buf.trim().is_empty() {
            return;
        }
        chunks.push(make_chunk(document_locator, *index, buf.trim()));
        *index += 1;
        // Seed the next buffer with the tail of this one
        let tail = char_tail(buf, overlap);
        let carried = tail.to_string();
        buf.clear();
        buf.push_str(&carried);
    };

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let para_chars = trimmed.chars().count();
        let would_be = if current_buf.is_empty() {
            para_chars
        } else {
            current_buf.chars().count() + 2 + para_chars
        };

        if would_be > max_chars && !current_buf.trim().is_empty() {
            flush(&mut current_buf, &mut chunk_index, &mut chunks);
            // Drop the carried overlap if it cannot fit alongside the paragraph
            if current_buf.chars().count() + 2 + para_chars > max_chars {
                current_buf.clear();
            }
        }

        if para_chars > max_chars {
            if !current_buf.trim().is_empty() {
                flush(&mut current_buf, &mut chunk_index, &mut chunks);
            }
            current_buf.clear();
            // Hard split with word-boundary preference
            let mut remaining = trimmed;
            while !remaining.is_empty() {
                let head = char_head(remaining, max_chars);
                let split_at = if head.len() < remaining.len() {
                    head.rfind('\n')
                        .or_else(|| head.rfind(' '))
                        .map(|pos| pos + 1)
                        .unwrap_or(head.len())
                } else {
                    head.len()
                };
                let piece = &remaining[..split_at];
                chunks.push(make_chunk(document_locator, chunk_index, piece.trim()));
                chunk_index += 1;
                remaining = &remaining[split_at..];
            }
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
        }
    }

    if !current_buf.trim().is_empty() {
        // Skip a trailing buffer that is nothing but carried overlap; real
        // content is always longer than the carry
        let is_pure_overlap = overlap > 0
            && current_buf.trim().chars().count() <= overlap
            && chunks
                .last()
                .map(|c| c.text.ends_with(current_buf.trim()))
                .unwrap_or(false);
        if !is_pure_overlap {
            chunks.push(make_chunk(document_locator, chunk_index, current_buf.trim()));
        }
    }

    // Guarantee at least one chunk
    if chunks.is_empty() {
        chunks.push(make_chunk(document_locator, 0, text.trim()));
    }

    chunks
}

/// Longest prefix of `s` holding at most `max_chars` characters.
fn char_head(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Suffix of `s` holding at most `n` characters.
fn char_tail(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    let skip = count - n;
    match s.char_indices().nth(skip) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

fn make_chunk(document_locator: &str, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_locator: document_locator.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}
