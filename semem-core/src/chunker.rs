//! Deterministic document chunker
//!
//! Splits oversized text at the semantic boundary nearest the size limit,
//! carries a whitespace-trimmed overlap between neighbours, and titles each
//! chunk from the closest preceding Markdown header.
//!
//! Each chunk's `text` equals `parent[offset..offset + length]`, overlap
//! included, so a chunk always reconstructs a contiguous region of its
//! parent. The overlap between neighbours is `prev.offset + prev.length -
//! next.offset`, which makes lossless reassembly derivable from offsets
//! alone (see [`Chunker::reconstruct`]).

use crate::config::{ChunkStrategy, ChunkerConfig};

/// One chunk produced by [`Chunker::chunk`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Chunk text, including the overlap prefix carried from the previous chunk
    pub text: String,
    /// Byte offset of this chunk's span in the parent (overlap included)
    pub offset: usize,
    /// Byte length of the span
    pub length: usize,
    /// Zero-based chunk position
    pub index: usize,
    /// Total chunks produced from the parent
    pub total: usize,
    /// Title from the nearest prior Markdown header, or a positional fallback
    pub title: String,
}

/// Deterministic text chunker
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a chunker with the given configuration
    #[must_use]
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Whether `text` exceeds the single-chunk limit
    #[must_use]
    pub fn needs_chunking(&self, text: &str) -> bool {
        text.len() > self.config.max_chunk_size
    }

    /// Split `text` into chunks.
    ///
    /// `parent_title` feeds the fallback title `"{parent} — Chunk {i}/{n}"`
    /// used when no Markdown header precedes a chunk.
    #[must_use]
    pub fn chunk(&self, text: &str, parent_title: &str) -> Vec<TextChunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let max = self.config.max_chunk_size;
        let window = self.config.boundary_window;

        // Non-overlapping body regions tiling the parent.
        let mut bodies: Vec<(usize, usize)> = Vec::new();
        let mut pos = 0;
        while pos < text.len() {
            let remaining = text.len() - pos;
            let end = if remaining <= max {
                text.len()
            } else {
                let hard_end = floor_char_boundary(text, pos + max);
                match self.config.strategy {
                    ChunkStrategy::Character => hard_end,
                    ChunkStrategy::Semantic => {
                        let window_start =
                            floor_char_boundary(text, (pos + max).saturating_sub(window).max(pos));
                        find_boundary(text, window_start, hard_end).unwrap_or(hard_end)
                    }
                }
            };
            bodies.push((pos, end - pos));
            pos = end;
        }

        // A trailing fragment below the minimum folds into its predecessor.
        if bodies.len() > 1 {
            let (last_off, last_len) = bodies[bodies.len() - 1];
            if last_len < self.config.min_chunk_size {
                bodies.pop();
                let prev = bodies.last_mut().unwrap();
                debug_assert_eq!(prev.0 + prev.1, last_off);
                prev.1 += last_len;
            }
        }

        let total = bodies.len();
        let mut chunks = Vec::with_capacity(total);
        for (index, &(body_off, body_len)) in bodies.iter().enumerate() {
            let offset = if index == 0 {
                body_off
            } else {
                overlap_start(text, body_off, self.config.overlap)
            };
            let length = body_off - offset + body_len;
            let title = nearest_header(text, body_off).unwrap_or_else(|| {
                if total == 1 {
                    parent_title.to_string()
                } else {
                    format!("{parent_title} — Chunk {}/{}", index + 1, total)
                }
            });
            chunks.push(TextChunk {
                text: text[offset..offset + length].to_string(),
                offset,
                length,
                index,
                total,
                title,
            });
        }
        chunks
    }

    /// Reassemble the original text from chunks by dropping overlap prefixes.
    ///
    /// Chunks must be passed in index order.
    #[must_use]
    pub fn reconstruct(chunks: &[TextChunk]) -> String {
        let mut out = String::new();
        let mut prev_end: usize = 0;
        for chunk in chunks {
            let skip = prev_end.saturating_sub(chunk.offset);
            out.push_str(&chunk.text[skip..]);
            prev_end = chunk.offset + chunk.length;
        }
        out
    }
}

/// Largest char boundary `<= index`
fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut i = index;
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Search `[window_start, hard_end]` for the best split point, preferring
/// paragraph breaks, then line breaks, then sentence ends, then whitespace.
fn find_boundary(text: &str, window_start: usize, hard_end: usize) -> Option<usize> {
    let window = &text[window_start..hard_end];

    if let Some(p) = window.rfind("\n\n") {
        return Some(window_start + p + 2);
    }
    if let Some(p) = window.rfind('\n') {
        return Some(window_start + p + 1);
    }
    // Sentence end followed by whitespace
    let bytes = window.as_bytes();
    for i in (0..bytes.len().saturating_sub(1)).rev() {
        if matches!(bytes[i], b'.' | b'!' | b'?')
            && bytes[i + 1].is_ascii_whitespace()
            && window.is_char_boundary(i + 1)
        {
            return Some(window_start + i + 1);
        }
    }
    window
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(p, c)| window_start + p + c.len_utf8())
}

/// Start offset of the overlap prefix for a body beginning at `body_off`:
/// up to `overlap` characters back, trimmed forward past the first word
/// fragment and any leading whitespace so the prefix never opens mid-word.
fn overlap_start(text: &str, body_off: usize, overlap: usize) -> usize {
    let raw_start = floor_char_boundary(text, body_off.saturating_sub(overlap));
    let tail = &text[raw_start..body_off];
    match tail.find(char::is_whitespace) {
        Some(p) => {
            let after_word = p + tail[p..].chars().next().map_or(0, char::len_utf8);
            let rest = &tail[after_word..];
            let trimmed = rest.trim_start();
            raw_start + after_word + (rest.len() - trimmed.len())
        }
        // No whitespace in reach: keep the raw tail
        None => raw_start,
    }
}

/// Text of the nearest `#`-prefixed line starting at or before `offset`
fn nearest_header(text: &str, offset: usize) -> Option<String> {
    let mut best = None;
    let mut pos = 0;
    for line in text.lines() {
        if pos > offset {
            break;
        }
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            let title = trimmed.trim_start_matches('#').trim();
            if !title.is_empty() {
                best = Some(title.to_string());
            }
        }
        pos += line.len() + 1;
    }
    best
}
