//! Recursive character text chunker.
//!
//! Splits page text into overlapping windows of at most `chunk_size`
//! characters. Cut points prefer paragraph breaks (`\n\n`), then line
//! breaks, then spaces, and fall back to single characters only when a
//! run of text has none of those.
//!
//! Splitting happens in two phases. The text is first partitioned into
//! contiguous pieces no longer than `chunk_size`, keeping each separator
//! attached to the piece that follows it. Pieces are then merged greedily
//! into windows; when a window is full, the next one starts with the tail
//! of the previous window (at most `chunk_overlap` characters). Because
//! the pieces partition the input and every window begins at or before
//! the end of its predecessor, the windows cover the whole text.

use std::collections::VecDeque;

use crate::config::ChunkingConfig;
use crate::models::{Chunk, SourcePage};

/// Separators tried in order; the empty string means "split per char".
const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// A chunk of text and its byte offset in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split `text` into trimmed, overlapping spans. Whitespace-only input
    /// yields no spans.
    pub fn split(&self, text: &str) -> Vec<TextSpan> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        self.collect_pieces(text, 0, text.len(), SEPARATORS, &mut pieces);

        self.merge(&pieces)
            .into_iter()
            .filter_map(|(start, end)| {
                let window = &text[start..end];
                let trimmed = window.trim_start();
                let lead = window.len() - trimmed.len();
                let trimmed = trimmed.trim_end();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(TextSpan {
                        start: start + lead,
                        text: trimmed.to_string(),
                    })
                }
            })
            .collect()
    }

    /// Split every page, copying the page's metadata onto each of its chunks.
    pub fn split_pages(&self, pages: &[SourcePage]) -> Vec<Chunk> {
        pages
            .iter()
            .flat_map(|page| {
                self.split(&page.text).into_iter().map(|span| Chunk {
                    text: span.text,
                    start_index: span.start,
                    metadata: page.metadata.clone(),
                })
            })
            .collect()
    }

    fn collect_pieces(
        &self,
        text: &str,
        start: usize,
        end: usize,
        separators: &[&str],
        out: &mut Vec<Piece>,
    ) {
        let segment = &text[start..end];
        let chars = segment.chars().count();
        if chars <= self.chunk_size {
            out.push(Piece { start, end, chars });
            return;
        }

        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || segment.contains(sep));

        match position {
            Some(i) if !separators[i].is_empty() => {
                let rest = &separators[i + 1..];
                for (s, e) in split_keep_separator(segment, separators[i]) {
                    self.collect_pieces(text, start + s, start + e, rest, out);
                }
            }
            _ => {
                for (offset, ch) in segment.char_indices() {
                    out.push(Piece {
                        start: start + offset,
                        end: start + offset + ch.len_utf8(),
                        chars: 1,
                    });
                }
            }
        }
    }

    fn merge(&self, pieces: &[Piece]) -> Vec<(usize, usize)> {
        let mut windows = Vec::new();
        let mut current: VecDeque<Piece> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            if total + piece.chars > self.chunk_size && !current.is_empty() {
                if let Some(span) = span_of(&current) {
                    windows.push(span);
                }
                // Keep a tail of at most `chunk_overlap` chars that still
                // leaves room for the incoming piece.
                while total > self.chunk_overlap
                    || (total + piece.chars > self.chunk_size && total > 0)
                {
                    match current.pop_front() {
                        Some(p) => total -= p.chars,
                        None => break,
                    }
                }
            }
            total += piece.chars;
            current.push_back(*piece);
        }

        if let Some(span) = span_of(&current) {
            windows.push(span);
        }
        windows
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

fn span_of(pieces: &VecDeque<Piece>) -> Option<(usize, usize)> {
    match (pieces.front(), pieces.back()) {
        (Some(first), Some(last)) => Some((first.start, last.end)),
        _ => None,
    }
}

/// Byte ranges partitioning `segment`, each separator occurrence starting a
/// new range.
fn split_keep_separator(segment: &str, sep: &str) -> Vec<(usize, usize)> {
    let mut bounds: Vec<usize> = vec![0];
    for (pos, _) in segment.match_indices(sep) {
        if pos > 0 {
            bounds.push(pos);
        }
    }
    bounds.push(segment.len());
    bounds
        .windows(2)
        .filter(|w| w[1] > w[0])
        .map(|w| (w[0], w[1]))
        .collect()
}
