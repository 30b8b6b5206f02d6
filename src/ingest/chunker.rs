// Chunkers: fixed character windows and recursive separator splitting
//
// All sizes are in characters, not bytes.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::QaError;

pub const DEFAULT_CHUNK_SIZE: usize = 1200;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Separators tried in order by the semantic chunker; "" splits characters
pub const SEMANTIC_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Chunking strategy tag stored in passage metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    Fixed,
    #[default]
    Semantic,
}

impl ChunkStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStrategy::Fixed => "fixed",
            ChunkStrategy::Semantic => "semantic",
        }
    }

    /// Split `text` with this strategy
    pub fn chunk(&self, text: &str, size: usize, overlap: usize) -> Vec<String> {
        match self {
            ChunkStrategy::Fixed => fixed_chunk(text, size, overlap),
            ChunkStrategy::Semantic => semantic_chunk(text, size, overlap),
        }
    }
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkStrategy {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(ChunkStrategy::Fixed),
            "semantic" => Ok(ChunkStrategy::Semantic),
            other => Err(QaError::Ingest(format!("Unknown chunk_strategy: {}", other))),
        }
    }
}

/// Sliding window of `size` characters stepping by `size - overlap`
///
/// Whitespace-only windows are dropped. Always advances at least one
/// character, so an overlap ≥ size still terminates.
pub fn fixed_chunk(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let size = size.max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < n {
        let end = (start + size).min(n);
        let chunk: String = chars[start..end].iter().collect();
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
        if end == n {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }
    chunks
}

/// Recursive splitter that prefers paragraph, then line, then sentence,
/// then word boundaries before falling back to characters
pub fn semantic_chunk(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let splitter = RecursiveSplitter {
        chunk_size: size.max(1),
        chunk_overlap: overlap,
    };
    splitter
        .split(text, &SEMANTIC_SEPARATORS)
        .into_iter()
        .filter(|c| !c.trim().is_empty())
        .collect()
}

struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on `sep`, keeping each separator at the start of the piece after it
fn split_keep_separator(text: &str, sep: &str) -> Vec<String> {
    if sep.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    let mut last = 0;
    for (idx, _) in text.match_indices(sep) {
        if idx > last {
            pieces.push(text[last..idx].to_string());
        }
        last = idx;
    }
    if last < text.len() {
        pieces.push(text[last..].to_string());
    }
    pieces.into_iter().filter(|p| !p.is_empty()).collect()
}

impl RecursiveSplitter {
    fn split(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // First separator present in the text; "" always matches
        let (sep_index, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, s)| s.is_empty() || text.contains(**s))
            .map(|(i, s)| (i, *s))
            .unwrap_or((separators.len().saturating_sub(1), ""));
        let remaining = if separator.is_empty() {
            &[][..]
        } else {
            &separators[sep_index + 1..]
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for piece in split_keep_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split(&piece, remaining));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }
        chunks
    }

    /// Greedily pack small pieces into chunks, carrying up to
    /// `chunk_overlap` characters into the next chunk
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        let mut window: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_joined(&mut out, &window);

                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece.as_str());
            total += len;
        }

        push_joined(&mut out, &window);
        out
    }
}

fn push_joined(out: &mut Vec<String>, window: &std::collections::VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}
