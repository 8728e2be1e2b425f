//! Recursive character text splitting.
//!
//! Splits page text on the first separator (in priority order) that occurs in
//! it, recursing into pieces still too large for a chunk, then greedily merges
//! the pieces back into chunks of at most `chunk_size` characters with up to
//! `chunk_overlap` characters carried between consecutive chunks.
//!
//! Lengths are measured in Unicode scalar values. Separators stay attached to
//! the start of the piece that follows them.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use docsage_core::{ChunkingConfig, Error, PageChunk, Result};

/// Separators tried in order; `""` is a hard per-character cut.
pub const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

static HORIZONTAL_WS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+").expect("valid whitespace regex"));
static TRAILING_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r" +\n").expect("valid trailing regex"));

/// Recursive chunker that respects natural text boundaries.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than zero".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Chunk one extracted page, tagging each chunk with its provenance.
    ///
    /// The page text is normalized first; a page with no text yields nothing.
    pub fn chunk_page(&self, source: &str, page: u32, raw_text: &str) -> Vec<PageChunk> {
        let text = normalize_page_text(raw_text);
        let chunks: Vec<PageChunk> = self
            .split_text(&text)
            .into_iter()
            .map(|text| PageChunk {
                text,
                source: source.to_string(),
                page,
            })
            .collect();
        debug!("{} page {}: {} chunks", source, page, chunks.len());
        chunks
    }

    /// Split text into trimmed, non-empty chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // First separator present in the text; "" always matches.
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, &sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge(&small));
                small.clear();
            }
            if remaining.is_empty() {
                if let Some(trimmed) = non_empty_trimmed(piece) {
                    chunks.push(trimmed);
                }
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }
        if !small.is_empty() {
            chunks.extend(self.merge(&small));
        }
        chunks
    }

    /// Greedily merge small pieces into chunks, carrying an overlap tail.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        let mut current: Vec<(&str, usize)> = Vec::new();
        let mut head = 0usize;
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, longer than the limit {}",
                        total, self.chunk_size
                    );
                }
                if head < current.len() {
                    if let Some(chunk) = join_trimmed(&current[head..]) {
                        out.push(chunk);
                    }
                    while head < current.len()
                        && (total > self.chunk_overlap
                            || (total + len > self.chunk_size && total > 0))
                    {
                        total -= current[head].1;
                        head += 1;
                    }
                }
            }
            current.push((piece, len));
            total += len;
        }

        if let Some(chunk) = join_trimmed(&current[head..]) {
            out.push(chunk);
        }
        out
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self {
            chunk_size: docsage_core::config::DEFAULT_CHUNK_SIZE,
            chunk_overlap: docsage_core::config::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Normalize extracted page text: CRLF to LF, horizontal whitespace runs
/// collapsed to one space, trailing spaces on lines removed.
pub fn normalize_page_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = HORIZONTAL_WS.replace_all(&text, " ");
    TRAILING_WS.replace_all(&text, "\n").into_owned()
}

/// Split on `separator`, attaching each separator to the start of the
/// following piece. Empty pieces are dropped. `""` splits into characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join_trimmed(pieces: &[(&str, usize)]) -> Option<String> {
    let joined: String = pieces.iter().map(|(p, _)| *p).collect();
    non_empty_trimmed(&joined)
}

fn non_empty_trimmed(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
