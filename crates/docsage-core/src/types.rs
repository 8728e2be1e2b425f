//! Document, page and chunk records shared across the pipeline.

use serde::{Deserialize, Serialize};

/// Text extracted from one PDF page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 0-based page number.
    pub page: u32,
    pub text: String,
}

/// One source document with its pages in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// File name of the originating document.
    pub source: String,
    pub pages: Vec<PageText>,
}

/// Chunker output: a span of page text, not yet positioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageChunk {
    pub text: String,
    pub source: String,
    pub page: u32,
}

/// A positioned chunk. `(source, position)` is unique within one index build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub page: u32,
    /// Ordinal among all chunks of `source`, in extraction order.
    pub position: u32,
}

impl Chunk {
    pub fn from_page_chunk(chunk: PageChunk, position: u32) -> Self {
        Self {
            text: chunk.text,
            source: chunk.source,
            page: chunk.page,
            position,
        }
    }
}
