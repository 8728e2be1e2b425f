//! Query-time result types.

use serde::{Deserialize, Serialize};

use docsage_core::Chunk;

/// One nearest-neighbor match mapped back to its chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedMatch {
    pub chunk: Chunk,
    /// Index row the match came from.
    pub row: usize,
    /// Raw distance under the index metric.
    pub distance: f32,
    /// `1 - distance`.
    pub relevance_score: f32,
}

/// A matched chunk stitched together with its immediate neighbors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedPassage {
    pub source: String,
    pub page: u32,
    pub position: u32,
    pub expanded_text: String,
    pub relevance_score: f32,
    /// Number of chunk texts joined into `expanded_text` (1 to 3).
    pub chunks_joined: usize,
    /// Set only when expansion degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
