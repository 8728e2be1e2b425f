//! Data types for index rows, search hits, and build metadata.

use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use docsage_core::{Chunk, DistanceMetric};

/// Artifact layout version written to `index_meta`.
pub const FORMAT_VERSION: u32 = 1;

/// A chunk plus its embedding. Moved into the index on build.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Array1<f32>,
}

/// Raw nearest-neighbor hit: matrix row and distance under the index metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    pub row: usize,
    pub distance: f32,
}

/// Build metadata persisted alongside the matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub format_version: u32,
    pub dimension: usize,
    pub metric: DistanceMetric,
    /// `EmbedderBackend::name()` of the embedder that produced the vectors.
    pub embedder: String,
    pub built_at: DateTime<Utc>,
    /// SHA-256 over every row's chunk metadata and text, in row order.
    pub fingerprint: String,
    pub rows: usize,
}

/// Index-level statistics for `stats` and `/api/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    #[serde(flatten)]
    pub meta: IndexMeta,
    pub sources: usize,
}
