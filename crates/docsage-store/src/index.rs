//! Flat exact nearest-neighbor index over an in-memory embedding matrix.
//!
//! Row `i` of the matrix corresponds to chunk `i` of the metadata list. A
//! secondary map groups rows by source, sorted by position, for neighbor
//! lookup during context expansion. Built once, never mutated; share it behind
//! an `Arc`.

use std::collections::HashMap;

use chrono::Utc;
use ndarray::{Array2, ArrayView1};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::types::*;
use docsage_core::{Chunk, DistanceMetric, Error, Result};

#[derive(Debug)]
pub struct SimilarityIndex {
    pub(crate) meta: IndexMeta,
    pub(crate) chunks: Vec<Chunk>,
    /// Raw vectors as embedded, shape (N, dim). This is what gets persisted.
    pub(crate) vectors: Array2<f32>,
    /// Search matrix: row-normalized for cosine, identical to `vectors` for L2.
    prepared: Array2<f32>,
    by_source: HashMap<String, Vec<usize>>,
}

impl SimilarityIndex {
    /// Build an index from embedded chunks, in the given order.
    ///
    /// Fails with `EmptyCorpus` on zero rows, `DimensionMismatch` when the
    /// vectors disagree on length, and `EmbeddingProvider` when a vector holds
    /// NaN or infinity.
    pub fn build(
        entries: Vec<EmbeddedChunk>,
        metric: DistanceMetric,
        embedder: &str,
    ) -> Result<Self> {
        let Some(first) = entries.first() else {
            return Err(Error::EmptyCorpus);
        };
        let dim = first.embedding.len();
        if dim == 0 {
            return Err(Error::Internal("zero-length embedding vectors".into()));
        }

        let n = entries.len();
        let mut vectors = Array2::zeros((n, dim));
        let mut chunks = Vec::with_capacity(n);
        for (i, entry) in entries.into_iter().enumerate() {
            if entry.embedding.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    actual: entry.embedding.len(),
                });
            }
            if !is_finite(entry.embedding.view()) {
                return Err(Error::embedding(
                    embedder,
                    format!(
                        "non-finite embedding for {} position {}",
                        entry.chunk.source, entry.chunk.position
                    ),
                ));
            }
            vectors.row_mut(i).assign(&entry.embedding);
            chunks.push(entry.chunk);
        }

        let meta = IndexMeta {
            format_version: FORMAT_VERSION,
            dimension: dim,
            metric,
            embedder: embedder.to_string(),
            built_at: Utc::now(),
            fingerprint: fingerprint(&chunks),
            rows: n,
        };
        let index = Self::from_parts(meta, chunks, vectors)?;
        info!(
            "Built index: {} rows, {} sources, dim={}, metric={}",
            index.len(),
            index.by_source.len(),
            dim,
            metric
        );
        Ok(index)
    }

    /// Assemble an index from already-validated parts. Shared by `build` and
    /// `load` so both prepare the search matrix the same way.
    pub(crate) fn from_parts(
        meta: IndexMeta,
        chunks: Vec<Chunk>,
        vectors: Array2<f32>,
    ) -> Result<Self> {
        let mut by_source: HashMap<String, Vec<usize>> = HashMap::new();
        for (row, chunk) in chunks.iter().enumerate() {
            by_source.entry(chunk.source.clone()).or_default().push(row);
        }
        for (source, rows) in by_source.iter_mut() {
            rows.sort_by_key(|&r| chunks[r].position);
            if rows
                .windows(2)
                .any(|w| chunks[w[0]].position == chunks[w[1]].position)
            {
                return Err(Error::Internal(format!(
                    "duplicate chunk position within source {}",
                    source
                )));
            }
        }

        let prepared = prepare(&vectors, meta.metric);
        Ok(Self {
            meta,
            chunks,
            vectors,
            prepared,
            by_source,
        })
    }

    /// The `k` nearest rows to `query`, closest first.
    ///
    /// Ties keep row order. A zero query vector under cosine has no defined
    /// direction and yields no hits. Rows whose distance is not finite are
    /// skipped.
    pub fn search(&self, query: ArrayView1<'_, f32>, k: usize) -> Result<Vec<IndexHit>> {
        if query.len() != self.meta.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.meta.dimension,
                actual: query.len(),
            });
        }
        if !is_finite(query) {
            return Err(Error::InvalidQuery(
                "query vector contains NaN or infinity".into(),
            ));
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let distances: Vec<f32> = match self.meta.metric {
            DistanceMetric::Cosine => {
                let q_norm = query.dot(&query).sqrt();
                if q_norm < 1e-9 {
                    return Ok(Vec::new());
                }
                let q = &query / q_norm;
                self.prepared.dot(&q).iter().map(|s| 1.0 - s).collect()
            }
            DistanceMetric::L2 => self
                .prepared
                .rows()
                .into_iter()
                .map(|row| {
                    row.iter()
                        .zip(query.iter())
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum::<f32>()
                })
                .collect(),
        };

        let mut hits: Vec<IndexHit> = distances
            .into_iter()
            .enumerate()
            .filter(|(_, distance)| distance.is_finite())
            .map(|(row, distance)| IndexHit { row, distance })
            .collect();
        if hits.len() < self.len() {
            warn!(
                "Skipped {} rows with non-finite distance",
                self.len() - hits.len()
            );
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        debug!("Index search returned {} of {} rows", hits.len(), self.len());
        Ok(hits)
    }

    /// Chunk metadata for a row.
    pub fn record(&self, row: usize) -> Option<&Chunk> {
        self.chunks.get(row)
    }

    /// Rows sharing `source`, sorted by position. Empty for unknown sources.
    pub fn siblings(&self, source: &str) -> &[usize] {
        self.by_source.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Stored (unnormalized) vector for a row.
    pub fn row_vector(&self, row: usize) -> Option<ArrayView1<'_, f32>> {
        (row < self.len()).then(|| self.vectors.row(row))
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.meta.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.meta.metric
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            meta: self.meta.clone(),
            sources: self.by_source.len(),
        }
    }
}

fn is_finite(v: ArrayView1<'_, f32>) -> bool {
    v.iter().all(|x| x.is_finite())
}

fn prepare(vectors: &Array2<f32>, metric: DistanceMetric) -> Array2<f32> {
    let mut prepared = vectors.clone();
    if metric == DistanceMetric::Cosine {
        for mut row in prepared.rows_mut() {
            let norm = row.dot(&row).sqrt();
            if norm > 1e-9 {
                row /= norm;
            }
        }
    }
    prepared
}

/// Hex SHA-256 over `(source, page, position, text)` of every row.
pub(crate) fn fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.source.as_bytes());
        hasher.update([0u8]);
        hasher.update(chunk.page.to_le_bytes());
        hasher.update(chunk.position.to_le_bytes());
        hasher.update(chunk.text.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::array;

    pub(crate) fn chunk(source: &str, position: u32, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            source: source.to_string(),
            page: position / 2,
            position,
        }
    }

    pub(crate) fn sample_index(metric: DistanceMetric) -> SimilarityIndex {
        let entries = vec![
            EmbeddedChunk {
                chunk: chunk("a.pdf", 0, "alpha"),
                embedding: array![1.0, 0.0, 0.0],
            },
            EmbeddedChunk {
                chunk: chunk("a.pdf", 1, "beta"),
                embedding: array![0.7, 0.7, 0.0],
            },
            EmbeddedChunk {
                chunk: chunk("b.pdf", 0, "gamma"),
                embedding: array![0.0, 0.0, 2.0],
            },
        ];
        SimilarityIndex::build(entries, metric, "test").unwrap()
    }

    #[test]
    fn test_empty_corpus_rejected() {
        let err = SimilarityIndex::build(Vec::new(), DistanceMetric::Cosine, "test");
        assert!(matches!(err, Err(Error::EmptyCorpus)));
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        let entries = vec![
            EmbeddedChunk {
                chunk: chunk("a.pdf", 0, "one"),
                embedding: array![1.0, 0.0],
            },
            EmbeddedChunk {
                chunk: chunk("a.pdf", 1, "two"),
                embedding: array![1.0, 0.0, 0.0],
            },
        ];
        let err = SimilarityIndex::build(entries, DistanceMetric::Cosine, "test");
        assert!(matches!(
            err,
            Err(Error::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_duplicate_position_rejected() {
        let entries = vec![
            EmbeddedChunk {
                chunk: chunk("a.pdf", 0, "one"),
                embedding: array![1.0, 0.0],
            },
            EmbeddedChunk {
                chunk: chunk("a.pdf", 0, "two"),
                embedding: array![0.0, 1.0],
            },
        ];
        let err = SimilarityIndex::build(entries, DistanceMetric::Cosine, "test");
        assert!(matches!(err, Err(Error::Internal(_))));
    }

    #[test]
    fn test_cosine_search_orders_by_distance() {
        let index = sample_index(DistanceMetric::Cosine);
        let query = array![1.0, 0.1, 0.0];
        let hits = index.search(query.view(), 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].row, 0);
        assert_eq!(hits[1].row, 1);
        assert_eq!(hits[2].row, 2);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        // orthogonal row: cosine distance 1
        assert!((hits[2].distance - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_ignores_magnitude() {
        let index = sample_index(DistanceMetric::Cosine);
        let hits = index.search(array![0.0, 0.0, 0.001].view(), 1).unwrap();
        assert_eq!(hits[0].row, 2);
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[test]
    fn test_l2_search_uses_squared_distance() {
        let index = sample_index(DistanceMetric::L2);
        let hits = index.search(array![0.0, 0.0, 0.0].view(), 3).unwrap();
        assert_eq!(hits[0].row, 1);
        assert!((hits[0].distance - 0.98).abs() < 1e-5);
        assert_eq!(hits[1].row, 0);
        assert!((hits[1].distance - 1.0).abs() < 1e-6);
        assert_eq!(hits[2].row, 2);
        assert!((hits[2].distance - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_k_larger_than_rows_and_zero_k() {
        let index = sample_index(DistanceMetric::Cosine);
        let query = array![1.0, 0.0, 0.0];
        assert_eq!(index.search(query.view(), 50).unwrap().len(), 3);
        assert!(index.search(query.view(), 0).unwrap().is_empty());
    }

    #[test]
    fn test_zero_query_under_cosine_returns_nothing() {
        let index = sample_index(DistanceMetric::Cosine);
        assert!(index.search(array![0.0, 0.0, 0.0].view(), 3).unwrap().is_empty());
    }

    #[test]
    fn test_query_dimension_checked() {
        let index = sample_index(DistanceMetric::Cosine);
        let err = index.search(array![1.0, 0.0].view(), 3);
        assert!(matches!(err, Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn test_ties_keep_row_order() {
        let entries = (0..4)
            .map(|i| EmbeddedChunk {
                chunk: chunk("same.pdf", i, &format!("chunk {}", i)),
                embedding: array![1.0, 1.0],
            })
            .collect();
        let index = SimilarityIndex::build(entries, DistanceMetric::Cosine, "test").unwrap();
        let rows: Vec<usize> = index
            .search(array![1.0, 1.0].view(), 4)
            .unwrap()
            .iter()
            .map(|h| h.row)
            .collect();
        assert_eq!(rows, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_siblings_sorted_by_position() {
        let entries = vec![
            EmbeddedChunk {
                chunk: chunk("a.pdf", 2, "third"),
                embedding: array![1.0, 0.0],
            },
            EmbeddedChunk {
                chunk: chunk("a.pdf", 0, "first"),
                embedding: array![0.0, 1.0],
            },
            EmbeddedChunk {
                chunk: chunk("a.pdf", 1, "second"),
                embedding: array![1.0, 1.0],
            },
        ];
        let index = SimilarityIndex::build(entries, DistanceMetric::Cosine, "test").unwrap();
        assert_eq!(index.siblings("a.pdf"), &[1, 2, 0]);
        assert!(index.siblings("missing.pdf").is_empty());
        assert_eq!(index.stats().sources, 1);
    }

    #[test]
    fn test_non_finite_embedding_rejected_at_build() {
        let entries = vec![
            EmbeddedChunk {
                chunk: chunk("a.pdf", 0, "fine"),
                embedding: array![1.0, 0.0],
            },
            EmbeddedChunk {
                chunk: chunk("a.pdf", 1, "broken"),
                embedding: array![f32::NAN, 1.0],
            },
        ];
        let err = SimilarityIndex::build(entries, DistanceMetric::Cosine, "test").unwrap_err();
        assert_eq!(err.kind(), "embedding_provider");
        assert!(err.to_string().contains("position 1"));
    }

    #[test]
    fn test_non_finite_query_rejected() {
        let index = sample_index(DistanceMetric::Cosine);
        let err = index.search(array![f32::INFINITY, 0.0, 0.0].view(), 3);
        assert!(matches!(err, Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_nan_rows_skipped_in_large_index() {
        // vectors loaded from an artifact bypass the build-time check
        let n = 64;
        let mut vectors = Array2::zeros((n, 2));
        let mut chunks = Vec::with_capacity(n);
        for i in 0..n {
            let row = if i % 3 == 0 {
                [f32::NAN, 1.0]
            } else {
                [1.0, i as f32 / n as f32]
            };
            vectors.row_mut(i).assign(&array![row[0], row[1]]);
            chunks.push(chunk("big.pdf", i as u32, &format!("chunk {}", i)));
        }
        let meta = IndexMeta {
            format_version: FORMAT_VERSION,
            dimension: 2,
            metric: DistanceMetric::Cosine,
            embedder: "test".into(),
            built_at: Utc::now(),
            fingerprint: fingerprint(&chunks),
            rows: n,
        };
        let index = SimilarityIndex::from_parts(meta, chunks, vectors).unwrap();

        let hits = index.search(array![1.0, 0.2].view(), 10).unwrap();
        assert_eq!(hits.len(), 10);
        assert!(hits.iter().all(|h| h.row % 3 != 0 && h.distance.is_finite()));
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));

        let all = index.search(array![1.0, 0.2].view(), n).unwrap();
        assert_eq!(all.len(), n - (n + 2) / 3);
    }

    #[test]
    fn test_row_vector_is_unnormalized() {
        let index = sample_index(DistanceMetric::Cosine);
        let v = index.row_vector(2).unwrap();
        assert_eq!(v[2], 2.0);
        assert!(index.row_vector(3).is_none());
    }
}
