//! Query → embedding → k nearest chunks.

use std::sync::Arc;

use ndarray::ArrayView1;
use tracing::{debug, warn};

use crate::types::RetrievedMatch;
use docsage_core::{Error, Result};
use docsage_infer::EmbedderBackend;
use docsage_store::SimilarityIndex;

pub struct Retriever {
    index: Arc<SimilarityIndex>,
    embedder: Arc<dyn EmbedderBackend>,
}

impl Retriever {
    /// Pair an index with the embedder used for queries.
    ///
    /// The embedder must produce vectors of the index dimension.
    pub fn new(index: Arc<SimilarityIndex>, embedder: Arc<dyn EmbedderBackend>) -> Result<Self> {
        if embedder.dimension() != index.dimension() {
            return Err(Error::DimensionMismatch {
                expected: index.dimension(),
                actual: embedder.dimension(),
            });
        }
        if embedder.name() != index.meta().embedder {
            warn!(
                "Query embedder {} differs from build embedder {}",
                embedder.name(),
                index.meta().embedder
            );
        }
        Ok(Self { index, embedder })
    }

    pub fn index(&self) -> &Arc<SimilarityIndex> {
        &self.index
    }

    /// Embed `query` and return the `k` most relevant chunks, best first.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedMatch>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidQuery("query must not be empty".into()));
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query).await?;
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(Error::embedding(
                &self.embedder.name(),
                "query embedding contains NaN or infinity",
            ));
        }
        let matches = self.nearest(vector.view(), k)?;
        debug!("Retrieved {} matches for query", matches.len());
        Ok(matches)
    }

    /// Nearest chunks to an already-embedded vector.
    pub fn nearest(&self, vector: ArrayView1<'_, f32>, k: usize) -> Result<Vec<RetrievedMatch>> {
        let hits = self.index.search(vector, k)?;
        let mut matches = Vec::with_capacity(hits.len());
        for hit in hits {
            let chunk = self.index.record(hit.row).ok_or_else(|| {
                Error::Internal(format!("index row {} has no metadata", hit.row))
            })?;
            matches.push(RetrievedMatch {
                chunk: chunk.clone(),
                row: hit.row,
                distance: hit.distance,
                relevance_score: 1.0 - hit.distance,
            });
        }
        // stable: equal scores keep index order
        matches.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{embedder, hashing_index, TEST_DIM};
    use async_trait::async_trait;
    use ndarray::Array1;

    /// Returns a vector poisoned with NaN for every text.
    struct NanEmbedder;

    #[async_trait]
    impl EmbedderBackend for NanEmbedder {
        async fn embed(&self, _text: &str) -> Result<Array1<f32>> {
            let mut v = Array1::zeros(TEST_DIM);
            v[0] = f32::NAN;
            Ok(v)
        }

        fn dimension(&self) -> usize {
            TEST_DIM
        }

        fn name(&self) -> String {
            "nan".into()
        }
    }

    #[tokio::test]
    async fn test_relevance_is_one_minus_distance() {
        let index = hashing_index(&[("notes.pdf", &["red apples", "green pears", "red cherries"])]).await;
        let retriever = Retriever::new(index, embedder()).unwrap();
        let matches = retriever.retrieve("red", 3).await.unwrap();
        assert_eq!(matches.len(), 3);
        for m in &matches {
            assert!((m.relevance_score - (1.0 - m.distance)).abs() < 1e-6);
        }
        assert!(matches
            .windows(2)
            .all(|w| w[0].relevance_score >= w[1].relevance_score));
        // the two "red" chunks tie; index order breaks the tie
        assert_eq!(matches[0].chunk.position, 0);
        assert_eq!(matches[1].chunk.position, 2);
    }

    #[tokio::test]
    async fn test_k_zero_skips_embedding() {
        let index = hashing_index(&[("notes.pdf", &["anything"])]).await;
        let retriever = Retriever::new(index, embedder()).unwrap();
        assert!(retriever.retrieve("query", 0).await.unwrap().is_empty());
        assert!(matches!(
            retriever.retrieve("", 0).await,
            Err(Error::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_non_finite_query_embedding_is_provider_error() {
        let index = hashing_index(&[("notes.pdf", &["red apples", "green pears"])]).await;
        let retriever = Retriever::new(index, Arc::new(NanEmbedder)).unwrap();
        let err = retriever.retrieve("red", 2).await.unwrap_err();
        assert_eq!(err.kind(), "embedding_provider");
    }
}
