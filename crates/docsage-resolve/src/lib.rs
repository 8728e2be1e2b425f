//! Docsage Resolve: retrieval, context expansion, and the search façade.

pub mod expand;
pub mod retriever;
pub mod search;
pub mod types;

pub use expand::{ContextExpander, SiblingLookup};
pub use retriever::Retriever;
pub use search::{render_passages, DocumentSearch};
pub use types::*;

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::HashMap;
    use std::sync::Arc;

    use docsage_core::{Chunk, DistanceMetric};
    use docsage_infer::{EmbedderBackend, HashingEmbedder};
    use docsage_store::{EmbeddedChunk, SimilarityIndex};

    pub const TEST_DIM: usize = 256;

    pub fn embedder() -> Arc<HashingEmbedder> {
        Arc::new(HashingEmbedder::new(TEST_DIM).unwrap())
    }

    /// Index one chunk per text, positions numbered per source in order.
    pub async fn hashing_index(docs: &[(&str, &[&str])]) -> Arc<SimilarityIndex> {
        let embedder = embedder();
        let mut entries = Vec::new();
        let mut next: HashMap<&str, u32> = HashMap::new();
        for (source, texts) in docs {
            for text in texts.iter() {
                let position = next.entry(*source).or_insert(0);
                entries.push(EmbeddedChunk {
                    chunk: Chunk {
                        text: text.to_string(),
                        source: source.to_string(),
                        page: 0,
                        position: *position,
                    },
                    embedding: embedder.embed(text).await.unwrap(),
                });
                *position += 1;
            }
        }
        Arc::new(SimilarityIndex::build(entries, DistanceMetric::Cosine, &embedder.name()).unwrap())
    }

    pub fn texts_of(index: &SimilarityIndex, source: &str) -> Vec<String> {
        index
            .siblings(source)
            .iter()
            .map(|&row| index.record(row).unwrap().text.clone())
            .collect()
    }
}
