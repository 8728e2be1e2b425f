//! Embedding engine trait.
//!
//! `EmbedderBackend` abstracts over the external embedding function
//! (text → fixed-length vector). Implementations:
//! - `OpenAiEmbedder`: OpenAI-compatible `/embeddings` HTTP endpoint
//! - `HashingEmbedder`: deterministic local feature hashing, no network

use async_trait::async_trait;
use ndarray::Array1;

use docsage_core::Result;

/// Trait for embedding backends.
///
/// Backends are assumed deterministic for identical input and configuration.
/// Failures surface as `Error::EmbeddingProvider` (or `Error::Timeout`) and are
/// never retried here.
#[async_trait]
pub trait EmbedderBackend: Send + Sync {
    /// Generate an embedding for a text string.
    async fn embed(&self, text: &str) -> Result<Array1<f32>>;

    /// Generate embeddings for a batch of texts, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Array1<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Embedding dimension.
    fn dimension(&self) -> usize;

    /// Short identifier recorded in index metadata (e.g. `openai:text-embedding-ada-002`).
    fn name(&self) -> String;
}
