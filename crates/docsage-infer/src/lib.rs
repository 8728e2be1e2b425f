//! Docsage Infer: embedding backends.
//!
//! Provides the `EmbedderBackend` trait for turning text into vectors.
//! `OpenAiEmbedder` calls an OpenAI-compatible `/embeddings` endpoint;
//! `HashingEmbedder` is a local, network-free fallback used offline and in tests.

pub mod embedder;
pub mod hashing_embedder;
pub mod openai_embedder;

pub use embedder::EmbedderBackend;
pub use hashing_embedder::HashingEmbedder;
pub use openai_embedder::OpenAiEmbedder;

use std::sync::Arc;

use docsage_core::{EmbeddingConfig, EmbeddingProviderKind, Result};

/// Create the embedder selected by the config.
///
/// The same config must be used at build and query time; the index records
/// `name()` and `dimension()` and rejects a mismatched embedder on load.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbedderBackend>> {
    let embedder: Arc<dyn EmbedderBackend> = match config.provider {
        EmbeddingProviderKind::OpenAI => Arc::new(OpenAiEmbedder::from_config(config)?),
        EmbeddingProviderKind::Hashing => Arc::new(HashingEmbedder::new(config.dimension)?),
    };
    tracing::info!(
        "Using {} embedder (dim={})",
        embedder.name(),
        embedder.dimension()
    );
    Ok(embedder)
}
