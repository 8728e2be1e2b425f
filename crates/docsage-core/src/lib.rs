//! docsage core: configuration, error taxonomy, shared chunk records.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    ChunkingConfig, DistanceMetric, DocsageConfig, EmbeddingConfig, EmbeddingProviderKind,
    RetrievalConfig, ServerConfig, SiblingLookupKind,
};
pub use error::{Error, Result};
pub use types::{Chunk, PageChunk, PageText, SourceDocument};
