//! Error types for docsage.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ingestion error ({source_name}): {message}")]
    Ingestion {
        source_name: String,
        message: String,
    },

    #[error("No text extracted from any document")]
    NoContent,

    #[error("Empty corpus: cannot build an index from zero chunks")]
    EmptyCorpus,

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Embedding provider error ({provider}): {message}")]
    EmbeddingProvider { provider: String, message: String },

    #[error("Dimension mismatch: index has {expected}, vector has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable snake_case tag for structured error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::Ingestion { .. } => "ingestion",
            Self::NoContent => "no_content",
            Self::EmptyCorpus => "empty_corpus",
            Self::IndexUnavailable(_) => "index_unavailable",
            Self::EmbeddingProvider { .. } => "embedding_provider",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::InvalidQuery(_) => "invalid_query",
            Self::Timeout(_) => "timeout",
            Self::Database(_) => "database",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Internal(_) => "internal",
        }
    }

    pub fn embedding(provider: &str, message: impl Into<String>) -> Self {
        Self::EmbeddingProvider {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn ingestion(source_name: &str, message: impl Into<String>) -> Self {
        Self::Ingestion {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
