//! Configuration loading and validation.
//!
//! `DocsageConfig` is loaded once at process start (JSON file, then env var
//! fallbacks, then defaults) and handed to constructors by value or reference.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_OVER_FETCH_K: usize = 100;
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_DIM: usize = 1536;
pub const DEFAULT_PORT: u16 = 3003;

/// Distance metric used by the similarity index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`; relevance `1 - dist` equals cosine similarity.
    #[default]
    Cosine,
    /// Squared Euclidean distance.
    L2,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cosine" => Some(Self::Cosine),
            "l2" => Some(Self::L2),
            _ => None,
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the context expander finds chunks from the same source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiblingLookupKind {
    /// Secondary source → position map kept by the index.
    #[default]
    Direct,
    /// Broad similarity query filtered by source.
    OverFetch,
}

/// Embedding backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    #[default]
    OpenAI,
    /// Local feature-hashing embedder, no network.
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters carried over between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub base_url: String,
    pub dimension: usize,
    /// Never serialized back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::OpenAI,
            model: DEFAULT_OPENAI_MODEL.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.into(),
            dimension: DEFAULT_EMBEDDING_DIM,
            api_key: None,
            timeout_secs: 30,
            batch_size: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub metric: DistanceMetric,
    pub sibling_lookup: SiblingLookupKind,
    pub over_fetch_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            metric: DistanceMetric::Cosine,
            sibling_lookup: SiblingLookupKind::Direct,
            over_fetch_k: DEFAULT_OVER_FETCH_K,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            request_timeout_secs: 60,
        }
    }
}

/// Top-level docsage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DocsageConfig {
    /// Directory scanned for `*.pdf` files.
    pub data_dir: PathBuf,
    /// Named location of the persisted index.
    pub index_dir: PathBuf,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
}

impl Default for DocsageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            index_dir: PathBuf::from("index"),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl DocsageConfig {
    /// Load config from an optional JSON file, then apply env var fallbacks.
    ///
    /// A missing file is not an error; an unparsable one is.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)?;
                let parsed: DocsageConfig = serde_json::from_str(&raw).map_err(|e| {
                    Error::Config(format!("invalid config file {}: {}", path.display(), e))
                })?;
                info!("Loaded config from {}", path.display());
                parsed
            }
            _ => DocsageConfig::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Fill unset values from the environment. Explicit file values win.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(dir) = lookup("DOCSAGE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("DOCSAGE_INDEX_DIR") {
            self.index_dir = PathBuf::from(dir);
        }
    }

    /// Check parameter consistency. Called once before the config is handed out.
    pub fn validate(&self) -> Result<()> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than zero".into()));
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("top_k must be greater than zero".into()));
        }
        if self.retrieval.over_fetch_k == 0 {
            return Err(Error::Config("over_fetch_k must be greater than zero".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::Config("embedding dimension must be greater than zero".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::Config("embedding batch_size must be greater than zero".into()));
        }
        if self.embedding.provider == EmbeddingProviderKind::OpenAI
            && self.embedding.api_key.is_none()
        {
            return Err(Error::Config(
                "OPENAI_API_KEY is not set and no api_key is configured".into(),
            ));
        }
        Ok(())
    }
}
