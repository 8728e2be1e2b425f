//! Shared application state.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use docsage_core::{DocsageConfig, Error, Result};
use docsage_infer::EmbedderBackend;
use docsage_resolve::DocumentSearch;
use docsage_store::SimilarityIndex;

/// Shared application state accessible from all route handlers.
///
/// The index is loaded on first use. A failed load is reported to the caller
/// and retried on the next request, so an index built while the server runs
/// is picked up without a restart.
pub struct AppState {
    pub config: DocsageConfig,
    pub embedder: Arc<dyn EmbedderBackend>,
    search: RwLock<Option<Arc<DocumentSearch>>>,
}

impl AppState {
    pub fn new(config: DocsageConfig, embedder: Arc<dyn EmbedderBackend>) -> Self {
        Self {
            config,
            embedder,
            search: RwLock::new(None),
        }
    }

    /// State with an already-loaded index.
    pub fn with_index(
        config: DocsageConfig,
        embedder: Arc<dyn EmbedderBackend>,
        index: Arc<SimilarityIndex>,
    ) -> Result<Self> {
        let search = DocumentSearch::from_config(index, embedder.clone(), &config.retrieval)?;
        Ok(Self {
            config,
            embedder,
            search: RwLock::new(Some(Arc::new(search))),
        })
    }

    /// The loaded search service, without attempting a load.
    pub fn loaded(&self) -> Option<Arc<DocumentSearch>> {
        self.search.read().clone()
    }

    /// The search service, loading the index from disk if needed.
    pub async fn search_service(&self) -> Result<Arc<DocumentSearch>> {
        if let Some(search) = self.loaded() {
            return Ok(search);
        }

        let index_dir = self.config.index_dir.clone();
        let index = tokio::task::spawn_blocking(move || SimilarityIndex::load(&index_dir))
            .await
            .map_err(|e| Error::Internal(format!("index load task failed: {}", e)))?
            .map_err(|e| {
                warn!("Index not available: {}", e);
                e
            })?;

        let search = Arc::new(DocumentSearch::from_config(
            Arc::new(index),
            self.embedder.clone(),
            &self.config.retrieval,
        )?);

        let mut slot = self.search.write();
        // a concurrent request may have loaded it first
        if let Some(existing) = slot.as_ref() {
            return Ok(existing.clone());
        }
        *slot = Some(search.clone());
        info!("Index loaded from {}", self.config.index_dir.display());
        Ok(search)
    }
}
