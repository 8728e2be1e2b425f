//! `search(query, k)`: retrieve, then expand every match.

use std::sync::Arc;

use tracing::info;

use crate::expand::{ContextExpander, SiblingLookup};
use crate::retriever::Retriever;
use crate::types::ExpandedPassage;
use docsage_core::{Result, RetrievalConfig};
use docsage_infer::EmbedderBackend;
use docsage_store::SimilarityIndex;

/// Stateless query façade over a loaded index. Cheap to share behind `Arc`;
/// concurrent searches only read the index.
pub struct DocumentSearch {
    retriever: Retriever,
    expander: ContextExpander,
}

impl DocumentSearch {
    pub fn new(
        index: Arc<SimilarityIndex>,
        embedder: Arc<dyn EmbedderBackend>,
        lookup: SiblingLookup,
    ) -> Result<Self> {
        Ok(Self {
            retriever: Retriever::new(index.clone(), embedder)?,
            expander: ContextExpander::new(index, lookup),
        })
    }

    pub fn from_config(
        index: Arc<SimilarityIndex>,
        embedder: Arc<dyn EmbedderBackend>,
        config: &RetrievalConfig,
    ) -> Result<Self> {
        Self::new(index, embedder, SiblingLookup::from_config(config))
    }

    pub fn index(&self) -> &Arc<SimilarityIndex> {
        self.retriever.index()
    }

    /// Top `k` passages for `query`, best first. An empty list is a valid
    /// answer.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ExpandedPassage>> {
        let matches = self.retriever.retrieve(query, k).await?;
        let passages = matches
            .iter()
            .map(|m| self.expander.expand(m))
            .collect::<Result<Vec<_>>>()?;
        info!("Search returned {} passages (k={})", passages.len(), k);
        Ok(passages)
    }
}

/// Human-readable rendering: one block per passage with file, relevance, and
/// content.
pub fn render_passages(passages: &[ExpandedPassage]) -> String {
    if passages.is_empty() {
        return "No relevant documents found.".to_string();
    }
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                "[{}] File: {} (page {})\nRelevance: {:.2}\n\n{}",
                i + 1,
                p.source,
                p.page + 1,
                p.relevance_score,
                p.expanded_text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
