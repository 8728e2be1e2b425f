//! Offline index build: scan → extract → chunk → position → embed → save.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::chunking::RecursiveChunker;
use crate::file::{discover_pdfs, source_name, PageExtractor};
use docsage_core::{Chunk, DistanceMetric, DocsageConfig, Error, PageChunk, Result, SourceDocument};
use docsage_infer::EmbedderBackend;
use docsage_store::{EmbeddedChunk, SimilarityIndex};

/// Summary of a `build_corpus` run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub documents_processed: usize,
    pub documents_failed: usize,
    pub failed_sources: Vec<String>,
    pub chunks: usize,
    pub dimension: usize,
    pub artifact: PathBuf,
}

/// Builds a `SimilarityIndex` from documents.
pub struct Indexer {
    chunker: RecursiveChunker,
    embedder: Arc<dyn EmbedderBackend>,
    metric: DistanceMetric,
    batch_size: usize,
}

impl Indexer {
    pub fn new(
        chunker: RecursiveChunker,
        embedder: Arc<dyn EmbedderBackend>,
        metric: DistanceMetric,
        batch_size: usize,
    ) -> Self {
        Self {
            chunker,
            embedder,
            metric,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(config: &DocsageConfig, embedder: Arc<dyn EmbedderBackend>) -> Result<Self> {
        Ok(Self::new(
            RecursiveChunker::from_config(&config.chunking)?,
            embedder,
            config.retrieval.metric,
            config.embedding.batch_size,
        ))
    }

    /// Number chunks sequentially per source, in input order.
    pub fn assign_positions(chunks: Vec<PageChunk>) -> Vec<Chunk> {
        let mut next: HashMap<String, u32> = HashMap::new();
        chunks
            .into_iter()
            .map(|chunk| {
                let counter = next.entry(chunk.source.clone()).or_insert(0);
                let position = *counter;
                *counter += 1;
                Chunk::from_page_chunk(chunk, position)
            })
            .collect()
    }

    /// Chunk every page of every document, preserving document and page order.
    pub fn chunk_documents(&self, documents: &[SourceDocument]) -> Vec<PageChunk> {
        documents
            .iter()
            .flat_map(|doc| {
                doc.pages
                    .iter()
                    .flat_map(move |page| self.chunker.chunk_page(&doc.source, page.page, &page.text))
            })
            .collect()
    }

    /// Embed `chunks` and build the index. Row `i` holds `chunks[i]`.
    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<SimilarityIndex> {
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let expected_dim = self.embedder.dimension();
        let mut entries = Vec::with_capacity(chunks.len());
        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(Error::embedding(
                    &self.embedder.name(),
                    format!("expected {} embeddings, got {}", batch.len(), vectors.len()),
                ));
            }
            for (chunk, embedding) in batch.iter().zip(vectors) {
                if embedding.len() != expected_dim {
                    return Err(Error::DimensionMismatch {
                        expected: expected_dim,
                        actual: embedding.len(),
                    });
                }
                entries.push(EmbeddedChunk {
                    chunk: chunk.clone(),
                    embedding,
                });
            }
            debug!(
                "Embedded batch {} ({} / {} chunks)",
                batch_no + 1,
                entries.len(),
                chunks.len()
            );
        }

        SimilarityIndex::build(entries, self.metric, &self.embedder.name())
    }

    /// Build and save an index for every PDF in `data_dir`.
    ///
    /// Documents that fail to extract are logged and skipped. The run fails
    /// with `NoContent` when nothing usable remains.
    pub async fn build_corpus(
        &self,
        data_dir: &Path,
        index_dir: &Path,
        extractor: &dyn PageExtractor,
    ) -> Result<BuildReport> {
        let paths = discover_pdfs(data_dir)?;
        info!("Found {} PDF files in {}", paths.len(), data_dir.display());

        let mut documents = Vec::with_capacity(paths.len());
        let mut failed_sources = Vec::new();
        for path in &paths {
            match extractor.extract(path) {
                Ok(doc) => {
                    info!("Loaded {} ({} pages)", doc.source, doc.pages.len());
                    documents.push(doc);
                }
                Err(e) => {
                    error!("Skipping {}: {}", path.display(), e);
                    failed_sources.push(source_name(path));
                }
            }
        }
        if documents.is_empty() {
            return Err(Error::NoContent);
        }

        let page_chunks = self.chunk_documents(&documents);
        if page_chunks.is_empty() {
            return Err(Error::NoContent);
        }
        let chunks = Self::assign_positions(page_chunks);
        info!(
            "Split {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        let chunk_count = chunks.len();
        let index = self.build(chunks).await?;
        let artifact = index.save(index_dir)?;

        Ok(BuildReport {
            documents_processed: documents.len(),
            documents_failed: failed_sources.len(),
            failed_sources,
            chunks: chunk_count,
            dimension: index.dimension(),
            artifact,
        })
    }
}
