//! Corpus discovery and per-page PDF text extraction.

use std::path::{Path, PathBuf};

use lopdf::Document;
use tracing::{debug, warn};
use walkdir::WalkDir;

use docsage_core::{Error, PageText, Result, SourceDocument};

/// Extracts page text from one document file.
///
/// A failure is reported as `Error::Ingestion` for that document only; the
/// indexer logs it and moves on.
pub trait PageExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<SourceDocument>;
}

/// `PageExtractor` for PDF files, backed by `lopdf`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl PageExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<SourceDocument> {
        let source = source_name(path);
        let doc = Document::load(path).map_err(|e| Error::ingestion(&source, e.to_string()))?;
        if doc.is_encrypted() {
            return Err(Error::ingestion(&source, "document is encrypted"));
        }

        let mut pages = Vec::new();
        for page_number in doc.get_pages().into_keys() {
            // lopdf numbers pages from 1
            let page = page_number.saturating_sub(1);
            let text = match doc.extract_text(&[page_number]) {
                Ok(text) => text,
                Err(e) => {
                    warn!("{}: page {} has no extractable text: {}", source, page, e);
                    String::new()
                }
            };
            pages.push(PageText { page, text });
        }
        if pages.is_empty() {
            return Err(Error::ingestion(&source, "document has no pages"));
        }

        debug!("Extracted {} pages from {}", pages.len(), source);
        Ok(SourceDocument { source, pages })
    }
}

/// File name used as the chunk `source`.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// List `*.pdf` files directly inside `dir`, sorted by file name.
///
/// A missing directory or one without PDFs is a configuration error.
pub fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::Config(format!(
            "data directory {} does not exist",
            dir.display()
        )));
    }

    let files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_pdf(path))
        .collect();

    if files.is_empty() {
        return Err(Error::Config(format!(
            "no PDF files found in {}",
            dir.display()
        )));
    }
    Ok(files)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}
