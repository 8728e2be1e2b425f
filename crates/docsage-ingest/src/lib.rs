//! Docsage Ingest: PDF page extraction, recursive chunking, index building.

pub mod chunking;
pub mod file;
pub mod indexer;

pub use chunking::RecursiveChunker;
pub use file::{discover_pdfs, PageExtractor, PdfExtractor};
pub use indexer::{BuildReport, Indexer};
