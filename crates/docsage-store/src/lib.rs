//! Docsage Store: flat exact similarity index + SQLite artifact.

pub mod index;
pub mod persist;
pub mod schema;
pub mod types;

pub use index::SimilarityIndex;
pub use types::*;
