//! Artifact schema SQL.

/// File name of the persisted index inside the index directory.
pub const INDEX_FILE: &str = "index.db";

/// Build metadata (key/value), chunk rows, and raw f32 embeddings.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    row INTEGER PRIMARY KEY,
    source TEXT NOT NULL,
    page INTEGER NOT NULL,
    position INTEGER NOT NULL,
    text TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_chunks_source_position ON chunks(source, position);

CREATE TABLE IF NOT EXISTS embeddings (
    row INTEGER PRIMARY KEY REFERENCES chunks(row),
    vector BLOB NOT NULL
);
"#;
