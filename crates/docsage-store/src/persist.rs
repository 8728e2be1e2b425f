//! Saving and loading the index artifact.
//!
//! The artifact is a single SQLite file (`index.db`) inside the index
//! directory. Saves go to a temp file that is renamed into place on success,
//! so an interrupted build never leaves a half-written artifact behind.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ndarray::Array2;
use rusqlite::{params, Connection, OpenFlags};
use tracing::{debug, info};

use crate::index::{fingerprint, SimilarityIndex};
use crate::schema::{INDEX_FILE, SCHEMA_SQL};
use crate::types::*;
use docsage_core::{Chunk, DistanceMetric, Error, Result};

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

fn unavailable(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::IndexUnavailable(format!("{}: {}", path.display(), e))
}

fn encode_vector(values: impl Iterator<Item = f32>) -> Vec<u8> {
    values.flat_map(f32::to_le_bytes).collect()
}

fn decode_vector(blob: &[u8]) -> impl Iterator<Item = f32> + '_ {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

impl SimilarityIndex {
    /// Path of the artifact file inside `index_dir`.
    pub fn artifact_path(index_dir: &Path) -> PathBuf {
        index_dir.join(INDEX_FILE)
    }

    /// Persist the index into `index_dir`, replacing any previous artifact.
    pub fn save(&self, index_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(index_dir)?;
        let final_path = Self::artifact_path(index_dir);
        let tmp_path = index_dir.join(format!("{}.tmp", INDEX_FILE));
        if tmp_path.exists() {
            std::fs::remove_file(&tmp_path)?;
        }

        if let Err(e) = self.write_db(&tmp_path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e);
        }
        std::fs::rename(&tmp_path, &final_path)?;

        info!(
            "Saved index: {} rows to {}",
            self.len(),
            final_path.display()
        );
        Ok(final_path)
    }

    fn write_db(&self, path: &Path) -> Result<()> {
        let mut conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch(SCHEMA_SQL).map_err(db_err)?;

        let tx = conn.transaction().map_err(db_err)?;
        {
            let meta = &self.meta;
            let mut stmt = tx
                .prepare("INSERT INTO index_meta (key, value) VALUES (?1, ?2)")
                .map_err(db_err)?;
            let entries = [
                ("format_version", meta.format_version.to_string()),
                ("dimension", meta.dimension.to_string()),
                ("metric", meta.metric.as_str().to_string()),
                ("embedder", meta.embedder.clone()),
                ("built_at", meta.built_at.to_rfc3339()),
                ("fingerprint", meta.fingerprint.clone()),
                ("rows", meta.rows.to_string()),
            ];
            for (key, value) in entries {
                stmt.execute(params![key, value]).map_err(db_err)?;
            }

            let mut chunk_stmt = tx
                .prepare(
                    "INSERT INTO chunks (row, source, page, position, text) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(db_err)?;
            let mut vec_stmt = tx
                .prepare("INSERT INTO embeddings (row, vector) VALUES (?1, ?2)")
                .map_err(db_err)?;
            for (row, chunk) in self.chunks.iter().enumerate() {
                let row_id = row as i64;
                chunk_stmt
                    .execute(params![
                        row_id,
                        chunk.source,
                        chunk.page,
                        chunk.position,
                        chunk.text
                    ])
                    .map_err(db_err)?;
                let blob = encode_vector(self.vectors.row(row).iter().copied());
                vec_stmt.execute(params![row_id, blob]).map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;
        debug!("Wrote {} rows to {}", self.len(), path.display());
        Ok(())
    }

    /// Load the artifact from `index_dir`.
    ///
    /// Any missing, unreadable, or inconsistent artifact is reported as
    /// `IndexUnavailable`.
    pub fn load(index_dir: &Path) -> Result<Self> {
        let path = Self::artifact_path(index_dir);
        if !path.is_file() {
            return Err(Error::IndexUnavailable(format!(
                "no index found at {} (run `docsage build` first)",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| unavailable(&path, e))?;
        let meta = read_meta(&conn).map_err(|e| unavailable(&path, e))?;
        if meta.format_version != FORMAT_VERSION {
            return Err(unavailable(
                &path,
                format!(
                    "unsupported format version {} (expected {})",
                    meta.format_version, FORMAT_VERSION
                ),
            ));
        }

        let chunks = read_chunks(&conn).map_err(|e| unavailable(&path, e))?;
        let vectors =
            read_vectors(&conn, meta.dimension).map_err(|e| unavailable(&path, e))?;

        if chunks.len() != meta.rows || vectors.nrows() != meta.rows {
            return Err(unavailable(
                &path,
                format!(
                    "row count mismatch: meta={}, chunks={}, embeddings={}",
                    meta.rows,
                    chunks.len(),
                    vectors.nrows()
                ),
            ));
        }
        if fingerprint(&chunks) != meta.fingerprint {
            return Err(unavailable(&path, "corpus fingerprint mismatch"));
        }

        let index = Self::from_parts(meta, chunks, vectors)
            .map_err(|e| unavailable(&path, e))?;
        info!(
            "Loaded index: {} rows, dim={}, metric={}, embedder={}",
            index.len(),
            index.dimension(),
            index.metric(),
            index.meta().embedder
        );
        Ok(index)
    }
}

fn read_meta(conn: &Connection) -> std::result::Result<IndexMeta, String> {
    let mut stmt = conn
        .prepare("SELECT key, value FROM index_meta")
        .map_err(|e| e.to_string())?;
    let pairs = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(|e| e.to_string())?
        .collect::<std::result::Result<std::collections::HashMap<_, _>, _>>()
        .map_err(|e| e.to_string())?;

    let get = |key: &str| {
        pairs
            .get(key)
            .cloned()
            .ok_or_else(|| format!("missing metadata key {}", key))
    };
    let number = |key: &str| -> std::result::Result<usize, String> {
        get(key)?
            .parse()
            .map_err(|_| format!("invalid metadata value for {}", key))
    };

    let metric_raw = get("metric")?;
    let metric = DistanceMetric::parse(&metric_raw)
        .ok_or_else(|| format!("unknown metric {}", metric_raw))?;
    let built_at = DateTime::parse_from_rfc3339(&get("built_at")?)
        .map_err(|e| format!("invalid built_at: {}", e))?
        .with_timezone(&Utc);

    Ok(IndexMeta {
        format_version: number("format_version")? as u32,
        dimension: number("dimension")?,
        metric,
        embedder: get("embedder")?,
        built_at,
        fingerprint: get("fingerprint")?,
        rows: number("rows")?,
    })
}

fn read_chunks(conn: &Connection) -> std::result::Result<Vec<Chunk>, String> {
    let mut stmt = conn
        .prepare("SELECT row, source, page, position, text FROM chunks ORDER BY row")
        .map_err(|e| e.to_string())?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                Chunk {
                    source: row.get(1)?,
                    page: row.get(2)?,
                    position: row.get(3)?,
                    text: row.get(4)?,
                },
            ))
        })
        .map_err(|e| e.to_string())?;

    let mut chunks = Vec::new();
    for (expected, row) in rows.enumerate() {
        let (row_id, chunk) = row.map_err(|e| e.to_string())?;
        if row_id != expected as i64 {
            return Err(format!("chunk rows not contiguous at {}", expected));
        }
        chunks.push(chunk);
    }
    Ok(chunks)
}

fn read_vectors(conn: &Connection, dim: usize) -> std::result::Result<Array2<f32>, String> {
    let mut stmt = conn
        .prepare("SELECT row, vector FROM embeddings ORDER BY row")
        .map_err(|e| e.to_string())?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)))
        .map_err(|e| e.to_string())?;

    let mut flat: Vec<f32> = Vec::new();
    let mut n = 0usize;
    for row in rows {
        let (row_id, blob) = row.map_err(|e| e.to_string())?;
        if row_id != n as i64 {
            return Err(format!("embedding rows not contiguous at {}", n));
        }
        if blob.len() != dim * 4 {
            return Err(format!(
                "embedding {} has {} bytes, expected {}",
                row_id,
                blob.len(),
                dim * 4
            ));
        }
        flat.extend(decode_vector(&blob));
        n += 1;
    }
    Array2::from_shape_vec((n, dim), flat).map_err(|e| e.to_string())
}
