//! Knowledge store: SQLite + sqlite-vec.
//!
//! Chunks are keyed by a generated UUID and tagged with their source
//! filename; embeddings live in a `vec0` virtual table sharing the chunk's
//! rowid. The [`KnowledgeStore`] trait is the boundary the search pipeline
//! and the ingestor are written against.
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, Once};

use rusqlite::{Connection, OptionalExtension, params};
use sqlite_vec::sqlite3_vec_init;
use thiserror::Error;
use tracing::{error, info};

pub mod documents;
pub mod models;
pub mod search;

pub use models::{ChunkMetadata, NewChunk, RecalledChunk, StoreStats};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    pk INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    content TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source);

CREATE TABLE IF NOT EXISTS ingest_state (
    source TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    started_at DATETIME NOT NULL,
    finished_at DATETIME
);
"#;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("expected {expected}-dimensional embedding, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Minimal document + vector store contract.
///
/// Read operations degrade to empty results instead of failing; write
/// operations report failures to the caller.
pub trait KnowledgeStore: Send + Sync {
    /// Distinct `source` values across all stored chunks.
    fn list_source_files(&self) -> HashSet<String>;

    /// Remove every chunk of `source`. Returns the number removed.
    fn delete_by_source(&self, source: &str) -> Result<usize, StoreError>;

    /// Store a batch of chunks. All or nothing per batch.
    fn add_chunks(&self, batch: &[NewChunk]) -> Result<(), StoreError>;

    /// Top-`top_n` nearest chunks to `embedding`, nearest first.
    fn query_by_vector(&self, embedding: &[f32], top_n: usize) -> Vec<RecalledChunk>;

    /// Flag `source` as being ingested.
    fn begin_ingest(&self, source: &str) -> Result<(), StoreError>;

    /// Clear the in-progress flag set by [`begin_ingest`](Self::begin_ingest).
    fn finish_ingest(&self, source: &str) -> Result<(), StoreError>;

    /// Sources whose ingestion started but never finished.
    fn partial_sources(&self) -> HashSet<String>;

    fn stats(&self) -> StoreStats;
}

static INIT_VEC: Once = Once::new();

/// Initialize the sqlite-vec extension. Safe to call multiple times.
fn init_sqlite_vec() {
    INIT_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// A SQLite connection initialized with sqlite-vec and the chunk schema.
pub struct Db {
    conn: Mutex<Connection>,
    dimensions: usize,
}

impl Db {
    /// Open a database at the given path and initialize the schema.
    pub fn open<P: AsRef<Path>>(path: P, dimensions: usize) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!("Initializing knowledge store: {}", path.display());
        init_sqlite_vec();
        let conn = Connection::open(path)?;
        Self::init(conn, dimensions)
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory(dimensions: usize) -> Result<Self, StoreError> {
        init_sqlite_vec();
        let conn = Connection::open_in_memory()?;
        Self::init(conn, dimensions)
    }

    fn init(conn: Connection, dimensions: usize) -> Result<Self, StoreError> {
        let vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        info!("sqlite-vec version: {}", vec_version);

        conn.execute_batch(SCHEMA_SQL)?;

        // The vec0 column width is fixed at creation time.
        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = 'dimensions'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match stored.and_then(|v| v.parse::<usize>().ok()) {
            Some(existing) if existing != dimensions => {
                return Err(StoreError::DimensionMismatch {
                    expected: existing,
                    actual: dimensions,
                });
            }
            Some(_) => {}
            None => {
                conn.execute(
                    "INSERT INTO store_meta (key, value) VALUES ('dimensions', ?)",
                    params![dimensions.to_string()],
                )?;
            }
        }

        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS vec_chunks USING vec0(embedding FLOAT[{dimensions}]);"
        ))?;

        info!("Knowledge store ready ({dimensions} dimensions)");
        Ok(Self {
            conn: Mutex::new(conn),
            dimensions,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl KnowledgeStore for Db {
    fn list_source_files(&self) -> HashSet<String> {
        self.sources().unwrap_or_else(|e| {
            error!("Failed to list source files: {e}");
            HashSet::new()
        })
    }

    fn delete_by_source(&self, source: &str) -> Result<usize, StoreError> {
        let removed = self.remove_source(source)?;
        info!("Deleted {removed} chunks for {source}");
        Ok(removed)
    }

    fn add_chunks(&self, batch: &[NewChunk]) -> Result<(), StoreError> {
        self.insert_chunks(batch)
    }

    fn query_by_vector(&self, embedding: &[f32], top_n: usize) -> Vec<RecalledChunk> {
        self.nearest(embedding, top_n).unwrap_or_else(|e| {
            error!("Vector query failed: {e}");
            Vec::new()
        })
    }

    fn begin_ingest(&self, source: &str) -> Result<(), StoreError> {
        self.mark_partial(source)
    }

    fn finish_ingest(&self, source: &str) -> Result<(), StoreError> {
        self.mark_complete(source)
    }

    fn partial_sources(&self) -> HashSet<String> {
        self.partial().unwrap_or_else(|e| {
            error!("Failed to read ingest state: {e}");
            HashSet::new()
        })
    }

    fn stats(&self) -> StoreStats {
        self.collection_stats().unwrap_or_else(|e| {
            error!("Failed to read store stats: {e}");
            StoreStats::default()
        })
    }
}

/// Helper to serialize a float32 vector into bytes for the vec0 virtual table.
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}
