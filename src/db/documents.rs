use super::{Db, StoreError, models::*, serialize_vector};
use rusqlite::{Result, params};
use std::collections::HashSet;

const STATUS_PARTIAL: &str = "partial";
const STATUS_COMPLETE: &str = "complete";

impl Db {
    /// Distinct source filenames that have at least one stored chunk
    pub fn sources(&self) -> Result<HashSet<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT source FROM chunks")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<HashSet<_>>>()?)
    }

    /// Deletes all chunks of a source (and its ingest marker)
    pub fn remove_source(&self, source: &str) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        // vec0 tables don't participate in foreign keys
        tx.execute(
            "DELETE FROM vec_chunks WHERE rowid IN (SELECT pk FROM chunks WHERE source = ?)",
            params![source],
        )?;
        let removed = tx.execute("DELETE FROM chunks WHERE source = ?", params![source])?;
        tx.execute("DELETE FROM ingest_state WHERE source = ?", params![source])?;

        tx.commit()?;
        Ok(removed)
    }

    /// Inserts a batch of chunks with their embeddings in one transaction
    pub fn insert_chunks(&self, batch: &[NewChunk]) -> Result<(), StoreError> {
        if let Some(bad) = batch.iter().find(|c| c.embedding.len() != self.dimensions) {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: bad.embedding.len(),
            });
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut chunk_stmt = tx.prepare(
                "INSERT INTO chunks (id, source, chunk_index, content) VALUES (?, ?, ?, ?)",
            )?;
            let mut vec_stmt =
                tx.prepare("INSERT INTO vec_chunks (rowid, embedding) VALUES (?, ?)")?;

            for chunk in batch {
                chunk_stmt.execute(params![
                    chunk.id,
                    chunk.metadata.source,
                    chunk.metadata.chunk_index as i64,
                    chunk.text
                ])?;
                let pk = tx.last_insert_rowid();
                vec_stmt.execute(params![pk, serialize_vector(&chunk.embedding)])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn mark_partial(&self, source: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO ingest_state (source, status, started_at, finished_at)
            VALUES (?, ?, CURRENT_TIMESTAMP, NULL)
            ON CONFLICT(source) DO UPDATE SET
                status = excluded.status,
                started_at = CURRENT_TIMESTAMP,
                finished_at = NULL
            "#,
            params![source, STATUS_PARTIAL],
        )?;
        Ok(())
    }

    pub fn mark_complete(&self, source: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE ingest_state SET status = ?, finished_at = CURRENT_TIMESTAMP WHERE source = ?",
            params![STATUS_COMPLETE, source],
        )?;
        Ok(())
    }

    pub fn partial(&self) -> Result<HashSet<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT source FROM ingest_state WHERE status = ?")?;
        let rows = stmt.query_map(params![STATUS_PARTIAL], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<HashSet<_>>>()?)
    }

    pub fn collection_stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.lock()?;
        let total_chunks: i64 = conn.query_row("SELECT count(*) FROM chunks", [], |row| row.get(0))?;
        let mut stmt = conn.prepare("SELECT DISTINCT source FROM chunks ORDER BY source")?;
        let files = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>>>()?;

        Ok(StoreStats {
            total_chunks: total_chunks as usize,
            total_files: files.len(),
            files,
        })
    }
}
