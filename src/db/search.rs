use super::{Db, StoreError, models::RecalledChunk, serialize_vector};
use rusqlite::params;

fn map_recall_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecalledChunk> {
    Ok(RecalledChunk {
        text: row.get(0)?,
        source: row.get(1)?,
        chunk_index: row.get::<_, Option<i64>>(2)?.map(|v| v as usize),
        distance: row.get(3)?,
    })
}

impl Db {
    /// Nearest chunks by cosine distance, closest first
    pub fn nearest(
        &self,
        query_vector: &[f32],
        top_n: usize,
    ) -> Result<Vec<RecalledChunk>, StoreError> {
        if query_vector.len() != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: query_vector.len(),
            });
        }
        if top_n == 0 {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT
                c.content,
                c.source,
                c.chunk_index,
                vec_distance_cosine(v.embedding, ?) AS distance
            FROM vec_chunks v
            JOIN chunks c ON c.pk = v.rowid
            ORDER BY distance ASC
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(
            params![serialize_vector(query_vector), top_n as i64],
            map_recall_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
