use crate::config::ChunkingConfig;
use crate::db::{ChunkMetadata, KnowledgeStore, NewChunk, StoreError};
use crate::embedder::Embedder;
use crate::indexer::markdown;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Number of chunks written.
    Stored(usize),
    AlreadyExists,
    EmptyDocument,
}

#[derive(Error, Debug)]
pub enum IngestError {
    /// Batches written before the failure stay in the store; the source is
    /// left flagged as partial.
    #[error("store write failed: {0}")]
    StoreWrite(#[from] StoreError),
}

/// Chunks, embeds and stores markdown documents.
pub struct Ingestor {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        embedder: Arc<dyn Embedder>,
        chunking: ChunkingConfig,
    ) -> Self {
        info!(
            "Ingestor ready: chunk size {}, batch size {}",
            chunking.chunk_size, chunking.batch_size
        );
        Self {
            store,
            embedder,
            chunking,
        }
    }

    pub fn ingest(&self, content: &str, filename: &str) -> Result<IngestOutcome, IngestError> {
        self.ingest_with_progress(content, filename, |_, _| {})
    }

    /// Ingest one document, reporting `(fraction, message)` after each chunk.
    pub fn ingest_with_progress<F>(
        &self,
        content: &str,
        filename: &str,
        mut progress: F,
    ) -> Result<IngestOutcome, IngestError>
    where
        F: FnMut(f32, &str),
    {
        if self.store.partial_sources().contains(filename) {
            warn!("{filename} was only partially ingested, replacing leftovers");
            self.store.delete_by_source(filename)?;
        } else if self.store.list_source_files().contains(filename) {
            warn!("File already exists: {filename}");
            return Ok(IngestOutcome::AlreadyExists);
        }

        let chunks = markdown::split_smart(
            content,
            self.chunking.chunk_size,
            self.chunking.overlap_lines,
        );
        let total = chunks.len();
        if total == 0 {
            warn!("File is empty: {filename}");
            return Ok(IngestOutcome::EmptyDocument);
        }

        info!("Ingesting {filename}: {total} chunks");
        self.store.begin_ingest(filename)?;

        let message = format!("Ingesting {filename}...");
        let batch_size = self.chunking.batch_size.max(1);
        let mut batch: Vec<NewChunk> = Vec::with_capacity(batch_size);
        let mut stored = 0usize;

        for (index, text) in chunks.into_iter().enumerate() {
            if text.chars().count() >= self.chunking.min_chunk_chars {
                match self.embedder.embed(&text) {
                    Ok(embedding) => batch.push(NewChunk {
                        id: Uuid::new_v4().to_string(),
                        embedding,
                        text,
                        metadata: ChunkMetadata {
                            source: filename.to_string(),
                            chunk_index: index,
                        },
                    }),
                    Err(e) => error!("Chunk {index} of {filename} failed to embed, skipping: {e}"),
                }

                if batch.len() >= batch_size {
                    stored += self.flush(&mut batch, filename)?;
                }
            }

            progress((index + 1) as f32 / total as f32, &message);
        }

        if !batch.is_empty() {
            stored += self.flush(&mut batch, filename)?;
        }

        self.store.finish_ingest(filename)?;
        info!("Ingested {filename}: {stored} chunks stored");
        Ok(IngestOutcome::Stored(stored))
    }

    fn flush(&self, batch: &mut Vec<NewChunk>, filename: &str) -> Result<usize, IngestError> {
        if let Err(e) = self.store.add_chunks(batch) {
            error!("Writing batch for {filename} failed: {e}");
            return Err(e.into());
        }
        let written = batch.len();
        batch.clear();
        Ok(written)
    }
}
