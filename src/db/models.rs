use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMetadata {
    pub source: String,
    pub chunk_index: usize,
}

/// A chunk ready to be written: generated id, embedding, annotated text.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A chunk returned by a nearest-neighbor query.
///
/// Metadata is optional at this boundary; callers fall back to an
/// "unknown source" label.
#[derive(Debug, Clone, PartialEq)]
pub struct RecalledChunk {
    pub text: String,
    pub source: Option<String>,
    pub chunk_index: Option<usize>,
    pub distance: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub total_chunks: usize,
    pub total_files: usize,
    pub files: Vec<String>,
}
