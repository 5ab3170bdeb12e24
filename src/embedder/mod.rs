/// Embedder trait and shared types for text embedding.
///
/// The embedding model is an external service; every failure is reported
/// as an [`EmbedderError`] and the caller decides whether to skip the unit
/// of work (ingestion skips the chunk, search skips the query variant).
pub mod mock;
pub mod ollama;

use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("embedding service failed: {0}")]
    ServiceFailed(String),

    #[error("embedding service returned an empty vector")]
    EmptyVector,

    #[error("expected {expected}-dimensional embedding, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow shared use
/// behind `Arc`.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}

/// Reject vectors the store could not index.
pub(crate) fn check_vector(vec: Vec<f32>, expected: usize) -> Result<Vec<f32>, EmbedderError> {
    if vec.is_empty() {
        return Err(EmbedderError::EmptyVector);
    }
    if vec.len() != expected {
        return Err(EmbedderError::DimensionMismatch {
            expected,
            actual: vec.len(),
        });
    }
    Ok(vec)
}
