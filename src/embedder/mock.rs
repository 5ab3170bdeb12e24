/// Mock embedder for tests and offline runs.
///
/// Generates deterministic embeddings from a hash of the text, and can be
/// told to fail for specific inputs to exercise the degrade paths.
use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Embedder, EmbedderError};

/// A mock embedder that produces deterministic vectors from text hashes.
pub struct MockEmbedder {
    pub dimensions: usize,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl MockEmbedder {
    /// Create a new `MockEmbedder` with the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail with a service error whenever one of `texts` is embedded.
    #[must_use]
    pub fn failing_on<S: Into<String>>(mut self, texts: impl IntoIterator<Item = S>) -> Self {
        self.failing.extend(texts.into_iter().map(Into::into));
        self
    }

    /// Number of `embed` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if self.failing.contains(text) {
            return Err(EmbedderError::ServiceFailed(format!(
                "mock failure for {text:?}"
            )));
        }

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let bytes = hasher.finish().to_le_bytes();

        let mut embedding: Vec<f32> = (0..self.dimensions)
            .map(|i| bytes[i % 8] as f32 / 255.0 + 0.001)
            .collect();

        // L2 normalize
        let norm_sq: f32 = embedding.iter().map(|v| v * v).sum();
        let inv = 1.0 / norm_sq.sqrt();
        for v in &mut embedding {
            *v *= inv;
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
