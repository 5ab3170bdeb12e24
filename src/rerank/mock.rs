/// Rule-based reranker for tests.
///
/// A passage gets the score of the first rule whose needle it contains,
/// otherwise the default score.
use super::{RerankError, Reranker};

pub struct MockReranker {
    default_score: f32,
    rules: Vec<(String, f32)>,
    failing: bool,
}

impl MockReranker {
    pub fn new(default_score: f32) -> Self {
        Self {
            default_score,
            rules: Vec::new(),
            failing: false,
        }
    }

    pub fn with_score(mut self, needle: impl Into<String>, score: f32) -> Self {
        self.rules.push((needle.into(), score));
        self
    }

    /// A reranker whose model is unavailable.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new(0.0)
        }
    }
}

impl Default for MockReranker {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Reranker for MockReranker {
    fn score(&self, _query: &str, passages: &[&str]) -> Result<Vec<f32>, RerankError> {
        if self.failing {
            return Err(RerankError::InferenceFailed("mock reranker offline".into()));
        }
        Ok(passages
            .iter()
            .map(|p| {
                self.rules
                    .iter()
                    .find(|(needle, _)| p.contains(needle.as_str()))
                    .map_or(self.default_score, |(_, s)| *s)
            })
            .collect())
    }
}
