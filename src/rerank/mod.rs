//! Cross-encoder reranking.
//!
//! Scores are raw model logits: only their order is meaningful, and any
//! threshold applied to them is tied to the model that produced them.

pub mod cross_encoder;
pub mod download;
pub mod mock;
pub mod tokenizer;

use thiserror::Error;
use tracing::info;

use crate::db::RecalledChunk;

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("reranker model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("reranker inference failed: {0}")]
    InferenceFailed(String),

    #[error("reranker returned {actual} scores for {expected} passages")]
    ScoreCount { expected: usize, actual: usize },
}

/// Trait for (query, passage) relevance scorers.
pub trait Reranker: Send + Sync {
    /// One score per passage, in input order. Higher is more relevant.
    fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, RerankError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: RecalledChunk,
    pub score: f32,
}

/// Score `chunks` against `query` and sort by descending score.
///
/// The sort is stable, so equal scores keep their recall order.
pub fn rerank(
    reranker: &dyn Reranker,
    query: &str,
    chunks: Vec<RecalledChunk>,
) -> Result<Vec<ScoredChunk>, RerankError> {
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let passages: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    let scores = reranker.score(query, &passages)?;
    if scores.len() != chunks.len() {
        return Err(RerankError::ScoreCount {
            expected: chunks.len(),
            actual: scores.len(),
        });
    }

    let mut scored: Vec<ScoredChunk> = chunks
        .into_iter()
        .zip(scores)
        .map(|(chunk, score)| ScoredChunk { chunk, score })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));

    info!("Reranked {} chunks", scored.len());
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::mock::MockReranker;
    use super::*;

    fn recalled(text: &str) -> RecalledChunk {
        RecalledChunk {
            text: text.to_string(),
            source: Some("a.md".to_string()),
            chunk_index: Some(0),
            distance: 0.0,
        }
    }

    #[test]
    fn test_sorted_descending() {
        let reranker = MockReranker::new(0.0)
            .with_score("low", -5.0)
            .with_score("high", 4.0)
            .with_score("mid", 1.0);
        let out = rerank(
            &reranker,
            "q",
            vec![recalled("low"), recalled("high"), recalled("mid")],
        )
        .unwrap();
        let texts: Vec<&str> = out.iter().map(|s| s.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["high", "mid", "low"]);
        assert_eq!(out[0].score, 4.0);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let reranker = MockReranker::new(2.0);
        let out = rerank(
            &reranker,
            "q",
            vec![recalled("first"), recalled("second"), recalled("third")],
        )
        .unwrap();
        let texts: Vec<&str> = out.iter().map(|s| s.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_empty_input_skips_model() {
        let reranker = MockReranker::failing();
        assert!(rerank(&reranker, "q", Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_failure_propagates() {
        let reranker = MockReranker::failing();
        assert!(rerank(&reranker, "q", vec![recalled("x")]).is_err());
    }

    struct ShortReranker;

    impl Reranker for ShortReranker {
        fn score(&self, _query: &str, _passages: &[&str]) -> Result<Vec<f32>, RerankError> {
            Ok(vec![1.0])
        }
    }

    #[test]
    fn test_score_count_mismatch() {
        let err = rerank(&ShortReranker, "q", vec![recalled("a"), recalled("b")]).unwrap_err();
        assert!(matches!(
            err,
            RerankError::ScoreCount {
                expected: 2,
                actual: 1
            }
        ));
    }
}
