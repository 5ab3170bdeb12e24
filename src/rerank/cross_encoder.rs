/// ONNX Runtime cross-encoder using the `ort` crate.
///
/// Loads a sequence-classification export (bge-reranker-base by default),
/// scores each (query, passage) pair in one batch and returns the raw
/// relevance logit per passage.
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use super::tokenizer::PairTokenizer;
use super::{RerankError, Reranker};

pub struct CrossEncoderReranker {
    session: Mutex<Session>,
    tokenizer: PairTokenizer,
}

impl CrossEncoderReranker {
    /// Expects `model.onnx` and `tokenizer.json` in `model_dir`.
    pub fn new(model_dir: &Path, max_length: usize) -> Result<Self, RerankError> {
        let model_path = model_dir.join("model.onnx");

        if !model_path.exists() {
            return Err(RerankError::ModelLoadFailed(format!(
                "model.onnx not found in {}",
                model_dir.display()
            )));
        }

        info!("Loading reranker model from {}", model_dir.display());

        let session = Session::builder()
            .map_err(|e| RerankError::ModelLoadFailed(format!("session builder error: {e}")))?
            .with_intra_threads(4)
            .map_err(|e| RerankError::ModelLoadFailed(format!("thread config error: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| RerankError::ModelLoadFailed(format!("model load error: {e}")))?;

        let tokenizer = PairTokenizer::from_model_dir(model_dir, max_length)
            .map_err(|e| RerankError::ModelLoadFailed(format!("tokenizer error: {e}")))?;

        info!(
            "Reranker ready (vocab size: {}, max length: {})",
            tokenizer.vocab_size(),
            tokenizer.max_length()
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }
}

impl Reranker for CrossEncoderReranker {
    fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, RerankError> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let batch = self
            .tokenizer
            .encode_pairs(query, passages)
            .map_err(|e| RerankError::InferenceFailed(format!("tokenization failed: {e}")))?;
        let shape = [batch.batch_size, batch.seq_len];

        let input_ids = Tensor::from_array((shape, batch.input_ids))
            .map_err(|e| RerankError::InferenceFailed(format!("input_ids error: {e}")))?;
        let attention_mask = Tensor::from_array((shape, batch.attention_mask))
            .map_err(|e| RerankError::InferenceFailed(format!("attention_mask error: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| RerankError::InferenceFailed(format!("lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
            ])
            .map_err(|e| RerankError::InferenceFailed(format!("inference failed: {e}")))?;

        // Logits: [batch_size, num_labels]; relevance is label 0
        let (_shape, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RerankError::InferenceFailed(format!("output extraction: {e}")))?;

        let scores = first_label_scores(logits, batch.batch_size)?;
        debug!("Scored {} passages", scores.len());
        Ok(scores)
    }
}

fn first_label_scores(logits: &[f32], batch_size: usize) -> Result<Vec<f32>, RerankError> {
    if batch_size == 0 || logits.len() < batch_size || logits.len() % batch_size != 0 {
        return Err(RerankError::InferenceFailed(format!(
            "unexpected logits length {} for batch of {batch_size}",
            logits.len()
        )));
    }
    let labels = logits.len() / batch_size;
    Ok(logits.iter().step_by(labels).copied().collect())
}
