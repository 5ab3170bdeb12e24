/// Pair tokenizer for cross-encoder models, wrapping the HuggingFace
/// `tokenizers` crate.
///
/// Each (query, passage) pair is encoded as one sequence with the model's
/// separator tokens; batches are padded to the longest pair.
use std::path::Path;

use anyhow::Result;
use tokenizers::Tokenizer;

pub struct PairTokenizer {
    inner: Tokenizer,
    max_length: usize,
}

/// Tokenized batch, flattened row-major as `[batch, seq_len]`.
#[derive(Debug, Clone)]
pub struct PairBatch {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub batch_size: usize,
    pub seq_len: usize,
}

impl PairTokenizer {
    /// Load a tokenizer from a `tokenizer.json` file in the model directory.
    pub fn from_model_dir(model_dir: &Path, max_length: usize) -> Result<Self> {
        let tokenizer_path = model_dir.join("tokenizer.json");

        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {}",
            model_dir.display()
        );

        let mut inner = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        // Longest-first truncation trims the passage before the query
        inner
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("invalid truncation settings: {e}"))?;

        inner.with_padding(Some(tokenizers::PaddingParams::default()));

        Ok(Self { inner, max_length })
    }

    /// Encode `query` against every passage in one padded batch.
    pub fn encode_pairs(&self, query: &str, passages: &[&str]) -> Result<PairBatch> {
        let inputs: Vec<(&str, &str)> = passages.iter().map(|p| (query, *p)).collect();
        let encodings = self
            .inner
            .encode_batch(inputs, true)
            .map_err(|e| anyhow::anyhow!("failed to encode pairs: {e}"))?;

        let seq_len = encodings.first().map_or(0, |e| e.get_ids().len());
        let mut input_ids = Vec::with_capacity(encodings.len() * seq_len);
        let mut attention_mask = Vec::with_capacity(encodings.len() * seq_len);

        for enc in &encodings {
            anyhow::ensure!(
                enc.get_ids().len() == seq_len,
                "ragged batch: expected {seq_len} tokens, got {}",
                enc.get_ids().len()
            );
            input_ids.extend(enc.get_ids().iter().map(|&id| id as i64));
            attention_mask.extend(enc.get_attention_mask().iter().map(|&m| m as i64));
        }

        Ok(PairBatch {
            input_ids,
            attention_mask,
            batch_size: encodings.len(),
            seq_len,
        })
    }

    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(false)
    }

    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Requires the downloaded reranker tokenizer.
    /// Run with: cargo test tokenizer -- --ignored
    #[test]
    #[ignore]
    fn test_encode_pairs_with_real_model() {
        let model_dir = Path::new("models/bge-reranker-base");
        if !model_dir.join("tokenizer.json").exists() {
            eprintln!("Skipping: model files not downloaded");
            return;
        }

        let tokenizer = PairTokenizer::from_model_dir(model_dir, 512).unwrap();
        let batch = tokenizer
            .encode_pairs("fever", &["Fever is a raised body temperature.", "Cough"])
            .unwrap();

        assert_eq!(batch.batch_size, 2);
        assert_eq!(batch.input_ids.len(), 2 * batch.seq_len);
        assert_eq!(batch.input_ids.len(), batch.attention_mask.len());
        // Shorter pair is padded
        assert!(batch.attention_mask[batch.seq_len..].contains(&0));
    }

    #[test]
    #[ignore]
    fn test_truncates_long_passages() {
        let model_dir = Path::new("models/bge-reranker-base");
        if !model_dir.join("tokenizer.json").exists() {
            return;
        }

        let tokenizer = PairTokenizer::from_model_dir(model_dir, 64).unwrap();
        let long = "symptom ".repeat(500);
        let batch = tokenizer.encode_pairs("fever", &[long.as_str()]).unwrap();
        assert!(batch.seq_len <= 64);
    }

    #[test]
    fn test_tokenizer_missing_file() {
        let result = PairTokenizer::from_model_dir(Path::new("/nonexistent/path"), 512);
        assert!(result.is_err());
    }
}
