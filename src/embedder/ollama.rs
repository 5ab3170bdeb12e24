/// Embedding gateway backed by Ollama's `/api/embeddings` endpoint.
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Embedder, EmbedderError, check_vector};
use crate::config::Config;
use crate::ollama::{OllamaClient, OllamaError};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &Config) -> Result<Self, OllamaError> {
        let client = OllamaClient::new(&config.ollama)?;
        info!(
            "Embedder initialized: model={}, dimensions={}",
            config.ollama.embedding_model, config.embedding.dimensions
        );
        Ok(Self {
            client,
            model: config.ollama.embedding_model.clone(),
            dimensions: config.embedding.dimensions,
        })
    }
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };
        let response: EmbeddingResponse = self
            .client
            .post_json("/api/embeddings", &request)
            .map_err(|e| EmbedderError::ServiceFailed(e.to_string()))?;

        check_vector(response.embedding, self.dimensions)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
