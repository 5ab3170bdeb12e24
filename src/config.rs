/// Configuration module for medrag.
///
/// Handles loading, validating, and providing default configuration values.
/// Defaults are the values the assistant was tuned with (bge-m3 embeddings,
/// qwen2.5 chat, bge-reranker-base cross-encoder).
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── Prompts ──────────────────────────────────────────────────────────

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a medical AI assistant that MUST consult the knowledge base.

Hard rules:
1. Retrieve first: whenever the user asks anything medical, the first thing you output must be "Action: Retrieve: [keywords]".
2. No bare answers: before you have seen an Observation (retrieval result), do not give advice and do not ask the user questions.
3. Link symptoms to causes: if the user asks how to treat something and the cause is unclear, retrieve the symptoms first (e.g. "Action: Retrieve: fever with chills") to see what the condition might be.

Standard workflow:
User: fever with chills
Assistant: Thought: The user describes symptoms, I must search the knowledge base first.
Action: Retrieve: fever with chills
Observation: (knowledge returned by the system)
Final Answer: According to the material, this may be...
"#;

pub const DEFAULT_QUERY_EXPANSION_PROMPT: &str = r#"You are a medical search optimisation expert.
Based on the user's colloquial description, generate {count} professional keywords or phrases for searching medical textbooks.
User question: "{query}"
Requirements:
1. Include medical terminology.
2. Include possibly related diseases.
3. Output exactly {count} lines of keywords, without numbering.
"#;

// ── Default value functions ──────────────────────────────────────────

fn default_db_path() -> String {
    "./medical_knowledge.db".to_string()
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "bge-m3".to_string()
}

fn default_chat_model() -> String {
    "qwen2.5:7b".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    1
}

fn default_dimensions() -> usize {
    1024
}

fn default_reranker_dir() -> String {
    "models/bge-reranker-base".to_string()
}

fn default_reranker_repo() -> String {
    "BAAI/bge-reranker-base".to_string()
}

fn default_threshold() -> f32 {
    -10.0
}

fn default_top_k() -> usize {
    3
}

fn default_max_length() -> usize {
    512
}

fn default_chunk_size() -> usize {
    600
}

fn default_overlap_lines() -> usize {
    3
}

fn default_min_chunk_chars() -> usize {
    10
}

fn default_batch_size() -> usize {
    20
}

fn default_multi_query_count() -> usize {
    3
}

fn default_recall_top_n() -> usize {
    5
}

fn default_max_steps() -> usize {
    5
}

fn default_history_turns() -> usize {
    2
}

fn default_temperature_strict() -> f32 {
    0.0
}

fn default_temperature_creative() -> f32 {
    0.7
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_query_expansion_prompt() -> String {
    DEFAULT_QUERY_EXPANSION_PROMPT.to_string()
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub reranker: RerankerConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub prompts: PromptConfig,
}

/// Connection settings for the Ollama server hosting both models.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt. At most 1.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

/// Cross-encoder settings. `threshold` and `top_k` are calibrated to the
/// bge-reranker-base logit distribution and must be revisited together
/// with `repo`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RerankerConfig {
    #[serde(default = "default_reranker_dir")]
    pub model_dir: String,

    #[serde(default = "default_reranker_repo")]
    pub repo: String,

    #[serde(default = "default_threshold")]
    pub threshold: f32,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChunkingConfig {
    /// Character budget that triggers a chunk flush.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_overlap_lines")]
    pub overlap_lines: usize,

    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_multi_query_count")]
    pub multi_query_count: usize,

    #[serde(default = "default_recall_top_n")]
    pub recall_top_n: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    #[serde(default = "default_temperature_strict")]
    pub temperature_strict: f32,

    #[serde(default = "default_temperature_creative")]
    pub temperature_creative: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_system_prompt")]
    pub system: String,

    #[serde(default = "default_query_expansion_prompt")]
    pub query_expansion: String,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            ollama: OllamaConfig::default(),
            embedding: EmbeddingConfig::default(),
            reranker: RerankerConfig::default(),
            chunking: ChunkingConfig::default(),
            search: SearchConfig::default(),
            agent: AgentConfig::default(),
            prompts: PromptConfig::default(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            embedding_model: default_embedding_model(),
            chat_model: default_chat_model(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            model_dir: default_reranker_dir(),
            repo: default_reranker_repo(),
            threshold: default_threshold(),
            top_k: default_top_k(),
            max_length: default_max_length(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap_lines: default_overlap_lines(),
            min_chunk_chars: default_min_chunk_chars(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            multi_query_count: default_multi_query_count(),
            recall_top_n: default_recall_top_n(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            history_turns: default_history_turns(),
            temperature_strict: default_temperature_strict(),
            temperature_creative: default_temperature_creative(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system: default_system_prompt(),
            query_expansion: default_query_expansion_prompt(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and generates a
    /// template file for the default path.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.chunking.chunk_size > 0,
            "chunking.chunk_size must be positive"
        );
        anyhow::ensure!(
            self.chunking.batch_size > 0,
            "chunking.batch_size must be positive"
        );
        anyhow::ensure!(
            self.embedding.dimensions > 0,
            "embedding.dimensions must be positive"
        );
        anyhow::ensure!(self.reranker.top_k > 0, "reranker.top_k must be positive");
        anyhow::ensure!(
            self.search.recall_top_n > 0,
            "search.recall_top_n must be positive"
        );
        anyhow::ensure!(self.agent.max_steps > 0, "agent.max_steps must be positive");
        anyhow::ensure!(
            self.ollama.max_retries <= 1,
            "ollama.max_retries must be 0 or 1"
        );
        anyhow::ensure!(
            self.prompts.query_expansion.contains("{query}"),
            "prompts.query_expansion must contain a {{query}} placeholder"
        );
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chunking.chunk_size, 600);
        assert_eq!(config.chunking.overlap_lines, 3);
        assert_eq!(config.chunking.batch_size, 20);
        assert_eq!(config.search.multi_query_count, 3);
        assert_eq!(config.search.recall_top_n, 5);
        assert_eq!(config.reranker.top_k, 3);
        assert_eq!(config.reranker.threshold, -10.0);
        assert_eq!(config.agent.max_steps, 5);
        assert_eq!(config.agent.history_turns, 2);
        assert_eq!(config.ollama.embedding_model, "bge-m3");
        assert_eq!(config.embedding.dimensions, 1024);
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"db_path": "./test.db", "chunking": {"chunk_size": 1000}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.db_path, "./test.db");
        // Other fields should have defaults
        assert_eq!(config.chunking.overlap_lines, 3);
        assert_eq!(config.reranker.top_k, 3);
        assert!(config.prompts.system.contains("Retrieve:"));
    }

    #[test]
    fn test_validate_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_bad_chunk_size() {
        let mut config = Config::default();
        config.chunking.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_retry_cap() {
        let mut config = Config::default();
        config.ollama.max_retries = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_expansion_placeholder() {
        let mut config = Config::default();
        config.prompts.query_expansion = "give me synonyms".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.chunking.chunk_size, 600);
        // Templates are only written for the default path
        assert!(!path.exists());
    }

    #[test]
    fn test_load_invalid_json_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.db_path, "./medical_knowledge.db");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::default();
        config.reranker.threshold = -4.5;
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.reranker.threshold, -4.5);
        assert_eq!(loaded.ollama.chat_model, config.ollama.chat_model);
    }
}
