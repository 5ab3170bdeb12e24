/// Component wiring.
///
/// Every long-lived component is built once here and shared by `Arc`:
/// the store, the two model-service clients, the reranker, and the search,
/// reasoning and ingestion services composed from them.
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::agent::{LoopSettings, ReasoningLoop};
use crate::config::Config;
use crate::db::{Db, KnowledgeStore};
use crate::embedder::Embedder;
use crate::embedder::ollama::OllamaEmbedder;
use crate::indexer::Ingestor;
use crate::llm::ChatModel;
use crate::llm::ollama::OllamaChat;
use crate::rerank::Reranker;
use crate::rerank::cross_encoder::CrossEncoderReranker;
use crate::rerank::download;
use crate::search::{QueryExpander, SearchEngine, SearchSettings};

#[derive(Clone)]
pub struct App {
    store: Arc<dyn KnowledgeStore>,
    search: Arc<SearchEngine>,
    reasoning: Arc<ReasoningLoop>,
    ingestor: Arc<Ingestor>,
}

impl App {
    /// Build the production stack: SQLite store, Ollama services and the
    /// ONNX cross-encoder (downloaded on first use).
    pub fn build(config: Config) -> Result<Self> {
        config.validate()?;

        let store = Db::open(&config.db_path, config.embedding.dimensions)
            .with_context(|| format!("Failed to open knowledge store at {}", config.db_path))?;
        let embedder =
            OllamaEmbedder::new(&config).context("Failed to create embedding client")?;
        ensure_compatible(&store, &embedder)?;
        let chat = OllamaChat::new(&config.ollama).context("Failed to create chat client")?;

        let model_dir = Path::new(&config.reranker.model_dir);
        download::ensure_model_files(model_dir, &config.reranker.repo)
            .context("Failed to fetch reranker model")?;
        let reranker = CrossEncoderReranker::new(model_dir, config.reranker.max_length)
            .context("Failed to load reranker")?;

        Ok(Self::from_parts(
            config,
            Arc::new(store),
            Arc::new(embedder),
            Arc::new(chat),
            Arc::new(reranker),
        ))
    }

    /// Assemble the services from already-built components.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn KnowledgeStore>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        reranker: Arc<dyn Reranker>,
    ) -> Self {
        let expander = QueryExpander::new(
            chat.clone(),
            config.prompts.query_expansion.clone(),
            config.agent.temperature_creative,
        );
        let search = Arc::new(SearchEngine::new(
            store.clone(),
            embedder.clone(),
            reranker,
            expander,
            SearchSettings::from(&config),
        ));
        let reasoning = Arc::new(ReasoningLoop::new(
            chat,
            search.clone(),
            LoopSettings::from(&config),
        ));
        let ingestor = Arc::new(Ingestor::new(
            store.clone(),
            embedder,
            config.chunking.clone(),
        ));

        info!("Application components assembled");
        Self {
            store,
            search,
            reasoning,
            ingestor,
        }
    }

    pub fn store(&self) -> Arc<dyn KnowledgeStore> {
        self.store.clone()
    }

    pub fn search_engine(&self) -> Arc<SearchEngine> {
        self.search.clone()
    }

    pub fn reasoning_loop(&self) -> Arc<ReasoningLoop> {
        self.reasoning.clone()
    }

    pub fn ingestor(&self) -> Arc<Ingestor> {
        self.ingestor.clone()
    }
}

/// Refuse to pair a store with an embedder that produces vectors of a
/// different width than the store was created with.
pub fn ensure_compatible(store: &Db, embedder: &dyn Embedder) -> Result<()> {
    anyhow::ensure!(
        store.dimensions() == embedder.dimensions(),
        "knowledge store holds {}-dimensional vectors but the embedder produces {}",
        store.dimensions(),
        embedder.dimensions()
    );
    Ok(())
}
