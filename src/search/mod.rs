//! Search orchestration: query expansion, multi-query recall, cross-encoder
//! rerank and threshold filtering, producing evidence text for the
//! reasoning loop.

pub mod expander;
pub mod recall;

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::config::Config;
use crate::db::KnowledgeStore;
use crate::embedder::Embedder;
use crate::rerank::{self, Reranker};

pub use expander::QueryExpander;
pub use recall::multi_recall;

pub const NO_EVIDENCE_TEXT: &str = "No relevant material found.";
pub const LOW_RELEVANCE_TEXT: &str = "Material relevance too low; suggest adding detail.";
pub const EVIDENCE_SEPARATOR: &str = "\n---\n";
pub const UNKNOWN_SOURCE: &str = "unknown source";

const PREVIEW_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SearchOutcome {
    Evidence { count: usize },
    NoEvidence,
    BelowThreshold,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub text: String,
    pub logs: Vec<String>,
    pub outcome: SearchOutcome,
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub expansion_count: usize,
    pub recall_top_n: usize,
    pub top_k: usize,
    pub threshold: f32,
}

impl From<&Config> for SearchSettings {
    fn from(config: &Config) -> Self {
        Self {
            expansion_count: config.search.multi_query_count,
            recall_top_n: config.search.recall_top_n,
            top_k: config.reranker.top_k,
            threshold: config.reranker.threshold,
        }
    }
}

pub struct SearchEngine {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
    expander: QueryExpander,
    settings: SearchSettings,
}

impl SearchEngine {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
        expander: QueryExpander,
        settings: SearchSettings,
    ) -> Self {
        info!("Search engine initialized");
        Self {
            store,
            embedder,
            reranker,
            expander,
            settings,
        }
    }

    /// Run the full pipeline for `query`.
    ///
    /// Never fails: empty recall, low relevance and rerank errors all come
    /// back as explanatory text.
    pub fn search(&self, query: &str, debug: bool) -> SearchResult {
        let mut logs = vec![format!("Original query: {query}")];

        let queries = self.expander.expand(query, self.settings.expansion_count);
        if debug {
            logs.push(format!("Expanded queries: {queries:?}"));
        }

        let (chunks, recall_logs) = multi_recall(
            self.store.as_ref(),
            self.embedder.as_ref(),
            &queries,
            self.settings.recall_top_n,
        );
        logs.extend(recall_logs);

        if chunks.is_empty() {
            info!("No relevant material found for '{query}'");
            return SearchResult {
                text: NO_EVIDENCE_TEXT.to_string(),
                logs,
                outcome: SearchOutcome::NoEvidence,
            };
        }

        logs.push(format!("Recalled {} unique chunks, reranking...", chunks.len()));

        // Rerank against the original query, not the variants
        let scored = match rerank::rerank(self.reranker.as_ref(), query, chunks) {
            Ok(scored) => scored,
            Err(e) => {
                error!("Search failed: {e}");
                logs.push(e.to_string());
                return SearchResult {
                    text: format!("Search failed: {e}"),
                    logs,
                    outcome: SearchOutcome::Failed,
                };
            }
        };

        let mut evidence = Vec::new();
        for item in &scored {
            let source = item.chunk.source.as_deref().unwrap_or(UNKNOWN_SOURCE);

            if debug {
                let preview: String = item
                    .chunk
                    .text
                    .chars()
                    .take(PREVIEW_CHARS)
                    .collect::<String>()
                    .replace('\n', " ");
                logs.push(format!("[{:.2}] {source}: {preview}...", item.score));
            }

            if evidence.len() < self.settings.top_k && item.score > self.settings.threshold {
                evidence.push(format!("{}\n[Source: {source}]", item.chunk.text));
            }
        }

        if evidence.is_empty() {
            info!("Material relevance too low for '{query}'");
            return SearchResult {
                text: LOW_RELEVANCE_TEXT.to_string(),
                logs,
                outcome: SearchOutcome::BelowThreshold,
            };
        }

        info!("Search complete: {} passages returned", evidence.len());
        SearchResult {
            text: evidence.join(EVIDENCE_SEPARATOR),
            logs,
            outcome: SearchOutcome::Evidence {
                count: evidence.len(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ChunkMetadata, Db, NewChunk, RecalledChunk, StoreError, StoreStats};
    use crate::embedder::mock::MockEmbedder;
    use crate::llm::mock::ScriptedChat;
    use crate::rerank::mock::MockReranker;
    use std::collections::HashSet;

    fn settings() -> SearchSettings {
        SearchSettings {
            expansion_count: 3,
            recall_top_n: 5,
            top_k: 3,
            threshold: -10.0,
        }
    }

    fn engine(
        store: Arc<dyn KnowledgeStore>,
        embedder: Arc<MockEmbedder>,
        reranker: MockReranker,
        expansion: &str,
    ) -> SearchEngine {
        let chat = Arc::new(ScriptedChat::repeating(expansion));
        SearchEngine::new(
            store,
            embedder,
            Arc::new(reranker),
            QueryExpander::new(chat, "{count} terms for {query}".to_string(), 0.7),
            settings(),
        )
    }

    fn seeded(embedder: &MockEmbedder, docs: &[(&str, &str)]) -> Arc<Db> {
        let db = Db::open_in_memory(embedder.dimensions).unwrap();
        let batch: Vec<NewChunk> = docs
            .iter()
            .enumerate()
            .map(|(i, (source, text))| NewChunk {
                id: format!("chunk-{i}"),
                embedding: embedder.embed(text).unwrap(),
                text: text.to_string(),
                metadata: ChunkMetadata {
                    source: source.to_string(),
                    chunk_index: i,
                },
            })
            .collect();
        db.add_chunks(&batch).unwrap();
        Arc::new(db)
    }

    #[test]
    fn test_empty_store_reports_no_evidence() {
        let embedder = Arc::new(MockEmbedder::new(16));
        let store = Arc::new(Db::open_in_memory(16).unwrap());
        let engine = engine(store, embedder, MockReranker::default(), "pyrexia");

        let result = engine.search("fever", false);
        assert_eq!(result.text, NO_EVIDENCE_TEXT);
        assert_eq!(result.outcome, SearchOutcome::NoEvidence);
        assert_eq!(result.logs[0], "Original query: fever");
    }

    #[test]
    fn test_threshold_and_top_k() {
        let embedder = Arc::new(MockEmbedder::new(16));
        let store = seeded(
            &embedder,
            &[
                ("a.md", "alpha fever"),
                ("a.md", "beta fever"),
                ("b.md", "gamma fever"),
                ("b.md", "delta fever"),
                ("c.md", "epsilon noise"),
            ],
        );
        let reranker = MockReranker::new(-10.0)
            .with_score("alpha", 5.0)
            .with_score("beta", 3.0)
            .with_score("gamma", 1.0)
            .with_score("delta", 0.5);
        let engine = engine(store, embedder, reranker, "x");

        let result = engine.search("fever", false);
        let parts: Vec<&str> = result.text.split(EVIDENCE_SEPARATOR).collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "alpha fever\n[Source: a.md]");
        assert_eq!(parts[1], "beta fever\n[Source: a.md]");
        assert_eq!(parts[2], "gamma fever\n[Source: b.md]");
        assert_eq!(result.outcome, SearchOutcome::Evidence { count: 3 });
        assert!(!result.text.contains("epsilon"));
    }

    #[test]
    fn test_scores_at_threshold_excluded() {
        let embedder = Arc::new(MockEmbedder::new(16));
        let store = seeded(&embedder, &[("a.md", "fever notes"), ("a.md", "cough notes")]);
        let engine = engine(store, embedder, MockReranker::new(-10.0), "x");

        let result = engine.search("fever", false);
        assert_eq!(result.text, LOW_RELEVANCE_TEXT);
        assert_eq!(result.outcome, SearchOutcome::BelowThreshold);
    }

    #[test]
    fn test_debug_logs() {
        let embedder = Arc::new(MockEmbedder::new(16));
        let store = seeded(&embedder, &[("a.md", "Fever is\na raised body temperature")]);
        let engine = engine(store, embedder, MockReranker::new(1.234), "pyrexia");

        let result = engine.search("fever", true);
        assert_eq!(result.logs[0], "Original query: fever");
        assert_eq!(result.logs[1], r#"Expanded queries: ["fever", "pyrexia"]"#);
        assert_eq!(result.logs[2], "Recalled 1 unique chunks, reranking...");
        assert_eq!(result.logs[3], "[1.23] a.md: Fever is a raised bo...");
    }

    #[test]
    fn test_quiet_mode_omits_debug_lines() {
        let embedder = Arc::new(MockEmbedder::new(16));
        let store = seeded(&embedder, &[("a.md", "fever text")]);
        let engine = engine(store, embedder, MockReranker::new(1.0), "pyrexia");

        let result = engine.search("fever", false);
        assert_eq!(
            result.logs,
            vec![
                "Original query: fever".to_string(),
                "Recalled 1 unique chunks, reranking...".to_string(),
            ]
        );
    }

    #[test]
    fn test_rerank_failure_degrades() {
        let embedder = Arc::new(MockEmbedder::new(16));
        let store = seeded(&embedder, &[("a.md", "fever text")]);
        let engine = engine(store, embedder, MockReranker::failing(), "x");

        let result = engine.search("fever", false);
        assert!(result.text.starts_with("Search failed: "));
        assert_eq!(result.outcome, SearchOutcome::Failed);
        assert!(result.logs.last().unwrap().contains("mock reranker offline"));
    }

    struct AnonymousStore;

    impl KnowledgeStore for AnonymousStore {
        fn list_source_files(&self) -> HashSet<String> {
            HashSet::new()
        }
        fn delete_by_source(&self, _source: &str) -> Result<usize, StoreError> {
            Ok(0)
        }
        fn add_chunks(&self, _batch: &[NewChunk]) -> Result<(), StoreError> {
            Ok(())
        }
        fn query_by_vector(&self, _embedding: &[f32], _top_n: usize) -> Vec<RecalledChunk> {
            vec![RecalledChunk {
                text: "orphan passage".to_string(),
                source: None,
                chunk_index: None,
                distance: 0.1,
            }]
        }
        fn begin_ingest(&self, _source: &str) -> Result<(), StoreError> {
            Ok(())
        }
        fn finish_ingest(&self, _source: &str) -> Result<(), StoreError> {
            Ok(())
        }
        fn partial_sources(&self) -> HashSet<String> {
            HashSet::new()
        }
        fn stats(&self) -> StoreStats {
            StoreStats::default()
        }
    }

    #[test]
    fn test_missing_source_label() {
        let embedder = Arc::new(MockEmbedder::new(16));
        let engine = engine(
            Arc::new(AnonymousStore),
            embedder,
            MockReranker::new(0.0),
            "x",
        );
        let result = engine.search("q", false);
        assert_eq!(result.text, "orphan passage\n[Source: unknown source]");
    }
}
