/// MCP Tool handlers for medrag.
///
/// 1. search          – expand, recall and rerank evidence for a query
/// 2. ask             – answer a question with the reasoning loop
/// 3. ingest_markdown – ingest a markdown file into the knowledge base
/// 4. list_documents  – list ingested source files
/// 5. delete_document – remove every chunk of a source file
/// 6. stats           – knowledge base statistics
///
/// All pipeline work is blocking (HTTP model calls, SQLite, ONNX) and runs
/// on the blocking thread pool.
use crate::agent::Session;
use crate::db::KnowledgeStore;
use crate::indexer::IngestOutcome;
use crate::mcp::server::McpContext;
use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, handler::server::tool::ToolRouter, model::*, tool, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

// ── Parameter structs ────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct SearchParams {
    /// Search query (symptoms, disease, drug, ...)
    query: String,
    /// Include expanded queries and per-chunk rerank scores in the logs (default: false)
    debug: Option<bool>,
}

#[derive(Deserialize, JsonSchema)]
struct AskParams {
    /// The user's question or case description
    question: String,
    /// Include search debug logs in the trace (default: false)
    debug: Option<bool>,
    /// Forget earlier questions before answering (default: false)
    reset_session: Option<bool>,
}

#[derive(Deserialize, JsonSchema)]
struct FilepathParam {
    /// Path to the markdown file
    filepath: String,
}

#[derive(Deserialize, JsonSchema)]
struct FilenameParam {
    /// Source filename as shown by list_documents
    filename: String,
}

// ── Response helpers ─────────────────────────────────────────────────

fn json_result(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]))
}

fn error_result(msg: &str) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg.to_string())]))
}

async fn run_blocking<T, F>(f: F) -> Result<T, McpError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| McpError::internal_error(format!("worker task failed: {e}"), None))
}

// ── Tool implementations ─────────────────────────────────────────────

#[derive(Clone)]
pub struct AppTools {
    pub ctx: McpContext,
    pub tool_router: ToolRouter<Self>,
}

impl ServerHandler for AppTools {}

#[tool_router]
impl AppTools {
    pub fn new(ctx: McpContext) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    // ── Tool 1: search ──────────────────────────────────────────────

    #[tool(
        description = "Search the medical knowledge base. Expands the query, recalls candidate passages and reranks them; returns the best passages with their source files."
    )]
    async fn search(&self, params: Parameters<SearchParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        if p.query.trim().is_empty() {
            return error_result("query is required");
        }

        let engine = self.ctx.app.search_engine();
        let debug = p.debug.unwrap_or(false);
        let result = run_blocking(move || engine.search(&p.query, debug)).await?;

        json_result(serde_json::json!({
            "text": result.text,
            "outcome": result.outcome,
            "logs": result.logs,
        }))
    }

    // ── Tool 2: ask ─────────────────────────────────────────────────

    #[tool(
        description = "Answer a medical question. The assistant consults the knowledge base as needed and remembers the last few exchanges of this session."
    )]
    async fn ask(&self, params: Parameters<AskParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        if p.question.trim().is_empty() {
            return error_result("question is required");
        }

        // Held for the whole answer so questions are handled in order. The
        // loop works on a copy; the stored history only changes on success.
        let mut guard = self.ctx.session.lock().await;
        let mut session = if p.reset_session.unwrap_or(false) {
            info!("Session reset by client");
            Session::new()
        } else {
            guard.clone()
        };

        let reasoning = self.ctx.app.reasoning_loop();
        let debug = p.debug.unwrap_or(false);
        let question = p.question;
        let (answer, session) = run_blocking(move || {
            let answer = reasoning.run(&mut session, &question, debug);
            (answer, session)
        })
        .await?;
        *guard = session;

        json_result(serde_json::json!({
            "answer": answer.text,
            "status": answer.status,
            "steps": answer.steps,
            "trace": answer.trace,
        }))
    }

    // ── Tool 3: ingest_markdown ─────────────────────────────────────

    #[tool(
        description = "Ingest a markdown file into the knowledge base. Files already ingested under the same name are skipped."
    )]
    async fn ingest_markdown(
        &self,
        params: Parameters<FilepathParam>,
    ) -> Result<CallToolResult, McpError> {
        let filepath = params.0.filepath;
        if filepath.is_empty() {
            return error_result("filepath is required");
        }

        let path = Path::new(&filepath);
        if !path.exists() {
            return error_result(&format!("file not found: {filepath}"));
        }
        let Some(filename) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return error_result(&format!("not a file: {filepath}"));
        };

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| McpError::internal_error(format!("read failed: {e}"), None))?;

        let ingestor = self.ctx.app.ingestor();
        let name = filename.clone();
        let outcome = run_blocking(move || ingestor.ingest(&content, &name))
            .await?
            .map_err(|e| McpError::internal_error(format!("ingestion failed: {e}"), None))?;

        let (success, message) = match outcome {
            IngestOutcome::Stored(n) => (true, format!("Stored {n} chunks from {filename}")),
            IngestOutcome::AlreadyExists => {
                (false, format!("{filename} is already in the knowledge base, skipped"))
            }
            IngestOutcome::EmptyDocument => (false, format!("{filename} is empty, nothing to ingest")),
        };

        json_result(serde_json::json!({
            "success": success,
            "message": message,
        }))
    }

    // ── Tool 4: list_documents ──────────────────────────────────────

    #[tool(description = "List the source files in the knowledge base")]
    async fn list_documents(&self) -> Result<CallToolResult, McpError> {
        let store = self.ctx.app.store();
        let (files, partial) =
            run_blocking(move || (store.list_source_files(), store.partial_sources())).await?;

        let mut documents: Vec<String> = files.into_iter().collect();
        documents.sort();
        let mut incomplete: Vec<String> = partial.into_iter().collect();
        incomplete.sort();

        json_result(serde_json::json!({
            "documents": documents,
            "partial": incomplete,
        }))
    }

    // ── Tool 5: delete_document ─────────────────────────────────────

    #[tool(description = "Delete every chunk of a source file from the knowledge base")]
    async fn delete_document(
        &self,
        params: Parameters<FilenameParam>,
    ) -> Result<CallToolResult, McpError> {
        let filename = params.0.filename;
        if filename.is_empty() {
            return error_result("filename is required");
        }

        let store = self.ctx.app.store();
        let name = filename.clone();
        let removed = run_blocking(move || store.delete_by_source(&name))
            .await?
            .map_err(|e| McpError::internal_error(format!("delete failed: {e}"), None))?;

        if removed == 0 {
            return error_result(&format!("no chunks found for {filename}"));
        }

        json_result(serde_json::json!({
            "success": true,
            "removed_chunks": removed,
        }))
    }

    // ── Tool 6: stats ───────────────────────────────────────────────

    #[tool(description = "Knowledge base statistics: chunk count, file count and file list")]
    async fn stats(&self) -> Result<CallToolResult, McpError> {
        let store = self.ctx.app.store();
        let stats = run_blocking(move || store.stats()).await?;

        json_result(serde_json::json!(stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;
    use crate::config::Config;
    use crate::db::Db;
    use crate::embedder::mock::MockEmbedder;
    use crate::llm::mock::ScriptedChat;
    use crate::llm::{ChatError, ChatModel, ConversationTurn};
    use crate::rerank::mock::MockReranker;
    use std::sync::Arc;

    struct PanickingChat;

    impl ChatModel for PanickingChat {
        fn chat(&self, _: &[ConversationTurn], _: f32) -> Result<ConversationTurn, ChatError> {
            panic!("model crashed");
        }
    }

    fn tools(chat: Arc<dyn ChatModel>) -> AppTools {
        let mut config = Config::default();
        config.embedding.dimensions = 8;
        let app = App::from_parts(
            config,
            Arc::new(Db::open_in_memory(8).unwrap()),
            Arc::new(MockEmbedder::new(8)),
            chat,
            Arc::new(MockReranker::default()),
        );
        AppTools::new(McpContext::new(app))
    }

    fn ask(question: &str, reset_session: bool) -> Parameters<AskParams> {
        Parameters(AskParams {
            question: question.to_string(),
            debug: None,
            reset_session: Some(reset_session),
        })
    }

    #[tokio::test]
    async fn test_ask_records_history() {
        let tools = tools(Arc::new(ScriptedChat::repeating(
            "Final Answer: Rest and fluids usually suffice.",
        )));

        let result = tools.ask(ask("How to treat a cold?", false)).await.unwrap();
        assert_ne!(result.is_error, Some(true));
        assert_eq!(tools.ctx.session.lock().await.len(), 2);

        tools.ask(ask("And a fever?", false)).await.unwrap();
        assert_eq!(tools.ctx.session.lock().await.len(), 4);

        tools.ask(ask("Start over", true)).await.unwrap();
        assert_eq!(tools.ctx.session.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_ask_keeps_history() {
        let tools = tools(Arc::new(PanickingChat));
        tools
            .ctx
            .session
            .lock()
            .await
            .record("Earlier question", "Earlier answer");

        assert!(tools.ask(ask("Crash now", false)).await.is_err());

        let session = tools.ctx.session.lock().await;
        assert_eq!(session.len(), 2);
        assert_eq!(session.turns()[0].content, "Earlier question");
    }
}
