/// Stdio MCP server for the medical assistant.
///
/// `McpContext` carries the assembled services plus the client's
/// conversation; `McpServer` wires the tool router onto stdio.
use crate::mcp::tools::AppTools;
use anyhow::{Context, Result};
use rmcp::{ServiceExt, handler::server::router::Router, transport::io::stdio};
use std::sync::Arc;
use tracing::info;

use crate::{agent::Session, app::App};
use tokio::sync::Mutex as TokioMutex;

/// State shared by every tool handler.
#[derive(Clone)]
pub struct McpContext {
    pub app: App,
    /// Conversation of the connected client; one stdio client per server.
    pub session: Arc<TokioMutex<Session>>,
}

impl McpContext {
    pub fn new(app: App) -> Self {
        Self {
            app,
            session: Arc::new(TokioMutex::new(Session::new())),
        }
    }
}

/// Serves [`AppTools`] over stdin/stdout.
#[derive(Clone)]
pub struct McpServer {
    pub ctx: McpContext,
}

impl McpServer {
    pub fn new(ctx: McpContext) -> Self {
        Self { ctx }
    }

    /// Serve until the client disconnects.
    pub async fn start(self) -> Result<()> {
        info!("Starting MCP server on stdio...");
        let (stdin, stdout) = stdio();

        let app_tools = AppTools::new(self.ctx.clone());
        let router = Router::new(app_tools.clone()).with_tools(app_tools.tool_router.clone());

        let service = router
            .serve((stdin, stdout))
            .await
            .context("failed to start MCP session on stdio")?;
        service
            .waiting()
            .await
            .context("MCP Server terminated abnormally")?;

        info!("MCP client disconnected");
        Ok(())
    }
}
