//! MCP server exposing `websum` as a single `fetch_url` tool over stdio.
//!
//! Configuration is read from the environment (and `.env`) once at startup
//! and validated before the transport is opened, so a misconfigured server
//! exits instead of failing every call.

use anyhow::Result;
use clap::Parser;
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars,
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use serde::Deserialize;
use tokio::io::{stdin, stdout};
use tokio_util::sync::CancellationToken;
use websum::config::Config;
use websum::controller::Controller;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "websum-mcp", version, about)]
struct Args {
    /// OpenAI-compatible API base URL (overrides BASE_URL)
    #[arg(long)]
    base_url: Option<String>,
}

/// Arguments of the `fetch_url` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct FetchUrlRequest {
    #[schemars(description = "The URL to fetch (http or https)")]
    url: String,
    #[schemars(
        description = "Optional: what the summary should focus on, used only when the page is too long to return in full"
    )]
    context: Option<String>,
}

#[derive(Clone)]
struct WebsumServer {
    tool_router: ToolRouter<Self>,
    controller: Controller,
}

#[tool_router]
impl WebsumServer {
    fn new(controller: Controller) -> Self {
        Self {
            tool_router: Self::tool_router(),
            controller,
        }
    }

    #[tool(
        description = "Fetches a webpage, converts it to markdown, and optionally summarizes it if the content exceeds the token limit."
    )]
    async fn fetch_url(
        &self,
        Parameters(req): Parameters<FetchUrlRequest>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        Ok(tool_result(self.fetch_text(req, &ctx.ct).await))
    }

    /// Run one request; a `notifications/cancelled` for it fires `cancel`.
    async fn fetch_text(
        &self,
        req: FetchUrlRequest,
        cancel: &CancellationToken,
    ) -> Result<String, String> {
        self.controller
            .process_with_cancel(&req.url, req.context.as_deref(), cancel)
            .await
            .map(|processed| processed.text)
            .map_err(|e| {
                tracing::warn!("fetch_url {} failed: {e}", req.url);
                e.user_message()
            })
    }
}

fn tool_result(result: Result<String, String>) -> CallToolResult {
    match result {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(message) => CallToolResult::error(vec![Content::text(message)]),
    }
}

#[tool_handler]
impl ServerHandler for WebsumServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Web fetch with budget-aware summarization. `fetch_url` returns the page as \
                 markdown when it fits the configured token limit, otherwise an LLM-written \
                 extraction, optionally focused by `context`."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let config = match &args.base_url {
        Some(base) => Config::from_lookup(|name| match name {
            "BASE_URL" => Some(base.clone()),
            other => std::env::var(other).ok(),
        }),
        None => Config::from_env(),
    }?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    // stdout carries the MCP transport; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("websum=info,websum_mcp=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args)?;
    tracing::info!(
        "Starting websum-mcp: model={}, endpoint={}, max_tokens={}, max_context={}",
        config.model_name,
        config.completions_url(),
        config.max_output_tokens,
        config.max_context_tokens
    );

    let controller = Controller::from_config(config)?;
    let service = WebsumServer::new(controller)
        .serve((stdin(), stdout()))
        .await?;
    service.waiting().await?;
    Ok(())
}
