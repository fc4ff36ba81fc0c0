//! MCP server exposing Parallel research tools over stdio.
//!
//! Reads newline-delimited JSON-RPC from stdin and writes responses to
//! stdout. Logs go to stderr (and optionally `LOG_DIR`).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use parallel_research::mcp::McpServer;
use parallel_research::parallel::ParallelClient;
use parallel_research::task::TaskRegistry;
use parallel_research::tools::ToolRegistry;
use parallel_research::{logging, Config};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("Configuration error")?;
    let _log_guards =
        logging::init(config.log_dir.as_deref()).context("Failed to set up logging")?;

    tracing::info!(
        api_url = %config.api_url,
        default_processor = %config.default_processor,
        max_tasks = config.max_tasks,
        "Starting Parallel research MCP server"
    );

    let client = ParallelClient::with_base_url(
        config.api_key.clone(),
        &config.api_url,
        config.request_timeout,
    )
    .context("Failed to create Parallel client")?;
    let registry = Arc::new(TaskRegistry::new(Arc::new(client), config.registry_config()));

    let shutdown = CancellationToken::new();
    let cleanup = Arc::clone(&registry).start_cleanup_task(CLEANUP_INTERVAL, shutdown.clone());

    let server = Arc::new(McpServer::new(ToolRegistry::new(
        registry,
        config.tool_settings(),
    )));
    let result = server
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await;

    shutdown.cancel();
    let _ = cleanup.await;
    tracing::info!("Client disconnected, shutting down");

    result.context("stdio transport failed")?;
    Ok(())
}
