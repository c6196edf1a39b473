//! repodex MCP server entry point.
//!
//! Boots the MCP server on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

use repodex_core::AppConfig;

mod handler;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let state = Arc::new(state::ServerState::load(config.clone()).await?);

    match state.target() {
        Ok(target) => {
            tracing::info!(
                target_repo = %target,
                authenticated = config.github_token.is_some(),
                "Starting repodex server on stdio transport"
            );

            // tools build the index on demand if warming fails
            let warm = Arc::clone(&state);
            tokio::spawn(async move {
                if let Err(e) = warm.ensure_index().await {
                    tracing::error!(error = %e, "initial index build failed");
                }
            });
        }
        Err(e) => tracing::warn!(error = %e, "Starting repodex server without a repository"),
    }

    let handler = handler::RepodexServer::new(state);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
