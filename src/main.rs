//! MCP server binary entry point.

use anyhow::Result;
use cipher_mcp::{
    config::{ServerConfig, SessionConfigBuilder},
    protocol::McpServerBuilder,
    server::{McpHandler, ServerStateBuilder},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let session = SessionConfigBuilder::new().from_env()?.build();
    let config = ServerConfig::builder().session(session).build();

    let state = Arc::new(ServerStateBuilder::new().config(config).build()?);
    info!("Server state initialized with {} tools", state.tools.len());

    let server = McpServerBuilder::new()
        .handler(McpHandler::new(Arc::clone(&state)))
        .sessions(Arc::clone(&state.sessions))
        .name(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .with_tools()
        .with_logging()
        .build()?;

    info!("MCP server ready, waiting for connections...");
    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cipher_mcp=info,warn"));

    // Structured logs go to stderr; stdout carries only protocol traffic.
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .json()
        .init();
}
