//! MCP tool server binary. Uses stdio transport for integration with AI
//! assistants; workflow state is read through the finops API server named
//! by `API_BASE_URL` (default `http://localhost:8080`).

use std::sync::Arc;

use anyhow::Result;

use finops_mcp::{FinOpsMcpServer, HttpQuerier};

#[tokio::main]
async fn main() -> Result<()> {
    // Stdout carries the MCP protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let base_url =
        std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
    tracing::info!(%base_url, "starting finops MCP server");

    let querier = Arc::new(HttpQuerier::new(base_url));
    FinOpsMcpServer::new(querier).run_stdio().await
}
