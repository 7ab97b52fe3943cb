//! Transport layer for MCP server.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use rmcp::transport::stdio;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::tower::{
    StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::ServiceExt;
use tracing::info;

use crate::config::TransportType;
use crate::engine::CommandEngine;
use crate::mcp::DevOpsServer;

/// Run the MCP server with stdio transport.
pub async fn run_stdio(server: DevOpsServer) -> Result<()> {
    info!(
        backend = server.engine().backend().name(),
        "Starting MCP server with stdio transport"
    );

    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    info!("MCP server shutting down");
    Ok(())
}

/// Run the MCP server with Streamable HTTP transport.
///
/// Every connection gets its own session over the shared engine.
pub async fn run_http(engine: Arc<CommandEngine>, port: u16) -> Result<()> {
    info!(
        backend = engine.backend().name(),
        "Starting MCP server with HTTP transport on port {}", port
    );

    let session_manager = Arc::new(LocalSessionManager::default());
    let factory_engine = engine.clone();
    let http_service = StreamableHttpService::new(
        move || Ok(DevOpsServer::new(factory_engine.clone())),
        session_manager,
        StreamableHttpServerConfig::default(),
    );

    let app = Router::new()
        .route("/health", axum::routing::get(health_check))
        .route("/", axum::routing::get(root_handler))
        .fallback_service(http_service);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("MCP server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    info!("MCP server shutting down");
    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn root_handler() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Azure DevOps command resolver MCP server",
        "endpoints": {
            "health": "/health"
        }
    }))
}

/// Run the MCP server with the configured transport.
pub async fn run_server(
    engine: Arc<CommandEngine>,
    transport: TransportType,
    port: u16,
) -> Result<()> {
    match transport {
        TransportType::Stdio => run_stdio(DevOpsServer::new(engine)).await,
        TransportType::Http => run_http(engine, port).await,
    }
}
