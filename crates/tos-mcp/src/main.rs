//! TOS MCP Server
//!
//! Model Context Protocol server for Volcengine TOS
//! Run with: TOS_REGION=cn-beijing TOS_ACCESS_KEY=xxx TOS_SECRET_KEY=xxx tos-mcp
//! or, hosted: TOS_DEPLOY_MODE=hosted MCP_TRANSPORT=streamable-http tos-mcp

use anyhow::Context;
use rmcp::service::ServiceExt;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use tos_core::{McpTransport, Settings};
use tos_mcp::TosService;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the protocol in stdio mode, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tos_mcp=info,tos_storage=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env().context(
        "Failed to load settings. Set TOS_REGION, and TOS_ACCESS_KEY/TOS_SECRET_KEY in local mode",
    )?;

    tracing::info!(
        deploy_mode = %settings.deploy_mode,
        transport = %settings.transport,
        region = %settings.region,
        endpoint = %settings.endpoint,
        max_object_size = settings.max_object_size,
        buckets = ?settings.buckets,
        "Starting TOS MCP server"
    );

    let transport = settings.transport;
    let bind_address = settings.bind_address.clone();
    let service = TosService::new(settings).context("Failed to create TOS service")?;

    match transport {
        McpTransport::Stdio => {
            let running = service.serve(stdio()).await.context("MCP transport failed")?;
            running.waiting().await.context("MCP server error")?;
        }
        McpTransport::StreamableHttp => serve_http(service, &bind_address).await?,
    }

    Ok(())
}

/// Serve MCP at `/mcp`. Each request's head (including its `authorization`
/// header) reaches the tools through the request context.
async fn serve_http(service: TosService, bind_address: &str) -> anyhow::Result<()> {
    let mcp = StreamableHttpService::new(
        move || Ok(service.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    let app = axum::Router::new().nest_service("/mcp", mcp);

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!(addr = %bind_address, "Serving MCP over streamable HTTP");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
