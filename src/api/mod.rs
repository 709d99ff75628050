pub mod handlers;
pub mod routes;

use crate::config::TransportConfig;
use crate::endpoint::HubManager;
use crate::mcp::HubBridge;
use anyhow::Result;
use axum::Router;
use rmcp::ServiceExt;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Serve the hub as an MCP server over this process's stdin/stdout.
///
/// Every child connection is drained before returning, on success or failure.
pub async fn serve_stdio(manager: HubManager) -> Result<()> {
    let result = run_stdio(&manager).await;
    drain(&manager).await;
    result
}

async fn run_stdio(manager: &HubManager) -> Result<()> {
    let ct = CancellationToken::new();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let handshake =
        HubBridge::new(manager.clone()).serve_with_ct(rmcp::transport::stdio(), ct.clone());
    let service = tokio::select! {
        service = handshake => service?,
        _ = &mut shutdown => {
            ct.cancel();
            return Ok(());
        }
    };

    info!("Hub serving MCP over stdio");

    tokio::select! {
        quit = service.waiting() => {
            match quit {
                Ok(reason) => info!("Stdio session ended: {:?}", reason),
                Err(e) => error!("Stdio session task failed: {}", e),
            }
        }
        _ = &mut shutdown => {
            ct.cancel();
        }
    }

    Ok(())
}

/// Serve the hub over streamable HTTP at `/mcp`, next to `/health` and `/servers`.
///
/// Every child connection is drained before returning, including when the
/// listener cannot be bound.
pub async fn serve_http(manager: HubManager, transport: &TransportConfig) -> Result<()> {
    let result = run_http(&manager, transport).await;
    drain(&manager).await;
    result
}

async fn run_http(manager: &HubManager, transport: &TransportConfig) -> Result<()> {
    let addr = format!("{}:{}", transport.host, transport.port);
    let ct = CancellationToken::new();

    let app = build_router(manager.clone(), ct.child_token());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("HTTP server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("Server list: http://{}/servers", addr);
    info!("MCP endpoint: http://{}/mcp", addr);

    let shutdown_ct = ct.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_ct.cancel();
        })
        .await?;

    Ok(())
}

/// Management routes plus the MCP service, ready to serve
pub fn build_router(manager: HubManager, ct: CancellationToken) -> Router {
    let factory_manager = manager.clone();
    let mcp_service = StreamableHttpService::new(
        move || Ok(HubBridge::new(factory_manager.clone())),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            stateful_mode: true,
            sse_keep_alive: Some(Duration::from_secs(15)),
            sse_retry: Some(Duration::from_secs(3)),
            cancellation_token: ct,
        },
    );

    routes::hub_routes()
        .nest_service("/mcp", mcp_service)
        .layer(TraceLayer::new_for_http())
        .with_state(manager)
}

/// Best-effort close of every child connection
pub async fn drain(manager: &HubManager) {
    info!("Disconnecting all MCP servers...");
    if let Err(e) = manager.disconnect_all().await {
        error!("Error during shutdown: {}", e);
    }
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM signal, shutting down...");
        },
    }
}
