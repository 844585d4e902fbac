// ABOUTME: Liveness HTTP endpoint for the relay process
// ABOUTME: Serves GET /_health and GET / with a plain "OK" until shutdown is requested

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

async fn ok() -> &'static str {
    "OK"
}

/// Router answering the health probes
pub fn router() -> Router {
    Router::new()
        .route("/_health", get(ok))
        .route("/", get(ok))
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve the health router until `shutdown` is cancelled
pub async fn serve(addr: String, shutdown: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind health server to {}", addr))?;
    tracing::info!(addr = %addr, "Starting health server");

    axum::serve(listener, router())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Health server failed")?;

    tracing::info!("Health server stopped");
    Ok(())
}
