//! HTTP surface: JSON API for generation, uploads and execution, plus the
//! embedded demo page. Concurrency comes from axum/tokio, one task per request.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod static_files;

use axum::Router;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::WebConfig;
use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let max_upload_bytes = state.config.web.max_upload_bytes;

    Router::new()
        .merge(routes::ui_routes())
        .merge(routes::api_routes(max_upload_bytes))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: WebConfig, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
