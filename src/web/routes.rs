use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::static_files::static_handler;
use super::state::AppState;

// UI Routes - web interface
pub fn ui_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::ui::index_handler))
        .route("/static/{*path}", get(static_handler))
}

// API Routes - REST API for programmatic access
pub fn api_routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Generation only
            .route("/generate-sql", post(handlers::api::generate_sql))

            // Uploaded databases
            .route(
                "/databases",
                get(handlers::api::list_databases)
                    .post(handlers::api::upload_database)
                    .layer(DefaultBodyLimit::max(max_upload_bytes)),
            )
            .route("/databases/{id}/schema", get(handlers::api::database_schema))
            .route("/databases/{id}/query", post(handlers::api::query_database))

            // Default database
            .route("/schema", get(handlers::api::default_schema))
            .route("/query", post(handlers::api::query_default))

            // System status
            .route("/status", get(handlers::api::system_status)),
    )
}
