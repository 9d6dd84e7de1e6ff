use super::handlers;
use super::state::AppState;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Relay endpoint; clients connect to the bare host
        .route("/", get(handlers::relay_socket))
        .route("/ws", get(handlers::relay_socket))
        // Health check
        .route("/health", get(handlers::health_check))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
