use super::state::AppState;
use crate::relay::run_pairing;
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{info, Instrument};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_pairings: usize,
}

/// GET / and GET /ws
/// Upgrade to a WebSocket and pair it with a fresh upstream session
pub async fn relay_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let pairing_id = uuid::Uuid::new_v4();

    ws.on_upgrade(move |socket| {
        let span = tracing::info_span!("pairing", id = %pairing_id);
        async move {
            let _guard = state.track_pairing();
            info!("Client connected ({} active)", state.active_pairings());
            run_pairing(socket, state.connector.clone(), state.pairing.clone()).await;
        }
        .instrument(span)
    })
}

/// GET /health
/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            active_pairings: state.active_pairings(),
        }),
    )
}
