//! HTTP surface of the relay
//!
//! - GET / (WebSocket upgrade) - Relay a client to a new upstream session
//! - GET /ws (WebSocket upgrade) - Same as /
//! - GET /health - Health check with the number of live pairings

mod handlers;
mod routes;
mod state;

pub use handlers::HealthResponse;
pub use routes::create_router;
pub use state::{AppState, PairingGuard};
