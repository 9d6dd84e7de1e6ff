use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::http::{create_router, AppState};

/// Bind the relay and serve it in the background
///
/// Returns the bound address (useful with port 0) and the server task.
pub async fn spawn_relay(addr: &str, state: AppState) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind relay to {}", addr))?;
    let local_addr = listener.local_addr()?;

    info!("WS relay listening on ws://{}", local_addr);

    let router = create_router(state);
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("Relay server error: {}", e);
        }
    });

    Ok((local_addr, handle))
}
