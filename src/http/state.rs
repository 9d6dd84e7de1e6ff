use crate::relay::PairingConfig;
use crate::upstream::UpstreamConnector;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Opens one upstream session per client pairing
    pub connector: Arc<dyn UpstreamConnector>,

    /// Limits applied to every pairing
    pub pairing: PairingConfig,

    /// Number of live pairings (health reporting only)
    pub active_pairings: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(connector: Arc<dyn UpstreamConnector>, pairing: PairingConfig) -> Self {
        Self {
            connector,
            pairing,
            active_pairings: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn active_pairings(&self) -> usize {
        self.active_pairings.load(Ordering::SeqCst)
    }

    /// Count a pairing as live until the returned guard is dropped
    pub fn track_pairing(&self) -> PairingGuard {
        self.active_pairings.fetch_add(1, Ordering::SeqCst);
        PairingGuard(Arc::clone(&self.active_pairings))
    }
}

pub struct PairingGuard(Arc<AtomicUsize>);

impl Drop for PairingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
