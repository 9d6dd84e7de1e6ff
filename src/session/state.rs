use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Connection lifecycle of a transcription session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    /// Waiting out the reconnect delay
    Reconnecting,
    Closed,
}

/// Application-owned "running" flag shared with a session
///
/// Reconnects are only attempted while this is set.
#[derive(Debug, Clone, Default)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    pub fn new(running: bool) -> Self {
        Self(Arc::new(AtomicBool::new(running)))
    }

    pub fn set(&self, running: bool) {
        self.0.store(running, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
