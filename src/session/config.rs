use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a client transcription session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Relay WebSocket URL
    pub relay_url: String,

    /// Reconnect after an unsolicited disconnect while running
    pub auto_reconnect: bool,

    /// Delay before a reconnection attempt
    /// Default: 700ms
    pub reconnect_delay: Duration,

    /// Upper bound on the WebSocket handshake
    pub connect_timeout: Duration,

    /// Interval between scripted transcripts in mock mode
    /// Default: 700ms
    pub mock_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://localhost:8787".to_string(),
            auto_reconnect: true,
            reconnect_delay: Duration::from_millis(700),
            connect_timeout: Duration::from_secs(10),
            mock_interval: Duration::from_millis(700),
        }
    }
}
