use thiserror::Error;

/// Failures surfaced when starting audio capture.
///
/// These are the only errors returned to the caller of a capture start;
/// everything on the transport side is reported as a session event instead.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Input access was refused by the OS or the user
    #[error("input permission denied: {0}")]
    Permission(String),

    /// No usable input device, or the stream could not be built
    #[error("audio device unavailable: {0}")]
    Device(String),
}

impl CaptureError {
    pub fn is_permission(&self) -> bool {
        matches!(self, CaptureError::Permission(_))
    }
}

/// Failures talking to the upstream transcription engine.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("failed to open upstream session: {0}")]
    Open(String),

    #[error("upstream handshake failed: {0}")]
    Handshake(String),

    #[error("upstream did not respond within {0:?}")]
    Timeout(std::time::Duration),

    #[error("upstream session closed")]
    Closed,

    #[error("upstream send failed: {0}")]
    Send(String),
}
