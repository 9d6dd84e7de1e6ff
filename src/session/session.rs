use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::config::SessionConfig;
use super::live::LiveSession;
use super::mock::MockSession;
use super::state::{RunningFlag, SessionState};
use crate::protocol::SessionEvent;

/// Sender half of a session's event channel
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// A logical transcription connection
///
/// Events (status, transcripts, errors) are delivered in order on the channel
/// passed at construction. No method returns an error: transport failures
/// become events.
#[async_trait]
pub trait TranscriptionSession: Send + Sync {
    /// Open the connection (or reopen it after a disconnect)
    async fn connect(&self);

    /// Begin producing transcripts. Only meaningful for the mock session.
    async fn start(&self);

    /// Signal end of audio to the remote side. Best-effort and idempotent.
    async fn stop(&self);

    /// Send one base64 PCM chunk; dropped unless connected
    fn send_audio_base64(&self, data: String);

    /// Close for good, suppressing reconnects. Idempotent.
    async fn close(&self);

    fn state(&self) -> SessionState;

    fn set_auto_reconnect(&self, enabled: bool);

    fn mode(&self) -> SessionMode;
}

/// Which session implementation to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// WebSocket connection to the relay
    Live,
    /// Scripted transcripts, no network or audio hardware
    Mock,
}

/// Session factory
pub struct SessionFactory;

impl SessionFactory {
    pub fn create(
        mode: SessionMode,
        config: SessionConfig,
        running: RunningFlag,
        events: EventSender,
    ) -> Arc<dyn TranscriptionSession> {
        match mode {
            SessionMode::Live => Arc::new(LiveSession::new(config, running, events)),
            SessionMode::Mock => Arc::new(MockSession::new(config.mock_interval, events)),
        }
    }
}
