use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::audio::PCM_MIME_TYPE;
use crate::error::UpstreamError;

/// Input forwarded to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeInput {
    Audio { data: String, mime_type: String },
    AudioStreamEnd,
}

impl RealtimeInput {
    /// A base64 chunk of 16kHz PCM
    pub fn pcm_audio(data: String) -> Self {
        RealtimeInput::Audio {
            data,
            mime_type: PCM_MIME_TYPE.to_string(),
        }
    }
}

/// Callback-equivalent events raised by an upstream session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// Server content; either field may be absent
    Message {
        input_transcription: Option<String>,
        text: Option<String>,
    },
    Error(String),
    /// The session is gone; nothing further will arrive
    Closed(String),
}

pub type UpstreamEventSender = mpsc::UnboundedSender<UpstreamEvent>;

/// Opens engine sessions. One call per client pairing.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    /// Open a session and complete its handshake
    ///
    /// Events for the session are delivered on `events` in arrival order.
    async fn connect(
        &self,
        events: UpstreamEventSender,
    ) -> Result<Box<dyn UpstreamSession>, UpstreamError>;
}

#[async_trait]
pub trait UpstreamSession: Send {
    async fn send(&mut self, input: RealtimeInput) -> Result<(), UpstreamError>;

    /// Release the session. Safe to call more than once.
    async fn close(&mut self);
}
