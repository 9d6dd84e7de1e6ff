//! Client ↔ relay wire protocol (JSON over WebSocket)
//!
//! The same `SessionEvent` vocabulary is used on the relay → client wire and
//! between a client session and the application consuming it.

use serde::{Deserialize, Serialize};

/// Status values carried by `SessionEvent::Status`
pub mod status {
    pub const CLIENT_CONNECTED: &str = "client_connected";
    pub const GEMINI_CONNECTED: &str = "gemini_connected";
    pub const CONNECTED: &str = "connected";
    pub const DISCONNECTED: &str = "disconnected";
    pub const STOPPED: &str = "stopped";
    pub const CLOSED: &str = "closed";
}

/// Message sent by a client to the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// One base64-encoded chunk of 16-bit LE PCM at 16kHz mono
    #[serde(rename = "audio")]
    Audio { base64: String },

    /// No further audio for this segment
    #[serde(rename = "audioStreamEnd")]
    AudioStreamEnd,
}

/// Event delivered from the relay to a client, and from a session to its consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Status { status: String },
    /// Finalized transcript segment
    Transcript { text: String },
    /// Non-final transcript, subject to revision
    Interim { text: String },
    Error { message: String },
    Closed { reason: String },
    /// Auxiliary model output
    ModelText { text: String },
}

impl SessionEvent {
    pub fn status(status: impl Into<String>) -> Self {
        SessionEvent::Status {
            status: status.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        SessionEvent::Error {
            message: message.into(),
        }
    }

    pub fn is_status(&self, expected: &str) -> bool {
        matches!(self, SessionEvent::Status { status } if status == expected)
    }

    pub fn to_json(&self) -> String {
        // Every variant is plain strings; serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_helper() {
        let event = SessionEvent::status(status::CONNECTED);
        assert!(event.is_status("connected"));
        assert!(!event.is_status("disconnected"));
    }

    #[test]
    fn test_model_text_tag() {
        let json = SessionEvent::ModelText { text: "hi".into() }.to_json();
        assert_eq!(json, r#"{"type":"model_text","text":"hi"}"#);
    }
}
