use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::connector::{
    RealtimeInput, UpstreamConnector, UpstreamEvent, UpstreamEventSender, UpstreamSession,
};
use super::messages::{Blob, RealtimeInputMessage, RealtimeInputPayload, ServerMessage, SetupMessage};
use crate::error::UpstreamError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Opens Gemini Live API sessions over WebSocket
#[derive(Debug, Clone)]
pub struct GeminiLiveConnector {
    endpoint: String,
    api_key: String,
    model: String,
}

impl GeminiLiveConnector {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn url(&self) -> String {
        if self.api_key.is_empty() {
            self.endpoint.clone()
        } else {
            format!("{}?key={}", self.endpoint, urlencoding::encode(&self.api_key))
        }
    }
}

fn parse_frame(message: &Message) -> Option<Result<ServerMessage, serde_json::Error>> {
    match message {
        Message::Text(text) => Some(serde_json::from_str(text)),
        Message::Binary(bytes) => Some(serde_json::from_slice(bytes)),
        _ => None,
    }
}

/// Wait for `setupComplete`, the end of the session handshake
async fn await_setup(stream: &mut SplitStream<WsStream>) -> Result<(), UpstreamError> {
    while let Some(frame) = stream.next().await {
        let frame = frame.map_err(|e| UpstreamError::Handshake(e.to_string()))?;

        if let Message::Close(close) = &frame {
            let reason = close
                .as_ref()
                .map(|c| c.reason.to_string())
                .unwrap_or_else(|| "closed during setup".to_string());
            return Err(UpstreamError::Handshake(reason));
        }

        match parse_frame(&frame) {
            Some(Ok(msg)) if msg.setup_complete.is_some() => return Ok(()),
            Some(Ok(_)) => debug!("Ignoring pre-setup message"),
            Some(Err(e)) => return Err(UpstreamError::Handshake(format!("bad setup reply: {}", e))),
            None => {}
        }
    }

    Err(UpstreamError::Handshake("connection closed during setup".to_string()))
}

/// Translate server frames into events until the connection ends
async fn read_events(mut stream: SplitStream<WsStream>, events: UpstreamEventSender) {
    let mut reason = "closed".to_string();

    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Upstream connection error: {}", e);
                let _ = events.send(UpstreamEvent::Error(e.to_string()));
                reason = "connection lost".to_string();
                break;
            }
        };

        if let Message::Close(close) = &frame {
            if let Some(close) = close {
                if !close.reason.is_empty() {
                    reason = close.reason.to_string();
                }
            }
            break;
        }

        match parse_frame(&frame) {
            Some(Ok(msg)) => {
                if msg.go_away.is_some() {
                    info!("Upstream announced it is going away");
                }

                let input_transcription = msg.input_transcription();
                let text = msg.text();
                if input_transcription.is_some() || text.is_some() {
                    let _ = events.send(UpstreamEvent::Message {
                        input_transcription,
                        text,
                    });
                }
            }
            Some(Err(e)) => {
                warn!("Failed to parse upstream message: {}", e);
                let _ = events.send(UpstreamEvent::Error(format!("Bad upstream message: {}", e)));
            }
            None => {}
        }
    }

    info!("Upstream session ended: {}", reason);
    let _ = events.send(UpstreamEvent::Closed(reason));
}

#[async_trait]
impl UpstreamConnector for GeminiLiveConnector {
    async fn connect(
        &self,
        events: UpstreamEventSender,
    ) -> Result<Box<dyn UpstreamSession>, UpstreamError> {
        info!("Opening upstream session (model {})", self.model);

        let (ws, _) = connect_async(self.url())
            .await
            .map_err(|e| UpstreamError::Open(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let setup = serde_json::to_string(&SetupMessage::text_with_transcription(&self.model))
            .map_err(|e| UpstreamError::Open(e.to_string()))?;
        sink.send(Message::Text(setup))
            .await
            .map_err(|e| UpstreamError::Open(e.to_string()))?;

        await_setup(&mut stream).await?;
        info!("Upstream session ready");

        let reader = tokio::spawn(read_events(stream, events));

        Ok(Box::new(GeminiLiveSession {
            sink,
            reader,
            closed: false,
        }))
    }
}

/// An open Live API session
pub struct GeminiLiveSession {
    sink: SplitSink<WsStream, Message>,
    reader: JoinHandle<()>,
    closed: bool,
}

impl GeminiLiveSession {
    fn encode(input: RealtimeInput) -> RealtimeInputMessage {
        let payload = match input {
            RealtimeInput::Audio { data, mime_type } => RealtimeInputPayload {
                audio: Some(Blob { data, mime_type }),
                ..Default::default()
            },
            RealtimeInput::AudioStreamEnd => RealtimeInputPayload {
                audio_stream_end: Some(true),
                ..Default::default()
            },
        };

        RealtimeInputMessage {
            realtime_input: payload,
        }
    }
}

#[async_trait]
impl UpstreamSession for GeminiLiveSession {
    async fn send(&mut self, input: RealtimeInput) -> Result<(), UpstreamError> {
        if self.closed {
            return Err(UpstreamError::Closed);
        }

        let json = serde_json::to_string(&Self::encode(input))
            .map_err(|e| UpstreamError::Send(e.to_string()))?;
        self.sink
            .send(Message::Text(json))
            .await
            .map_err(|e| UpstreamError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
        self.reader.abort();
        debug!("Upstream session released");
    }
}

impl Drop for GeminiLiveSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_input_shape() {
        let msg = GeminiLiveSession::encode(RealtimeInput::pcm_audio("AAA=".into()));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["realtimeInput"]["audio"]["data"], "AAA=");
        assert_eq!(json["realtimeInput"]["audio"]["mimeType"], "audio/pcm;rate=16000");
        assert!(json["realtimeInput"].get("audioStreamEnd").is_none());
    }

    #[test]
    fn test_stream_end_shape() {
        let msg = GeminiLiveSession::encode(RealtimeInput::AudioStreamEnd);
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"realtimeInput":{"audioStreamEnd":true}}"#);
    }

    #[test]
    fn test_url_carries_key() {
        let connector = GeminiLiveConnector::new("wss://example.test/live", "k123", "m");
        assert_eq!(connector.url(), "wss://example.test/live?key=k123");
    }

    #[test]
    fn test_url_escapes_key() {
        let connector = GeminiLiveConnector::new("wss://example.test/live", "a+b/c=&d", "m");
        assert_eq!(connector.url(), "wss://example.test/live?key=a%2Bb%2Fc%3D%26d");
    }
}
