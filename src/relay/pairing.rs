//! One client connection bridged to one upstream engine session

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::error::UpstreamError;
use crate::protocol::{status, ClientMessage, SessionEvent};
use crate::upstream::{RealtimeInput, UpstreamConnector, UpstreamEvent, UpstreamSession};

/// Per-pairing limits
#[derive(Debug, Clone)]
pub struct PairingConfig {
    /// Bound on opening the upstream session, handshake included
    pub upstream_open_timeout: Duration,

    /// Tear down when the upstream is silent for this long; `None` waits forever
    pub upstream_idle_timeout: Option<Duration>,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            upstream_open_timeout: Duration::from_secs(15),
            upstream_idle_timeout: None,
        }
    }
}

/// Why a pairing ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingEnd {
    ClientClosed,
    UpstreamClosed,
    UpstreamFailed,
    UpstreamOpenFailed,
    IdleTimeout,
}

enum Outbound {
    Event(SessionEvent),
    Close,
}

/// Best-effort sender towards the client
///
/// Sends after the client has gone are silently discarded.
#[derive(Clone)]
struct Downstream(mpsc::UnboundedSender<Outbound>);

impl Downstream {
    fn send(&self, event: SessionEvent) {
        let _ = self.0.send(Outbound::Event(event));
    }

    fn close(&self) {
        let _ = self.0.send(Outbound::Close);
    }
}

async fn write_client(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(outbound) = rx.recv().await {
        match outbound {
            Outbound::Event(event) => {
                if let Err(e) = sink.send(Message::Text(event.to_json())).await {
                    debug!("Client send failed, dropping further events: {}", e);
                    break;
                }
            }
            Outbound::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }

    let _ = sink.close().await;
}

fn parse_client(payload: &[u8]) -> Result<ClientMessage, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// Run a pairing to completion
///
/// Sends `client_connected`, opens the upstream session, announces
/// `gemini_connected`, then bridges both directions until either side ends.
/// The upstream session is always released before returning.
pub async fn run_pairing(
    socket: WebSocket,
    connector: Arc<dyn UpstreamConnector>,
    config: PairingConfig,
) -> PairingEnd {
    let (sink, mut client) = socket.split();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_client(sink, out_rx));
    let downstream = Downstream(out_tx);

    downstream.send(SessionEvent::status(status::CLIENT_CONNECTED));

    let (up_tx, mut up_rx) = mpsc::unbounded_channel();
    let opened = timeout(config.upstream_open_timeout, connector.connect(up_tx)).await;

    let mut upstream = match opened {
        Ok(Ok(session)) => session,
        Ok(Err(e)) => return open_failed(e, &downstream, writer).await,
        Err(_) => {
            let e = UpstreamError::Timeout(config.upstream_open_timeout);
            return open_failed(e, &downstream, writer).await;
        }
    };

    info!("Upstream session opened");
    downstream.send(SessionEvent::status(status::GEMINI_CONNECTED));

    let end = bridge(
        &mut client,
        upstream.as_mut(),
        &mut up_rx,
        &downstream,
        config.upstream_idle_timeout,
    )
    .await;

    upstream.close().await;
    if end != PairingEnd::ClientClosed {
        downstream.close();
    }
    drop(downstream);
    let _ = writer.await;

    info!("Pairing ended: {:?}", end);
    end
}

async fn open_failed(
    e: UpstreamError,
    downstream: &Downstream,
    writer: JoinHandle<()>,
) -> PairingEnd {
    error!("Failed to open upstream session: {}", e);
    downstream.send(SessionEvent::error(e.to_string()));
    downstream.close();
    let _ = writer.await;
    PairingEnd::UpstreamOpenFailed
}

async fn forward_upstream(
    upstream: &mut dyn UpstreamSession,
    input: RealtimeInput,
    downstream: &Downstream,
) -> bool {
    match upstream.send(input).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Upstream send failed: {}", e);
            downstream.send(SessionEvent::error(e.to_string()));
            false
        }
    }
}

async fn bridge(
    client: &mut SplitStream<WebSocket>,
    upstream: &mut dyn UpstreamSession,
    events: &mut mpsc::UnboundedReceiver<UpstreamEvent>,
    downstream: &Downstream,
    idle_timeout: Option<Duration>,
) -> PairingEnd {
    let mut last_upstream = Instant::now();
    let mut chunks = 0u64;

    loop {
        let deadline = idle_timeout.map(|limit| last_upstream + limit);
        let idle = async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            incoming = client.next() => {
                let payload = match incoming {
                    Some(Ok(Message::Text(text))) => text.into_bytes(),
                    Some(Ok(Message::Binary(bytes))) => bytes,
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Client disconnected after {} audio chunks", chunks);
                        return PairingEnd::ClientClosed;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("Client connection error: {}", e);
                        return PairingEnd::ClientClosed;
                    }
                };

                let input = match parse_client(&payload) {
                    Ok(ClientMessage::Audio { base64 }) => {
                        chunks += 1;
                        RealtimeInput::pcm_audio(base64)
                    }
                    Ok(ClientMessage::AudioStreamEnd) => {
                        debug!("Client signalled end of audio");
                        RealtimeInput::AudioStreamEnd
                    }
                    Err(e) => {
                        debug!("Ignoring malformed client message: {}", e);
                        downstream.send(SessionEvent::error("Invalid client message"));
                        continue;
                    }
                };

                if !forward_upstream(upstream, input, downstream).await {
                    return PairingEnd::UpstreamFailed;
                }
            }

            event = events.recv() => {
                last_upstream = Instant::now();
                match event {
                    Some(UpstreamEvent::Message { input_transcription, text }) => {
                        if let Some(text) = input_transcription {
                            downstream.send(SessionEvent::Transcript { text });
                        }
                        if let Some(text) = text {
                            downstream.send(SessionEvent::ModelText { text });
                        }
                    }
                    Some(UpstreamEvent::Error(message)) => {
                        warn!("Upstream error: {}", message);
                        downstream.send(SessionEvent::Error { message });
                    }
                    Some(UpstreamEvent::Closed(reason)) => {
                        info!("Upstream closed: {}", reason);
                        downstream.send(SessionEvent::Closed { reason });
                        return PairingEnd::UpstreamClosed;
                    }
                    None => {
                        downstream.send(SessionEvent::Closed { reason: "upstream ended".to_string() });
                        return PairingEnd::UpstreamClosed;
                    }
                }
            }

            _ = idle => {
                warn!("No upstream activity for {:?}", idle_timeout);
                downstream.send(SessionEvent::error("upstream idle timeout"));
                return PairingEnd::IdleTimeout;
            }
        }
    }
}
