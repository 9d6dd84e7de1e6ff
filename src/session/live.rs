use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::config::SessionConfig;
use super::session::{EventSender, SessionMode, TranscriptionSession};
use super::state::{RunningFlag, SessionState};
use crate::protocol::{status, ClientMessage, SessionEvent};

/// Transcription session backed by a WebSocket connection to the relay
pub struct LiveSession {
    inner: Arc<Inner>,
}

struct Inner {
    config: SessionConfig,

    /// Application-owned running flag
    running: RunningFlag,

    auto_reconnect: AtomicBool,

    /// Set by `close()`; suppresses reconnects until the next `connect()`
    manual_close: AtomicBool,

    /// Whether the end-of-audio marker was sent since the last chunk
    end_sent: AtomicBool,

    events: EventSender,

    shared: Mutex<Shared>,
}

struct Shared {
    state: SessionState,

    /// Outbound queue of the open connection, if any
    connection: Option<mpsc::UnboundedSender<Message>>,

    /// Task owning the socket and the reconnect timer
    driver: Option<JoinHandle<()>>,

    /// Bumped on every `connect()`; stale drivers stop touching state
    generation: u64,
}

impl LiveSession {
    pub fn new(config: SessionConfig, running: RunningFlag, events: EventSender) -> Self {
        let auto_reconnect = AtomicBool::new(config.auto_reconnect);

        Self {
            inner: Arc::new(Inner {
                config,
                running,
                auto_reconnect,
                manual_close: AtomicBool::new(false),
                end_sent: AtomicBool::new(false),
                events,
                shared: Mutex::new(Shared {
                    state: SessionState::Idle,
                    connection: None,
                    driver: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// Whether a connection is currently open
    pub fn is_connected(&self) -> bool {
        self.inner.shared.lock().connection.is_some()
    }
}

impl Inner {
    fn emit(&self, event: SessionEvent) {
        // Consumer may already be gone
        let _ = self.events.send(event);
    }

    fn should_reconnect(&self) -> bool {
        !self.manual_close.load(Ordering::SeqCst)
            && self.running.is_running()
            && self.auto_reconnect.load(Ordering::SeqCst)
    }

    fn set_state(&self, generation: u64, state: SessionState) {
        let mut shared = self.shared.lock();
        if shared.generation == generation && shared.state != SessionState::Closed {
            shared.state = state;
        }
    }

    /// Connect, serve, and reconnect until the policy says stop
    async fn drive(self: Arc<Self>, generation: u64) {
        loop {
            self.run_connection(generation).await;

            if !self.should_reconnect() {
                break;
            }

            self.set_state(generation, SessionState::Reconnecting);
            info!(
                "Scheduling reconnect to {} in {:?}",
                self.config.relay_url, self.config.reconnect_delay
            );
            sleep(self.config.reconnect_delay).await;

            // close() or a running=false may have landed during the delay
            if !self.should_reconnect() {
                break;
            }
            self.set_state(generation, SessionState::Connecting);
        }

        debug!("Session driver {} finished", generation);
    }

    /// One connection attempt and, if it succeeds, its whole lifetime
    async fn run_connection(&self, generation: u64) {
        let url = self.config.relay_url.as_str();
        info!("Connecting to relay at {}", url);

        let ws = match timeout(self.config.connect_timeout, connect_async(url)).await {
            Ok(Ok((ws, _))) => ws,
            Ok(Err(e)) => {
                warn!("Failed to connect to {}: {}", url, e);
                self.emit(SessionEvent::error(format!("WebSocket error: {}", e)));
                self.set_state(generation, SessionState::Disconnected);
                self.emit(SessionEvent::status(status::DISCONNECTED));
                return;
            }
            Err(_) => {
                warn!("Connecting to {} timed out", url);
                self.emit(SessionEvent::error("WebSocket connect timed out"));
                self.set_state(generation, SessionState::Disconnected);
                self.emit(SessionEvent::status(status::DISCONNECTED));
                return;
            }
        };

        let (mut sink, mut stream) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        {
            let mut shared = self.shared.lock();
            if shared.generation != generation || self.manual_close.load(Ordering::SeqCst) {
                debug!("Dropping connection superseded during handshake");
                return;
            }
            shared.connection = Some(tx);
            shared.state = SessionState::Connected;
        }
        self.end_sent.store(false, Ordering::SeqCst);

        info!("Connected to relay at {}", url);
        self.emit(SessionEvent::status(status::CONNECTED));

        loop {
            tokio::select! {
                outbound = rx.recv() => match outbound {
                    Some(message) => {
                        let closing = matches!(message, Message::Close(_));
                        if let Err(e) = sink.send(message).await {
                            warn!("WebSocket send failed: {}", e);
                            self.emit(SessionEvent::error("WebSocket error"));
                            break;
                        }
                        if closing {
                            break;
                        }
                    }
                    // Connection handle released by close()
                    None => break,
                },
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => self.dispatch(&text),
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Relay closed connection: {:?}", frame);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        self.emit(SessionEvent::error("WebSocket error"));
                        break;
                    }
                    None => break,
                },
            }
        }

        {
            let mut shared = self.shared.lock();
            if shared.generation == generation {
                shared.connection = None;
                if shared.state != SessionState::Closed {
                    shared.state = SessionState::Disconnected;
                }
            }
        }

        info!("Disconnected from relay");
        self.emit(SessionEvent::status(status::DISCONNECTED));
    }

    fn dispatch(&self, text: &str) {
        match serde_json::from_str::<SessionEvent>(text) {
            Ok(event) => self.emit(event),
            Err(e) => {
                warn!("Failed to parse relay message: {}", e);
                self.emit(SessionEvent::error("Bad message"));
            }
        }
    }

    fn send(&self, message: &ClientMessage) -> bool {
        let shared = self.shared.lock();
        let Some(tx) = shared.connection.as_ref() else {
            return false;
        };

        match serde_json::to_string(message) {
            Ok(json) => tx.send(Message::Text(json)).is_ok(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl TranscriptionSession for LiveSession {
    async fn connect(&self) {
        let inner = &self.inner;
        inner.manual_close.store(false, Ordering::SeqCst);

        let mut shared = inner.shared.lock();
        if let Some(driver) = shared.driver.take() {
            driver.abort();
        }
        shared.connection = None;
        shared.generation += 1;
        shared.state = SessionState::Connecting;

        let generation = shared.generation;
        let task_inner = Arc::clone(inner);
        shared.driver = Some(tokio::spawn(task_inner.drive(generation)));
    }

    async fn start(&self) {}

    async fn stop(&self) {
        if self.inner.end_sent.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.inner.send(&ClientMessage::AudioStreamEnd) {
            debug!("Not connected; end-of-audio marker skipped");
        }
    }

    fn send_audio_base64(&self, data: String) {
        if self.inner.send(&ClientMessage::Audio { base64: data }) {
            self.inner.end_sent.store(false, Ordering::SeqCst);
        }
    }

    async fn close(&self) {
        let inner = &self.inner;
        inner.manual_close.store(true, Ordering::SeqCst);

        let mut shared = inner.shared.lock();
        if shared.state == SessionState::Closed {
            return;
        }
        shared.state = SessionState::Closed;

        match shared.connection.take() {
            // The driver flushes the close frame and exits without reconnecting
            Some(tx) => {
                let _ = tx.send(Message::Close(None));
            }
            None => {
                if let Some(driver) = shared.driver.take() {
                    driver.abort();
                }
            }
        }

        info!("Session closed");
    }

    fn state(&self) -> SessionState {
        self.inner.shared.lock().state
    }

    fn set_auto_reconnect(&self, enabled: bool) {
        self.inner.auto_reconnect.store(enabled, Ordering::SeqCst);
    }

    fn mode(&self) -> SessionMode {
        SessionMode::Live
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        if let Some(driver) = self.inner.shared.lock().driver.take() {
            driver.abort();
        }
    }
}
