use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::info;

use super::session::{EventSender, SessionMode, TranscriptionSession};
use super::state::SessionState;
use crate::protocol::{status, SessionEvent};

/// Lines emitted, in order and cyclically, by the mock session
pub const MOCK_SCRIPT: [&str; 3] = [
    "こんにちは。テスト用のモック文字起こしです。",
    "Gemini Live API の代わりに、この文章を定期的に追加します。",
    "開始と停止、コピー、保存などのUI動作を確認できます。",
];

/// Offline session producing scripted transcripts on a timer
pub struct MockSession {
    interval: Duration,
    events: EventSender,
    /// Position in the script; survives stop/start
    next_line: Arc<AtomicUsize>,
    inner: Mutex<MockState>,
}

struct MockState {
    state: SessionState,
    timer: Option<JoinHandle<()>>,
}

impl MockSession {
    pub fn new(interval: Duration, events: EventSender) -> Self {
        Self {
            interval,
            events,
            next_line: Arc::new(AtomicUsize::new(0)),
            inner: Mutex::new(MockState {
                state: SessionState::Idle,
                timer: None,
            }),
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Halt emission; returns whether a timer was running
    fn halt(&self) -> bool {
        match self.inner.lock().timer.take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl TranscriptionSession for MockSession {
    async fn connect(&self) {
        self.inner.lock().state = SessionState::Connected;
        self.emit(SessionEvent::status(status::CONNECTED));
    }

    async fn start(&self) {
        let mut inner = self.inner.lock();
        if inner.timer.is_some() || inner.state == SessionState::Closed {
            return;
        }

        let period = self.interval;
        let events = self.events.clone();
        let next_line = Arc::clone(&self.next_line);

        inner.timer = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let i = next_line.fetch_add(1, Ordering::SeqCst);
                let text = MOCK_SCRIPT[i % MOCK_SCRIPT.len()].to_string();
                if events.send(SessionEvent::Transcript { text }).is_err() {
                    break;
                }
            }
        }));

        info!("Mock transcription started ({:?} interval)", period);
    }

    async fn stop(&self) {
        if self.halt() {
            info!("Mock transcription stopped");
            self.emit(SessionEvent::status(status::STOPPED));
        }
    }

    fn send_audio_base64(&self, _data: String) {}

    async fn close(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Closed {
                return;
            }
            inner.state = SessionState::Closed;
        }

        self.stop().await;
        self.emit(SessionEvent::status(status::CLOSED));
    }

    fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    fn set_auto_reconnect(&self, _enabled: bool) {}

    fn mode(&self) -> SessionMode {
        SessionMode::Mock
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.halt();
    }
}
