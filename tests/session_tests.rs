// Integration tests for client transcription sessions
//
// Live sessions run against a throwaway WebSocket server on localhost; the
// mock session runs with a short interval.

use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use streamscribe::protocol::status;
use streamscribe::session::{LiveSession, MOCK_SCRIPT};
use streamscribe::{
    ClientMessage, RunningFlag, SessionConfig, SessionEvent, SessionFactory, SessionMode,
    SessionState, TranscriptionSession,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Clone, Copy)]
enum Behavior {
    /// Record client messages until the client goes away
    Hold,
    /// Complete the handshake, then close straight away
    CloseImmediately,
    /// Send a frame that is not valid JSON, then hold
    SendGarbage,
    /// Close the first connection, hold every later one
    CloseFirst,
}

struct TestRelay {
    url: String,
    connections: Arc<AtomicUsize>,
    received: mpsc::UnboundedReceiver<String>,
}

impl TestRelay {
    fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    async fn next_message(&mut self) -> ClientMessage {
        let text = timeout(Duration::from_secs(5), self.received.recv())
            .await
            .expect("no message reached the relay")
            .expect("relay stopped");
        serde_json::from_str(&text).unwrap()
    }
}

async fn spawn_test_relay(behavior: Behavior) -> TestRelay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let (tx, received) = mpsc::unbounded_channel();

    let counter = connections.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let Ok(mut ws) = accept_async(stream).await else {
                continue;
            };
            let index = counter.fetch_add(1, Ordering::SeqCst);
            let tx = tx.clone();

            tokio::spawn(async move {
                match behavior {
                    Behavior::CloseFirst if index == 0 => {
                        let _ = ws.close(None).await;
                        return;
                    }
                    Behavior::CloseImmediately => {
                        let _ = ws.close(None).await;
                        return;
                    }
                    Behavior::SendGarbage => {
                        let _ = ws.send(Message::Text("not json".into())).await;
                    }
                    Behavior::Hold | Behavior::CloseFirst => {}
                }

                while let Some(Ok(message)) = ws.next().await {
                    if let Message::Text(text) = message {
                        let _ = tx.send(text);
                    }
                }
            });
        }
    });

    TestRelay {
        url: format!("ws://{}", addr),
        connections,
        received,
    }
}

fn live_config(url: &str) -> SessionConfig {
    SessionConfig {
        relay_url: url.to_string(),
        reconnect_delay: Duration::from_millis(100),
        connect_timeout: Duration::from_secs(2),
        ..SessionConfig::default()
    }
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("event channel closed")
}

/// Skip events until one matches
async fn wait_for(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    matches: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    loop {
        let event = next_event(events).await;
        if matches(&event) {
            return event;
        }
    }
}

async fn wait_for_status(events: &mut mpsc::UnboundedReceiver<SessionEvent>, expected: &str) {
    wait_for(events, |e| e.is_status(expected)).await;
}

#[tokio::test]
async fn test_live_connect_reports_connected() {
    let relay = spawn_test_relay(Behavior::Hold).await;
    let (tx, mut events) = mpsc::unbounded_channel();
    let session = LiveSession::new(live_config(&relay.url), RunningFlag::new(true), tx);

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.mode(), SessionMode::Live);

    session.connect().await;
    let event = next_event(&mut events).await;

    assert!(event.is_status(status::CONNECTED));
    assert_eq!(session.state(), SessionState::Connected);
    assert!(session.is_connected());

    session.close().await;
}

#[tokio::test]
async fn test_audio_and_end_marker_reach_relay() {
    let mut relay = spawn_test_relay(Behavior::Hold).await;
    let (tx, mut events) = mpsc::unbounded_channel();
    let session = LiveSession::new(live_config(&relay.url), RunningFlag::new(true), tx);

    session.connect().await;
    wait_for_status(&mut events, status::CONNECTED).await;

    session.send_audio_base64("AAA=".to_string());
    session.stop().await;
    // Already signalled; nothing new is sent
    session.stop().await;
    session.send_audio_base64("BBB=".to_string());
    session.stop().await;

    assert_eq!(
        relay.next_message().await,
        ClientMessage::Audio { base64: "AAA=".into() }
    );
    assert_eq!(relay.next_message().await, ClientMessage::AudioStreamEnd);
    assert_eq!(
        relay.next_message().await,
        ClientMessage::Audio { base64: "BBB=".into() }
    );
    assert_eq!(relay.next_message().await, ClientMessage::AudioStreamEnd);

    assert!(timeout(Duration::from_millis(200), relay.received.recv())
        .await
        .is_err());

    session.close().await;
}

#[tokio::test]
async fn test_audio_dropped_while_disconnected() {
    let mut relay = spawn_test_relay(Behavior::Hold).await;
    let (tx, mut events) = mpsc::unbounded_channel();
    let session = LiveSession::new(live_config(&relay.url), RunningFlag::new(true), tx);

    // Never connected: silently dropped, no events
    session.send_audio_base64("AAA=".to_string());
    session.stop().await;
    assert!(events.try_recv().is_err());

    session.connect().await;
    wait_for_status(&mut events, status::CONNECTED).await;
    session.send_audio_base64("BBB=".to_string());

    // Only the chunk sent while connected arrives
    assert_eq!(
        relay.next_message().await,
        ClientMessage::Audio { base64: "BBB=".into() }
    );

    session.close().await;
}

#[tokio::test]
async fn test_one_reconnect_per_server_close() {
    let relay = spawn_test_relay(Behavior::CloseFirst).await;
    let (tx, mut events) = mpsc::unbounded_channel();
    let mut config = live_config(&relay.url);
    config.reconnect_delay = Duration::from_millis(300);
    let delay = config.reconnect_delay;
    let session = LiveSession::new(config, RunningFlag::new(true), tx);

    session.connect().await;
    wait_for_status(&mut events, status::CONNECTED).await;
    wait_for_status(&mut events, status::DISCONNECTED).await;
    let dropped_at = Instant::now();

    wait_for_status(&mut events, status::CONNECTED).await;
    // The event is observed slightly after it was emitted
    assert!(dropped_at.elapsed() >= delay - Duration::from_millis(50));
    assert_eq!(relay.connections(), 2);

    // The second connection stays up; no further attempts are scheduled
    sleep(delay * 4).await;
    assert_eq!(relay.connections(), 2);
    assert_eq!(session.state(), SessionState::Connected);
    assert!(events.try_recv().is_err());

    session.close().await;
}

#[tokio::test]
async fn test_close_during_reconnect_delay() {
    let relay = spawn_test_relay(Behavior::CloseImmediately).await;
    let (tx, mut events) = mpsc::unbounded_channel();
    let session = LiveSession::new(live_config(&relay.url), RunningFlag::new(true), tx);

    session.connect().await;
    wait_for_status(&mut events, status::CONNECTED).await;
    wait_for_status(&mut events, status::DISCONNECTED).await;

    // Close inside the reconnect delay; the pending attempt must not happen
    session.close().await;
    let before = relay.connections();
    sleep(Duration::from_millis(400)).await;

    assert_eq!(relay.connections(), before);
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_no_reconnect_after_manual_close() {
    let relay = spawn_test_relay(Behavior::Hold).await;
    let (tx, mut events) = mpsc::unbounded_channel();
    let session = LiveSession::new(live_config(&relay.url), RunningFlag::new(true), tx);

    session.connect().await;
    wait_for_status(&mut events, status::CONNECTED).await;

    session.close().await;
    wait_for_status(&mut events, status::DISCONNECTED).await;
    sleep(Duration::from_millis(400)).await;

    assert_eq!(relay.connections(), 1);
    assert_eq!(session.state(), SessionState::Closed);
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let relay = spawn_test_relay(Behavior::Hold).await;
    let (tx, mut events) = mpsc::unbounded_channel();
    let session = LiveSession::new(live_config(&relay.url), RunningFlag::new(true), tx);

    session.connect().await;
    wait_for_status(&mut events, status::CONNECTED).await;

    session.close().await;
    session.close().await;
    wait_for_status(&mut events, status::DISCONNECTED).await;
    sleep(Duration::from_millis(200)).await;

    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_no_reconnect_when_disabled() {
    let relay = spawn_test_relay(Behavior::CloseImmediately).await;
    let (tx, mut events) = mpsc::unbounded_channel();
    let session = LiveSession::new(live_config(&relay.url), RunningFlag::new(true), tx);
    session.set_auto_reconnect(false);

    session.connect().await;
    wait_for_status(&mut events, status::CONNECTED).await;
    wait_for_status(&mut events, status::DISCONNECTED).await;
    sleep(Duration::from_millis(400)).await;

    assert_eq!(relay.connections(), 1);
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_no_reconnect_when_not_running() {
    let relay = spawn_test_relay(Behavior::CloseImmediately).await;
    let running = RunningFlag::new(true);
    let (tx, mut events) = mpsc::unbounded_channel();
    let session = LiveSession::new(live_config(&relay.url), running.clone(), tx);

    session.connect().await;
    wait_for_status(&mut events, status::CONNECTED).await;
    running.set(false);
    wait_for_status(&mut events, status::DISCONNECTED).await;
    sleep(Duration::from_millis(400)).await;

    assert_eq!(relay.connections(), 1);
}

#[tokio::test]
async fn test_connect_failure_reports_error() {
    // Grab a free port, then release it so nothing is listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut config = live_config(&url);
    config.auto_reconnect = false;
    let (tx, mut events) = mpsc::unbounded_channel();
    let session = LiveSession::new(config, RunningFlag::new(true), tx);

    session.connect().await;

    match next_event(&mut events).await {
        SessionEvent::Error { message } => assert!(message.starts_with("WebSocket error")),
        other => panic!("expected error event, got {:?}", other),
    }
    assert!(next_event(&mut events).await.is_status(status::DISCONNECTED));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_bad_relay_message_becomes_error_event() {
    let relay = spawn_test_relay(Behavior::SendGarbage).await;
    let (tx, mut events) = mpsc::unbounded_channel();
    let session = LiveSession::new(live_config(&relay.url), RunningFlag::new(true), tx);

    session.connect().await;
    wait_for_status(&mut events, status::CONNECTED).await;

    let event = next_event(&mut events).await;
    assert_eq!(event, SessionEvent::error("Bad message"));

    // The connection survives a bad frame
    assert_eq!(session.state(), SessionState::Connected);
    session.close().await;
}

#[tokio::test]
async fn test_factory_builds_requested_mode() {
    let (tx, _events) = mpsc::unbounded_channel();
    let config = SessionConfig::default();

    let live = SessionFactory::create(SessionMode::Live, config.clone(), RunningFlag::new(true), tx.clone());
    let mock = SessionFactory::create(SessionMode::Mock, config, RunningFlag::new(true), tx);

    assert_eq!(live.mode(), SessionMode::Live);
    assert_eq!(mock.mode(), SessionMode::Mock);
}

fn mock_session() -> (
    Arc<dyn TranscriptionSession>,
    mpsc::UnboundedReceiver<SessionEvent>,
) {
    let config = SessionConfig {
        mock_interval: Duration::from_millis(20),
        ..SessionConfig::default()
    };
    let (tx, events) = mpsc::unbounded_channel();
    let session = SessionFactory::create(SessionMode::Mock, config, RunningFlag::new(true), tx);
    (session, events)
}

#[tokio::test]
async fn test_mock_emits_script_in_order() {
    let (session, mut events) = mock_session();

    session.connect().await;
    assert!(next_event(&mut events).await.is_status(status::CONNECTED));

    session.start().await;
    for expected in MOCK_SCRIPT.iter().chain(MOCK_SCRIPT.iter()).take(4) {
        let event = next_event(&mut events).await;
        assert_eq!(
            event,
            SessionEvent::Transcript {
                text: expected.to_string()
            }
        );
    }

    session.close().await;
}

#[tokio::test]
async fn test_mock_first_line_is_greeting() {
    let (session, mut events) = mock_session();

    session.connect().await;
    session.start().await;

    let event = wait_for(&mut events, |e| matches!(e, SessionEvent::Transcript { .. })).await;
    match event {
        SessionEvent::Transcript { text } => assert!(text.starts_with("こんにちは")),
        _ => unreachable!(),
    }

    session.close().await;
}

#[tokio::test]
async fn test_mock_stop_halts_emission() {
    let (session, mut events) = mock_session();

    session.connect().await;
    session.start().await;
    wait_for(&mut events, |e| matches!(e, SessionEvent::Transcript { .. })).await;

    session.stop().await;
    wait_for_status(&mut events, status::STOPPED).await;
    sleep(Duration::from_millis(100)).await;

    assert!(events.try_recv().is_err());

    // Stopping again is silent
    session.stop().await;
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_mock_restart_continues_script() {
    let (session, mut events) = mock_session();

    session.connect().await;
    wait_for_status(&mut events, status::CONNECTED).await;
    session.start().await;

    // Stop after the second line; a tick may still land before the timer halts
    let mut emitted = 0;
    loop {
        match next_event(&mut events).await {
            SessionEvent::Transcript { .. } => {
                emitted += 1;
                if emitted == 2 {
                    session.stop().await;
                }
            }
            event if event.is_status(status::STOPPED) => break,
            event => panic!("unexpected event {:?}", event),
        }
    }

    session.start().await;
    let event = next_event(&mut events).await;
    assert_eq!(
        event,
        SessionEvent::Transcript {
            text: MOCK_SCRIPT[emitted % MOCK_SCRIPT.len()].to_string()
        }
    );

    session.close().await;
}

#[tokio::test]
async fn test_mock_close_is_idempotent() {
    let (session, mut events) = mock_session();

    session.connect().await;
    wait_for_status(&mut events, status::CONNECTED).await;
    session.start().await;

    session.close().await;
    wait_for_status(&mut events, status::CLOSED).await;
    assert_eq!(session.state(), SessionState::Closed);

    session.close().await;
    sleep(Duration::from_millis(60)).await;
    assert!(events.try_recv().is_err());

    // A closed mock never restarts
    session.start().await;
    sleep(Duration::from_millis(60)).await;
    assert!(events.try_recv().is_err());
}
