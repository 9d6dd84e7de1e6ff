//! Client-side transcription sessions
//!
//! This module provides the `TranscriptionSession` abstraction that manages:
//! - Connection lifecycle to the relay
//! - Reconnection after unsolicited disconnects
//! - Outbound audio framing
//! - Inbound event dispatch to the application
//!
//! A scripted mock session implements the same contract without network or
//! audio hardware.

mod config;
mod live;
mod mock;
mod session;
mod state;

pub use config::SessionConfig;
pub use live::LiveSession;
pub use mock::{MockSession, MOCK_SCRIPT};
pub use session::{EventSender, SessionFactory, SessionMode, TranscriptionSession};
pub use state::{RunningFlag, SessionState};
