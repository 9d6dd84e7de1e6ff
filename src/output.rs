//! Console rendering of session events for the client binary

use chrono::NaiveTime;

use crate::protocol::SessionEvent;

/// How an event should appear on the terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Appended as a permanent line
    Line(String),
    /// Replaces the current in-progress line
    Interim(String),
    /// Connection status
    Status(String),
    /// Auxiliary model text
    Model(String),
}

pub fn render(event: &SessionEvent, timestamps: bool, now: NaiveTime) -> Output {
    let stamp = |text: String| {
        if timestamps {
            format!("[{}] {}", now.format("%H:%M:%S"), text)
        } else {
            text
        }
    };

    match event {
        SessionEvent::Transcript { text } => Output::Line(stamp(text.clone())),
        SessionEvent::Interim { text } => Output::Interim(text.clone()),
        SessionEvent::Error { message } => {
            let message = if message.is_empty() { "unknown" } else { message.as_str() };
            Output::Line(stamp(format!("[ERR] {}", message)))
        }
        SessionEvent::Status { status } => Output::Status(status.clone()),
        SessionEvent::Closed { reason } => Output::Status(format!("closed ({})", reason)),
        SessionEvent::ModelText { text } => Output::Model(text.clone()),
    }
}
