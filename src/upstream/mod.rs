pub mod client;
pub mod connector;
pub mod messages;

pub use client::{GeminiLiveConnector, GeminiLiveSession};
pub use connector::{
    RealtimeInput, UpstreamConnector, UpstreamEvent, UpstreamEventSender, UpstreamSession,
};
pub use messages::{RealtimeInputMessage, ServerMessage, SetupMessage};
