pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod output;
pub mod protocol;
pub mod relay;
pub mod session;
pub mod upstream;

pub use audio::{
    encode_base64, float_to_pcm16, spawn_pipeline, AudioCapture, AudioFile, AudioFrame,
    CaptureConfig, CaptureFactory, CaptureStrategy, FileDevice, InputDevice,
};
pub use config::Config;
pub use error::{CaptureError, UpstreamError};
pub use http::{create_router, AppState};
pub use protocol::{ClientMessage, SessionEvent};
pub use relay::{run_pairing, spawn_relay, PairingConfig};
pub use session::{
    RunningFlag, SessionConfig, SessionFactory, SessionMode, SessionState, TranscriptionSession,
};
pub use upstream::{GeminiLiveConnector, RealtimeInput, UpstreamConnector, UpstreamEvent};
