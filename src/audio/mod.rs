pub mod capture;
pub mod convert;
pub mod device;
pub mod encoder;
pub mod file;
pub mod pipeline;

#[cfg(feature = "microphone")]
pub mod microphone;

/// Sample rate of every frame sent to the transcription engine
pub const SAMPLE_RATE: u32 = 16000;

/// MIME type describing the encoded chunks
pub const PCM_MIME_TYPE: &str = "audio/pcm;rate=16000";

pub use capture::{
    AudioCapture, AudioFrame, BufferedCapture, CaptureConfig, CaptureFactory, CaptureStrategy,
    FrameReceiver, StreamingCapture,
};
pub use device::{FileDevice, InputDevice, InputStream, SampleSink};
pub use encoder::{decode_base64_pcm16, encode_base64, float_to_pcm16, pcm16_to_le_bytes};
pub use file::AudioFile;
pub use pipeline::spawn_pipeline;

#[cfg(feature = "microphone")]
pub use microphone::MicrophoneDevice;
