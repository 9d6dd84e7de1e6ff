use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::capture::FrameReceiver;
use super::encoder::encode_base64;
use crate::session::TranscriptionSession;

/// Forward captured frames to a session until the capture ends
///
/// Each frame is encoded once and handed to the session once; the session
/// drops it if it is not connected. Resolves to the number of frames forwarded.
pub fn spawn_pipeline(
    mut frames: FrameReceiver,
    session: Arc<dyn TranscriptionSession>,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        info!("Audio pipeline started");
        let mut forwarded = 0u64;

        while let Some(frame) = frames.recv().await {
            session.send_audio_base64(encode_base64(&frame.samples));
            forwarded += 1;

            if forwarded % 500 == 0 {
                debug!(forwarded, timestamp_ms = frame.timestamp_ms, "Audio pipeline progress");
            }
        }

        info!("Audio pipeline stopped after {} frames", forwarded);
        forwarded
    })
}
