use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

use super::device::{InputDevice, InputStream};
use super::SAMPLE_RATE;
use crate::error::CaptureError;

/// Mono audio samples delivered by a capture strategy
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Normalized samples, nominally in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for audio capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Callback size requested by the streaming strategy
    pub quantum: usize,
    /// Frame size of the buffered strategy
    pub buffer_size: usize,
    /// Frames the buffered strategy may queue before dropping
    pub buffered_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            quantum: 128,
            buffer_size: 4096,
            buffered_capacity: 8,
        }
    }
}

/// Receiving end of a started capture
pub enum FrameReceiver {
    Bounded(mpsc::Receiver<AudioFrame>),
    Unbounded(mpsc::UnboundedReceiver<AudioFrame>),
}

impl FrameReceiver {
    pub async fn recv(&mut self) -> Option<AudioFrame> {
        match self {
            FrameReceiver::Bounded(rx) => rx.recv().await,
            FrameReceiver::Unbounded(rx) => rx.recv().await,
        }
    }
}

/// Audio capture trait
///
/// Implementations:
/// - `StreamingCapture`: one frame per device callback, never drops
/// - `BufferedCapture`: fixed-size frames, drops under backpressure
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a receiver that yields frames until `stop` is called or the
    /// device runs out of input.
    async fn start(&mut self) -> Result<FrameReceiver, CaptureError>;

    /// Stop capturing and release the device. Safe to call repeatedly.
    async fn stop(&mut self);

    /// Check if capture is currently running
    fn is_capturing(&self) -> bool;

    /// Get strategy name for logging
    fn name(&self) -> &str;
}

/// Stop a device stream off the async workers; stopping joins the device thread
async fn release(mut stream: Box<dyn InputStream>) {
    if let Err(e) = tokio::task::spawn_blocking(move || stream.stop()).await {
        warn!("Input stream did not stop cleanly: {}", e);
    }
}

fn timestamp_ms(position: u64) -> u64 {
    position * 1000 / SAMPLE_RATE as u64
}

/// Low-latency capture: every device callback becomes one frame
pub struct StreamingCapture {
    device: Arc<dyn InputDevice>,
    quantum: usize,
    stream: Option<Box<dyn InputStream>>,
}

impl StreamingCapture {
    pub fn new(device: Arc<dyn InputDevice>, config: &CaptureConfig) -> Self {
        Self {
            device,
            quantum: config.quantum,
            stream: None,
        }
    }
}

#[async_trait]
impl AudioCapture for StreamingCapture {
    async fn start(&mut self) -> Result<FrameReceiver, CaptureError> {
        if self.stream.is_some() {
            return Err(CaptureError::Device("capture already running".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut position = 0u64;

        let sink = Box::new(move |data: &[f32]| {
            let frame = AudioFrame {
                samples: data.to_vec(),
                sample_rate: SAMPLE_RATE,
                timestamp_ms: timestamp_ms(position),
            };
            position += data.len() as u64;
            let _ = tx.send(frame);
        });

        let stream = self.device.open(sink, Some(self.quantum))?;
        self.stream = Some(stream);

        info!(
            "Streaming capture started on {} ({} samples per frame)",
            self.device.name(),
            self.quantum
        );

        Ok(FrameReceiver::Unbounded(rx))
    }

    async fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            release(stream).await;
            info!("Streaming capture stopped");
        }
    }

    fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    fn name(&self) -> &str {
        "streaming"
    }
}

/// Fallback capture: fixed-size frames over a bounded queue
///
/// A full frame that finds the queue full is dropped and counted; a trailing
/// partial frame is discarded when input ends.
pub struct BufferedCapture {
    device: Arc<dyn InputDevice>,
    buffer_size: usize,
    capacity: usize,
    stream: Option<Box<dyn InputStream>>,
    dropped: Arc<AtomicU64>,
}

impl BufferedCapture {
    pub fn new(device: Arc<dyn InputDevice>, config: &CaptureConfig) -> Self {
        Self {
            device,
            buffer_size: config.buffer_size.max(1),
            capacity: config.buffered_capacity.max(1),
            stream: None,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Frames dropped because the consumer fell behind
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AudioCapture for BufferedCapture {
    async fn start(&mut self) -> Result<FrameReceiver, CaptureError> {
        if self.stream.is_some() {
            return Err(CaptureError::Device("capture already running".to_string()));
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        let size = self.buffer_size;
        let dropped = Arc::clone(&self.dropped);
        let mut buffer: Vec<f32> = Vec::with_capacity(size);
        let mut position = 0u64;

        let sink = Box::new(move |data: &[f32]| {
            buffer.extend_from_slice(data);

            while buffer.len() >= size {
                let rest = buffer.split_off(size);
                let samples = std::mem::replace(&mut buffer, rest);
                let frame = AudioFrame {
                    samples,
                    sample_rate: SAMPLE_RATE,
                    timestamp_ms: timestamp_ms(position),
                };
                position += size as u64;

                if let Err(TrySendError::Full(_)) = tx.try_send(frame) {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        });

        let stream = self.device.open(sink, None)?;
        self.stream = Some(stream);

        info!(
            "Buffered capture started on {} ({} samples per frame)",
            self.device.name(),
            size
        );

        Ok(FrameReceiver::Bounded(rx))
    }

    async fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            release(stream).await;
            info!(
                "Buffered capture stopped ({} frames dropped)",
                self.dropped_frames()
            );
        }
    }

    fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    fn name(&self) -> &str {
        "buffered"
    }
}

/// Capture strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStrategy {
    Streaming,
    Buffered,
}

/// Capture factory
pub struct CaptureFactory;

impl CaptureFactory {
    pub fn create(
        strategy: CaptureStrategy,
        device: Arc<dyn InputDevice>,
        config: &CaptureConfig,
    ) -> Box<dyn AudioCapture> {
        match strategy {
            CaptureStrategy::Streaming => Box::new(StreamingCapture::new(device, config)),
            CaptureStrategy::Buffered => Box::new(BufferedCapture::new(device, config)),
        }
    }

    /// Start the preferred strategy, falling back to buffered capture when the
    /// streaming path cannot be set up. Permission failures are never retried.
    pub async fn start_with_fallback(
        preferred: CaptureStrategy,
        device: Arc<dyn InputDevice>,
        config: &CaptureConfig,
    ) -> Result<(Box<dyn AudioCapture>, FrameReceiver), CaptureError> {
        if preferred == CaptureStrategy::Streaming {
            let mut capture = Self::create(CaptureStrategy::Streaming, Arc::clone(&device), config);
            match capture.start().await {
                Ok(rx) => return Ok((capture, rx)),
                Err(e) if e.is_permission() => return Err(e),
                Err(e) => warn!("Streaming capture unavailable, falling back: {}", e),
            }
        }

        let mut capture = Self::create(CaptureStrategy::Buffered, device, config);
        let rx = capture.start().await?;
        Ok((capture, rx))
    }
}
