//! Raw audio input devices
//!
//! A device pushes mono 16kHz sample slices into a sink callback from its own
//! thread. Capture strategies (see `capture`) decide how those slices become
//! frames.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::file::AudioFile;
use super::SAMPLE_RATE;
use crate::error::CaptureError;

/// Callback receiving each block of samples delivered by a device
pub type SampleSink = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// An open input stream. Stopping (or dropping) it releases the device and
/// drops the sink.
pub trait InputStream: Send + Sync {
    fn stop(&mut self);
}

pub trait InputDevice: Send + Sync {
    /// Open the device and start delivering samples to `sink`
    ///
    /// `quantum` requests a fixed callback size; devices that cannot honor it
    /// fail with `CaptureError::Device`.
    fn open(
        &self,
        sink: SampleSink,
        quantum: Option<usize>,
    ) -> Result<Box<dyn InputStream>, CaptureError>;

    fn name(&self) -> &str;
}

/// Replays a WAV file as if it were a live input
pub struct FileDevice {
    path: PathBuf,
    quantum: usize,
    realtime: bool,
}

impl FileDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            quantum: 128,
            realtime: true,
        }
    }

    /// Deliver as fast as the sink accepts instead of pacing at 16kHz
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn with_quantum(mut self, quantum: usize) -> Self {
        self.quantum = quantum.max(1);
        self
    }
}

impl InputDevice for FileDevice {
    fn open(
        &self,
        mut sink: SampleSink,
        quantum: Option<usize>,
    ) -> Result<Box<dyn InputStream>, CaptureError> {
        let audio = AudioFile::open(&self.path)
            .map_err(|e| CaptureError::Device(format!("{}: {:#}", self.path.display(), e)))?;
        let samples = audio.to_mono_16khz();
        let quantum = quantum.unwrap_or(self.quantum).max(1);
        let realtime = self.realtime;

        info!(
            "File device opened: {} ({} samples, quantum {})",
            self.path.display(),
            samples.len(),
            quantum
        );

        let stopped = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stopped);

        let handle = std::thread::spawn(move || {
            let block = Duration::from_secs_f64(quantum as f64 / SAMPLE_RATE as f64);
            let started = Instant::now();

            for (i, chunk) in samples.chunks(quantum).enumerate() {
                if stop_flag.load(Ordering::SeqCst) {
                    break;
                }
                sink(chunk);

                if realtime {
                    let due = block * (i as u32 + 1);
                    if let Some(wait) = due.checked_sub(started.elapsed()) {
                        std::thread::sleep(wait);
                    }
                }
            }

            debug!("File device playback finished");
        });

        Ok(Box::new(FileStream {
            stopped,
            handle: Some(handle),
        }))
    }

    fn name(&self) -> &str {
        "file"
    }
}

struct FileStream {
    stopped: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl InputStream for FileStream {
    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FileStream {
    fn drop(&mut self) {
        self.stop();
    }
}
