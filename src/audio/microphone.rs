// Live microphone input via cpal

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use tracing::{error, info};

use super::convert::{downmix_to_mono, Resampler};
use super::device::{InputDevice, InputStream, SampleSink};
use super::SAMPLE_RATE;
use crate::error::CaptureError;

/// Default system input device
pub struct MicrophoneDevice;

impl MicrophoneDevice {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MicrophoneDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(message: String) -> CaptureError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
        CaptureError::Permission(message)
    } else {
        CaptureError::Device(message)
    }
}

fn select_config(
    device: &cpal::Device,
) -> Result<cpal::SupportedStreamConfig, CaptureError> {
    let configs = device
        .supported_input_configs()
        .map_err(|e| classify(e.to_string()))?;

    for range in configs {
        if range.min_sample_rate().0 <= SAMPLE_RATE && range.max_sample_rate().0 >= SAMPLE_RATE {
            return Ok(range.with_sample_rate(cpal::SampleRate(SAMPLE_RATE)));
        }
    }

    device
        .default_input_config()
        .map_err(|e| classify(e.to_string()))
}

fn build_stream(
    mut sink: SampleSink,
    quantum: Option<usize>,
) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| CaptureError::Device("No input device available".to_string()))?;

    info!("Audio Input Device: {}", device.name().unwrap_or_default());

    let supported = select_config(&device)?;
    let format = supported.sample_format();
    let mut config: cpal::StreamConfig = supported.into();
    if let Some(q) = quantum {
        config.buffer_size = cpal::BufferSize::Fixed(q as u32);
    }

    let channels = config.channels;
    let rate = config.sample_rate.0;
    info!("Audio Config Selected: Rate={}Hz, Channels={}", rate, channels);

    let err_fn = |err| error!("an error occurred on stream: {}", err);
    // Carries the interpolation phase from one callback to the next
    let mut resampler = Resampler::new(rate, SAMPLE_RATE);

    let stream = match format {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &_| {
                let mono = downmix_to_mono(data, channels);
                sink(&resampler.process(&mono));
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &_| {
                let floats: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                let mono = downmix_to_mono(&floats, channels);
                sink(&resampler.process(&mono));
            },
            err_fn,
            None,
        ),
        other => {
            return Err(CaptureError::Device(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    }
    .map_err(|e| classify(e.to_string()))?;

    stream.play().map_err(|e| classify(e.to_string()))?;
    Ok(stream)
}

impl InputDevice for MicrophoneDevice {
    fn open(
        &self,
        sink: SampleSink,
        quantum: Option<usize>,
    ) -> Result<Box<dyn InputStream>, CaptureError> {
        // cpal streams are not Send, so the stream lives on its own thread
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let handle = std::thread::spawn(move || match build_stream(sink, quantum) {
            Ok(stream) => {
                let _ = ready_tx.send(Ok(()));
                let _ = stop_rx.recv();
                drop(stream);
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(MicrophoneStream {
                stop_tx: Some(stop_tx),
                handle: Some(handle),
            })),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(CaptureError::Device(
                "microphone thread exited during setup".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

struct MicrophoneStream {
    stop_tx: Option<std_mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl InputStream for MicrophoneStream {
    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MicrophoneStream {
    fn drop(&mut self) {
        self.stop();
    }
}
