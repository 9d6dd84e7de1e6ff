use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use std::path::Path;
use tracing::info;

use super::convert::{downmix_to_mono, int_to_float, resample_linear};
use super::SAMPLE_RATE;

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            SampleFormat::Int => reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| int_to_float(v, spec.bits_per_sample)))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
        };

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Mono samples at the 16kHz rate the transcription engine expects
    pub fn to_mono_16khz(&self) -> Vec<f32> {
        let mono = downmix_to_mono(&self.samples, self.channels);
        resample_linear(&mono, self.sample_rate, SAMPLE_RATE)
    }
}
