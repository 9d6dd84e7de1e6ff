//! Sample-format helpers shared by the capture devices

/// Average interleaved channels down to mono
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample mono audio by linear interpolation
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).floor() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(last)];
            let b = samples[(idx + 1).min(last)];
            a + (b - a) * frac
        })
        .collect()
}

/// Scale an integer PCM sample of the given bit depth into [-1.0, 1.0]
pub fn int_to_float(sample: i32, bits_per_sample: u16) -> f32 {
    let full_scale = (1i64 << (bits_per_sample.clamp(1, 32) - 1)) as f32;
    sample as f32 / full_scale
}

/// Linear resampler for audio that arrives in blocks
///
/// Output positions are tracked across calls, so feeding a signal in chunks
/// yields the same samples as `resample_linear` over the whole signal.
#[derive(Debug, Clone)]
pub struct Resampler {
    ratio: f64,
    /// Input samples consumed by earlier calls
    consumed: u64,
    /// Output samples produced so far
    produced: u64,
    /// Final sample of the previous block
    last: f32,
}

impl Resampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        Self {
            ratio: from_rate as f64 / to_rate.max(1) as f64,
            consumed: 0,
            produced: 0,
            last: 0.0,
        }
    }

    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if input.is_empty() {
            return Vec::new();
        }
        if self.ratio == 1.0 {
            return input.to_vec();
        }

        let start = self.consumed;
        let end = start + input.len() as u64;
        let previous = self.last;
        let sample = |g: u64| {
            if g < start {
                previous
            } else {
                input[(g - start) as usize]
            }
        };

        let mut out = Vec::with_capacity((input.len() as f64 / self.ratio) as usize + 1);
        loop {
            let pos = self.produced as f64 * self.ratio;
            let idx = pos.floor() as u64;
            // Interpolation needs the following sample; wait for the next block
            if idx + 1 >= end {
                break;
            }
            let frac = (pos - idx as f64) as f32;
            let a = sample(idx);
            let b = sample(idx + 1);
            out.push(a + (b - a) * frac);
            self.produced += 1;
        }

        self.last = input[input.len() - 1];
        self.consumed = end;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo() {
        let mono = downmix_to_mono(&[1.0, 0.0, -0.5, -0.5], 2);
        assert_eq!(mono, vec![0.5, -0.5]);
    }

    #[test]
    fn test_resample_halves_length() {
        let input: Vec<f32> = (0..32).map(|i| i as f32).collect();
        let out = resample_linear(&input, 32000, 16000);
        assert_eq!(out.len(), 16);
        assert_eq!(out[1], 2.0);
    }

    #[test]
    fn test_int_to_float_16bit() {
        assert_eq!(int_to_float(-32768, 16), -1.0);
        assert_eq!(int_to_float(16384, 16), 0.5);
    }

    fn tone(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i as f32 * 0.013).sin()).collect()
    }

    fn assert_matches_whole(chunked: &[f32], whole: &[f32]) {
        assert!((chunked.len() as i64 - whole.len() as i64).abs() <= 1);
        let n = chunked.len().min(whole.len());
        assert_eq!(&chunked[..n], &whole[..n]);
    }

    #[test]
    fn test_chunked_resample_matches_whole() {
        let input = tone(44100);
        let whole = resample_linear(&input, 44100, 16000);

        let mut resampler = Resampler::new(44100, 16000);
        let chunked: Vec<f32> = input
            .chunks(512)
            .flat_map(|c| resampler.process(c))
            .collect();

        assert_matches_whole(&chunked, &whole);
        assert!(chunked.len() >= 15999);
    }

    #[test]
    fn test_uneven_blocks_resample_like_whole() {
        let input = tone(48000);
        let whole = resample_linear(&input, 48000, 16000);

        let mut resampler = Resampler::new(48000, 16000);
        let mut chunked = Vec::new();
        let mut rest = input.as_slice();
        for size in [1, 7, 480, 3, 1024].iter().cycle() {
            if rest.is_empty() {
                break;
            }
            let (block, tail) = rest.split_at((*size).min(rest.len()));
            chunked.extend(resampler.process(block));
            rest = tail;
        }

        assert_matches_whole(&chunked, &whole);
    }

    #[test]
    fn test_resampler_passthrough_at_16khz() {
        let mut resampler = Resampler::new(16000, 16000);
        assert_eq!(resampler.process(&[0.1, 0.2]), vec![0.1, 0.2]);
    }
}
