//! Float → 16-bit PCM → base64 encoding for outbound audio

use anyhow::{bail, Result};
use base64::Engine;

/// Convert normalized float samples to signed 16-bit PCM
///
/// Samples are clamped to [-1.0, 1.0] before scaling so out-of-range input
/// saturates instead of wrapping. NaN is treated as silence.
pub fn float_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&s| sample_to_i16(s)).collect()
}

fn sample_to_i16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }

    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Serialize PCM samples as little-endian bytes
pub fn pcm16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Encode a frame of float samples into the base64 transport form
pub fn encode_base64(samples: &[f32]) -> String {
    let pcm = float_to_pcm16(samples);
    base64::engine::general_purpose::STANDARD.encode(pcm16_to_le_bytes(&pcm))
}

/// Decode a base64 transport chunk back into PCM samples
pub fn decode_base64_pcm16(data: &str) -> Result<Vec<i16>> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(data)?;
    if bytes.len() % 2 != 0 {
        bail!("PCM payload has odd byte count: {}", bytes.len());
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infinity_saturates() {
        assert_eq!(
            float_to_pcm16(&[f32::INFINITY, f32::NEG_INFINITY]),
            vec![32767, -32768]
        );
    }

    #[test]
    fn test_nan_is_silence() {
        assert_eq!(float_to_pcm16(&[f32::NAN]), vec![0]);
    }

    #[test]
    fn test_le_byte_order() {
        assert_eq!(pcm16_to_le_bytes(&[0x0102, -1]), vec![0x02, 0x01, 0xFF, 0xFF]);
    }
}
