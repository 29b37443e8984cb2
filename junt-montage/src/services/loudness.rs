//! Integrated loudness measurement (EBU R128)
//!
//! Measurement is delegated to the `ebur128` crate; this module only adds
//! the validation and the clamped gain used by clip normalization.

use anyhow::{anyhow, bail, Result};
use ebur128::{EbuR128, Mode};

/// Largest boost applied by normalization (dB)
pub const MAX_GAIN_DB: f64 = 20.0;
/// Largest cut applied by normalization (dB)
pub const MIN_GAIN_DB: f64 = -30.0;

/// Measure integrated loudness of interleaved samples
///
/// Fails when the audio is shorter than one gating block or is entirely
/// below the absolute gate (silence); the meter reports both as -inf.
pub fn integrated_loudness(samples: &[f32], sample_rate: u32, channels: usize) -> Result<f64> {
    if channels == 0 || sample_rate == 0 {
        bail!("Invalid audio layout: {} channels at {}Hz", channels, sample_rate);
    }

    let mut meter = EbuR128::new(channels as u32, sample_rate, Mode::I)
        .map_err(|e| anyhow!("Failed to create loudness meter: {:?}", e))?;
    let frames = samples.len() / channels;
    meter
        .add_frames_f32(&samples[..frames * channels])
        .map_err(|e| anyhow!("Failed to feed loudness meter: {:?}", e))?;

    let lufs = meter
        .loudness_global()
        .map_err(|e| anyhow!("Failed to read integrated loudness: {:?}", e))?;
    if !lufs.is_finite() {
        bail!(
            "No measurable loudness in {} frames (silent or shorter than a 400 ms block)",
            frames
        );
    }

    tracing::debug!(lufs = lufs, frames = frames, "Measured integrated loudness");
    Ok(lufs)
}

/// Linear gain that moves `measured` LUFS to `target` LUFS, within safety limits
pub fn normalization_gain(measured: f64, target: f64) -> f64 {
    let db = (target - measured).clamp(MIN_GAIN_DB, MAX_GAIN_DB);
    10f64.powf(db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, amplitude: f64, seconds: f64, sample_rate: u32, channels: usize) -> Vec<f32> {
        let n = (seconds * sample_rate as f64) as usize;
        let mut out = Vec::with_capacity(n * channels);
        for i in 0..n {
            let v = (amplitude * (2.0 * PI * freq * i as f64 / sample_rate as f64).sin()) as f32;
            for _ in 0..channels {
                out.push(v);
            }
        }
        out
    }

    #[test]
    fn test_reference_tone_mono() {
        // 1 kHz at amplitude 0.1 reads about -23 LUFS
        let samples = sine(1000.0, 0.1, 5.0, 48000, 1);
        let lufs = integrated_loudness(&samples, 48000, 1).unwrap();
        assert!((lufs - -23.0).abs() < 0.3, "measured {}", lufs);
    }

    #[test]
    fn test_stereo_sums_channels() {
        let mono = integrated_loudness(&sine(1000.0, 0.1, 5.0, 44100, 1), 44100, 1).unwrap();
        let stereo = integrated_loudness(&sine(1000.0, 0.1, 5.0, 44100, 2), 44100, 2).unwrap();
        // Identical channels add 3 dB
        assert!((stereo - mono - 3.01).abs() < 0.1, "mono {} stereo {}", mono, stereo);
    }

    #[test]
    fn test_silence_and_short_audio_fail() {
        assert!(integrated_loudness(&vec![0.0; 44100 * 2], 44100, 2).is_err());
        assert!(integrated_loudness(&sine(1000.0, 0.5, 0.2, 44100, 1), 44100, 1).is_err());
        assert!(integrated_loudness(&sine(1000.0, 0.5, 1.0, 44100, 1), 0, 1).is_err());
    }

    #[test]
    fn test_gain_reaches_target() {
        let samples = sine(1000.0, 0.1, 5.0, 44100, 2);
        let measured = integrated_loudness(&samples, 44100, 2).unwrap();
        let gain = normalization_gain(measured, -14.0) as f32;
        let scaled: Vec<f32> = samples.iter().map(|s| s * gain).collect();
        let after = integrated_loudness(&scaled, 44100, 2).unwrap();
        assert!((after - -14.0).abs() < 0.05, "after {}", after);
    }

    #[test]
    fn test_gain_is_clamped() {
        let gain = normalization_gain(-90.0, -14.0);
        assert!((gain - 10f64.powf(MAX_GAIN_DB / 20.0)).abs() < 1e-9);
    }
}
