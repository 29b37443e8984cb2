//! Audio resampling using rubato
//!
//! The analyzer works at 22.05 kHz mono; clips are written at 44.1 kHz stereo.

use anyhow::{anyhow, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Resample interleaved audio from `input_rate` to `output_rate`
///
/// If the rates already match, returns a copy without resampling.
pub fn resample(input: &[f32], input_rate: u32, output_rate: u32, channels: usize) -> Result<Vec<f32>> {
    if input_rate == output_rate {
        return Ok(input.to_vec());
    }
    if channels == 0 || input_rate == 0 {
        return Err(anyhow!("Cannot resample {} channels at {}Hz", channels, input_rate));
    }

    let planar_input = deinterleave(input, channels);
    let input_frames = planar_input[0].len();
    if input_frames == 0 {
        return Ok(Vec::new());
    }

    debug!(
        "Resampling {} frames from {}Hz to {}Hz ({} channels)",
        input_frames, input_rate, output_rate, channels
    );

    // Whole buffer as one chunk; no runtime ratio changes
    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        input_frames,
        channels,
    )
    .map_err(|e| anyhow!("Failed to create resampler: {}", e))?;

    let planar_output = resampler
        .process(&planar_input, None)
        .map_err(|e| anyhow!("Resampling failed: {}", e))?;

    Ok(interleave(planar_output))
}

/// Convert interleaved samples to planar format.
///
/// Input:  [L, R, L, R, L, R, ...]
/// Output: [[L, L, L, ...], [R, R, R, ...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let num_frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(num_frames); channels];

    for frame in samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            planar[ch].push(*sample);
        }
    }

    planar
}

/// Convert planar samples back to interleaved format.
fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
    let channels = planar.len();
    if channels == 0 {
        return Vec::new();
    }
    let num_frames = planar.iter().map(|c| c.len()).min().unwrap_or(0);

    let mut interleaved = Vec::with_capacity(num_frames * channels);
    for frame_idx in 0..num_frames {
        for channel in &planar {
            interleaved.push(channel[frame_idx]);
        }
    }

    interleaved
}

/// Map interleaved audio to a different channel count
///
/// Mono is duplicated to every output channel; anything else is
/// downmixed to mono first when the counts differ.
pub fn remap_channels(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }

    let mono = super::audio_decoder::to_mono(samples, from);
    if to == 1 {
        return mono;
    }

    let mut out = Vec::with_capacity(mono.len() * to);
    for sample in mono {
        for _ in 0..to {
            out.push(sample);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_copy() {
        let input = vec![0.1, 0.2, 0.3, 0.4];
        let output = resample(&input, 44100, 44100, 2).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_interleave_round_trip() {
        let input = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let planar = deinterleave(&input, 2);
        assert_eq!(planar, vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]]);
        assert_eq!(interleave(planar), input);
    }

    #[test]
    fn test_downsample_halves_length() {
        let input: Vec<f32> = (0..44100).map(|i| (i as f32 * 0.01).sin()).collect();
        let output = resample(&input, 44100, 22050, 1).unwrap();
        let expected = 22050f32;
        assert!(
            (output.len() as f32 - expected).abs() / expected < 0.02,
            "got {} frames",
            output.len()
        );
    }

    #[test]
    fn test_remap_mono_to_stereo() {
        assert_eq!(remap_channels(&[0.5, -0.5], 1, 2), vec![0.5, 0.5, -0.5, -0.5]);
        assert_eq!(remap_channels(&[1.0, 0.0, 0.0, 1.0], 2, 1), vec![0.5, 0.5]);
    }
}
