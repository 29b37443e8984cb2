//! WAV fixtures for pipeline tests
//!
//! A quiet sine tone (440 Hz unless set) with an optional loud section,
//! so the peak window has something to find.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub amplitude: f32,
    pub frequency: f32,
    /// (start seconds, length seconds, amplitude)
    pub loud_section: Option<(f64, f64, f32)>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 8.0,
            sample_rate: 22050,
            channels: 1,
            amplitude: 0.05,
            frequency: 440.0,
            loud_section: None,
        }
    }
}

pub fn generate_test_wav(path: &Path, config: &AudioConfig) -> anyhow::Result<PathBuf> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let rate = config.sample_rate as f64;
    let total_frames = (config.duration_seconds * rate) as usize;

    let (loud_start, loud_end, loud_amp) = match config.loud_section {
        Some((start, len, amp)) => ((start * rate) as usize, ((start + len) * rate) as usize, amp),
        None => (usize::MAX, usize::MAX, 0.0),
    };

    for i in 0..total_frames {
        let amplitude = if i >= loud_start && i < loud_end {
            loud_amp
        } else {
            config.amplitude
        };
        let t = i as f32 / config.sample_rate as f32;
        let value = amplitude * (2.0 * std::f32::consts::PI * config.frequency * t).sin();
        let sample = (value * i16::MAX as f32) as i16;
        for _ in 0..config.channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(path.to_path_buf())
}

/// Read back a 16-bit WAV's duration in seconds
pub fn wav_duration(path: &Path) -> anyhow::Result<f64> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

/// Estimate the tone frequency of a 16-bit WAV between two offsets
///
/// Channels are averaged, then zero crossings are counted.
pub fn tone_frequency(path: &Path, from_seconds: f64, to_seconds: f64) -> anyhow::Result<f64> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    let samples: Vec<i16> = reader.samples::<i16>().collect::<Result<_, _>>()?;

    let rate = spec.sample_rate as f64;
    let first = (from_seconds * rate) as usize;
    let last = ((to_seconds * rate) as usize).min(samples.len() / channels);
    anyhow::ensure!(first < last, "window {}..{} is outside the file", from_seconds, to_seconds);

    let mono: Vec<f64> = (first..last)
        .map(|frame| {
            let base = frame * channels;
            samples[base..base + channels].iter().map(|&s| s as f64).sum::<f64>() / channels as f64
        })
        .collect();

    let crossings = mono
        .windows(2)
        .filter(|w| (w[0] < 0.0 && w[1] >= 0.0) || (w[0] >= 0.0 && w[1] < 0.0))
        .count();
    Ok(crossings as f64 / (2.0 * (last - first) as f64 / rate))
}
