//! Peak-energy window detection
//!
//! Finds the most energetic stretch of a track so the clip carries the
//! chorus or drop rather than the intro.
//!
//! **Algorithm:**
//! 1. Decode to mono at 22 050 Hz
//! 2. Drop the first and last 10% (intro/outro) unless nothing would remain
//! 3. RMS envelope over 2048-sample frames, 512-sample hop
//! 4. Moving-average smoothing, window `min(50, frames / 4)`
//! 5. Slide a clip-length window over the envelope; first maximum wins
//! 6. Map back to seconds, clamp to the file

use std::path::{Path, PathBuf};

use crate::utils::{audio_decoder, resampler};

/// Analysis sample rate (Hz)
pub const ANALYSIS_SAMPLE_RATE: u32 = 22050;
/// RMS frame length in samples
pub const FRAME_LENGTH: usize = 2048;
/// RMS hop length in samples
pub const HOP_LENGTH: usize = 512;
/// Maximum smoothing window (frames)
const MAX_SMOOTHING_FRAMES: usize = 50;
/// Start offset used when not even the duration is known (seconds)
pub const DEFAULT_FALLBACK_OFFSET: f64 = 30.0;

/// Selected excerpt in seconds from the start of the track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakWindow {
    pub start: f64,
    pub end: f64,
}

impl PeakWindow {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Peak-energy window detector
#[derive(Debug, Clone, Default)]
pub struct AnalyzerEngine;

impl AnalyzerEngine {
    pub fn new() -> Self {
        Self
    }

    /// Locate the most energetic `clip_duration`-second window of a track
    ///
    /// Never fails: decode errors fall back to the 35%–65% band of the track,
    /// and to a fixed offset when the duration is unknown too.
    pub async fn find_peak_window(&self, audio_path: &Path, clip_duration: f64) -> PeakWindow {
        let path: PathBuf = audio_path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || analyze_file(&path, clip_duration)).await;

        match result {
            Ok(Ok(window)) => window,
            Ok(Err(e)) => {
                tracing::warn!(
                    path = %audio_path.display(),
                    error = %e,
                    "Peak analysis failed, using heuristic window"
                );
                fallback_window(audio_path, clip_duration).await
            }
            Err(e) => {
                tracing::warn!(
                    path = %audio_path.display(),
                    error = %e,
                    "Peak analysis task panicked, using heuristic window"
                );
                fallback_window(audio_path, clip_duration).await
            }
        }
    }
}

fn analyze_file(path: &Path, clip_duration: f64) -> anyhow::Result<PeakWindow> {
    let decoded = audio_decoder::decode_audio_file(path)?;
    let mono = decoded.to_mono();
    let samples = resampler::resample(&mono, decoded.sample_rate, ANALYSIS_SAMPLE_RATE, 1)?;
    if samples.is_empty() {
        anyhow::bail!("No audio samples decoded");
    }

    let window = locate_peak(&samples, ANALYSIS_SAMPLE_RATE, clip_duration);
    tracing::debug!(
        path = %path.display(),
        start = format!("{:.2}", window.start),
        end = format!("{:.2}", window.end),
        "Peak window located"
    );
    Ok(window)
}

/// Core detector over mono samples at `sample_rate`
pub fn locate_peak(samples: &[f32], sample_rate: u32, clip_duration: f64) -> PeakWindow {
    let sr = sample_rate as f64;
    let total_duration = samples.len() as f64 / sr;

    let mut margin = samples.len() / 10;
    if margin * 2 >= samples.len() {
        margin = 0;
    }
    let core = &samples[margin..samples.len() - margin];
    let margin_seconds = margin as f64 / sr;

    let envelope = smooth(&rms_envelope(core, FRAME_LENGTH, HOP_LENGTH));
    let window_frames = ((clip_duration * sr / HOP_LENGTH as f64).floor() as usize).max(1);

    if window_frames >= envelope.len() {
        let start = margin_seconds.min(total_duration);
        let end = (start + clip_duration).min(total_duration);
        return PeakWindow { start, end };
    }

    let best_start = best_window_start(&envelope, window_frames);

    let mut start = margin_seconds + (best_start * HOP_LENGTH) as f64 / sr;
    let mut end = start + clip_duration;
    if end > total_duration {
        end = total_duration;
        start = (end - clip_duration).max(0.0);
    }

    PeakWindow { start, end }
}

/// Centered short-time RMS; the signal is zero-padded by half a frame on each side
fn rms_envelope(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let pad = frame_length / 2;
    let frame_count = 1 + samples.len() / hop_length;
    let mut envelope = Vec::with_capacity(frame_count);

    for frame in 0..frame_count {
        let center = frame * hop_length;
        let lo = center.saturating_sub(pad);
        let hi = (center + frame_length - pad).min(samples.len());
        let sum_sq: f64 = samples[lo..hi].iter().map(|s| (*s as f64) * (*s as f64)).sum();
        envelope.push((sum_sq / frame_length as f64).sqrt() as f32);
    }

    envelope
}

/// Moving-average smoothing with mirrored edges
fn smooth(envelope: &[f32]) -> Vec<f32> {
    let size = MAX_SMOOTHING_FRAMES.min(envelope.len() / 4);
    if size == 0 {
        return envelope.to_vec();
    }

    let n = envelope.len() as isize;
    let reflect = |i: isize| -> f32 {
        // Half-sample symmetric: d c b a | a b c d | d c b a
        let mut i = i;
        while i < 0 || i >= n {
            i = if i < 0 { -i - 1 } else { 2 * n - i - 1 };
        }
        envelope[i as usize]
    };

    let left = (size / 2) as isize;
    let right = size as isize - left - 1;
    (0..n)
        .map(|i| {
            let sum: f32 = (i - left..=i + right).map(reflect).sum();
            sum / size as f32
        })
        .collect()
}

/// Start index of the highest-mean window; ties keep the earliest
///
/// Prefix sums carry rounding noise, so a later window must beat the
/// current best by a relative margin to count as higher.
fn best_window_start(envelope: &[f32], window_frames: usize) -> usize {
    let mut prefix = Vec::with_capacity(envelope.len() + 1);
    prefix.push(0.0f64);
    for value in envelope {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + *value as f64);
    }

    let mut best_start = 0;
    let mut max_energy = 0.0f64;
    for i in 0..=(envelope.len() - window_frames) {
        let energy = (prefix[i + window_frames] - prefix[i]) / window_frames as f64;
        if energy > max_energy * (1.0 + 1e-9) {
            max_energy = energy;
            best_start = i;
        }
    }
    best_start
}

/// Heuristic window when analysis fails
async fn fallback_window(path: &Path, clip_duration: f64) -> PeakWindow {
    let probe_path = path.to_path_buf();
    let duration = tokio::task::spawn_blocking(move || audio_decoder::probe_duration(&probe_path))
        .await
        .ok()
        .flatten();

    heuristic_window(duration, clip_duration)
}

/// Middle-band window for a known duration, fixed offset otherwise
pub fn heuristic_window(duration: Option<f64>, clip_duration: f64) -> PeakWindow {
    match duration.filter(|d| *d > 0.0) {
        Some(duration) => {
            let start = duration * 0.35;
            let end = (start + clip_duration).min(duration * 0.65);
            PeakWindow { start, end }
        }
        None => PeakWindow {
            start: DEFAULT_FALLBACK_OFFSET,
            end: DEFAULT_FALLBACK_OFFSET + clip_duration,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = ANALYSIS_SAMPLE_RATE;

    /// Quiet tone with a loud burst between `loud_from` and `loud_to` seconds
    fn burst_signal(seconds: f64, loud_from: f64, loud_to: f64) -> Vec<f32> {
        let n = (seconds * SR as f64) as usize;
        (0..n)
            .map(|i| {
                let t = i as f64 / SR as f64;
                let amp = if t >= loud_from && t < loud_to { 0.9 } else { 0.05 };
                (amp * (2.0 * std::f64::consts::PI * 220.0 * t).sin()) as f32
            })
            .collect()
    }

    #[test]
    fn test_finds_loud_section() {
        let samples = burst_signal(120.0, 70.0, 85.0);
        let window = locate_peak(&samples, SR, 10.0);

        assert!((window.duration() - 10.0).abs() < 1e-6);
        assert!(window.start >= 68.0 && window.end <= 87.0, "window {:?}", window);
    }

    #[test]
    fn test_clip_longer_than_file_stays_in_bounds() {
        let samples = burst_signal(8.0, 2.0, 4.0);
        let duration = samples.len() as f64 / SR as f64;
        let window = locate_peak(&samples, SR, 30.0);

        assert!(window.start >= 0.0);
        assert!(window.end <= duration + 1e-9);
        assert!(window.start <= window.end);
        // Anchored at the 10% margin
        assert!((window.start - duration * 0.1).abs() < 0.01);
    }

    #[test]
    fn test_window_keeps_requested_length() {
        // Loudest part runs into the trimmed outro
        let samples = burst_signal(60.0, 50.0, 60.0);
        let window = locate_peak(&samples, SR, 20.0);

        assert!(window.end <= 60.0 + 1e-9);
        assert!((window.duration() - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_flat_signal_first_window_wins() {
        let samples = vec![0.5f32; SR as usize * 40];
        let window = locate_peak(&samples, SR, 5.0);
        // Constant envelope: an early offset just after the 4s margin
        assert!(window.start >= 4.0 && window.start < 5.0, "window {:?}", window);
    }

    #[test]
    fn test_smoothing_skipped_for_tiny_envelopes() {
        let env = vec![1.0, 2.0, 3.0];
        assert_eq!(smooth(&env), env);

        let env = vec![1.0f32; 40];
        assert!(smooth(&env).iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_heuristic_window() {
        let w = heuristic_window(Some(200.0), 20.0);
        assert!((w.start - 70.0).abs() < 1e-9);
        assert!((w.end - 90.0).abs() < 1e-9);

        // Capped at 65% of the track
        let w = heuristic_window(Some(100.0), 60.0);
        assert!((w.end - 65.0).abs() < 1e-9);

        let w = heuristic_window(None, 12.0);
        assert_eq!(w, PeakWindow { start: 30.0, end: 42.0 });
    }

    #[tokio::test]
    async fn test_missing_file_falls_back() {
        let engine = AnalyzerEngine::new();
        let window = engine
            .find_peak_window(Path::new("/nonexistent/track.mp3"), 15.0)
            .await;
        assert_eq!(window, PeakWindow { start: 30.0, end: 45.0 });
    }
}
