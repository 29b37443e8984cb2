//! Clip extraction, loudness normalization and montage assembly
//!
//! Every clip is written in one canonical format (44.1 kHz stereo 16-bit
//! WAV) so assembly only has to concatenate and crossfade.

use anyhow::{anyhow, bail, Context, Result};
use junt_common::models::DurationPreset;
use junt_common::FadeCurve;
use std::path::{Path, PathBuf};

use crate::services::loudness;
use crate::utils::audio_decoder::{self, DecodedAudio};
use crate::utils::resampler;
use crate::utils::wav::{self, CLIP_CHANNELS, CLIP_SAMPLE_RATE};

/// Track length assumed when the catalog has no duration (seconds)
pub const FALLBACK_TRACK_SECONDS: f64 = 180.0;
/// Shortest clip taken from a track of known length (seconds)
pub const MIN_CLIP_SECONDS: f64 = 3.0;
/// Longest clip taken from a track of known length (seconds)
pub const MAX_CLIP_SECONDS: f64 = 60.0;
/// Default loudness target (LUFS)
pub const DEFAULT_TARGET_LUFS: f64 = -14.0;

/// How much of each track goes into the montage, and how clips overlap
///
/// | Preset | Clip share | Crossfade |
/// |--------|-----------|-----------|
/// | short  | 10%       | 0.30 s    |
/// | medium | 20%       | 0.50 s    |
/// | long   | 30%       | 0.75 s    |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPolicy {
    pub clip_percentage: f64,
    pub crossfade_seconds: f64,
}

impl ClipPolicy {
    pub fn for_preset(preset: DurationPreset) -> Self {
        let (clip_percentage, crossfade_seconds) = match preset {
            DurationPreset::Short => (0.10, 0.3),
            DurationPreset::Medium => (0.20, 0.5),
            DurationPreset::Long => (0.30, 0.75),
        };
        Self {
            clip_percentage,
            crossfade_seconds,
        }
    }

    /// Clip length for a track under this policy
    pub fn clip_duration(&self, track_duration: Option<f64>) -> f64 {
        clip_duration(track_duration, self.clip_percentage, FALLBACK_TRACK_SECONDS)
    }
}

/// Clip length for a track
///
/// A known positive duration gives `clamp(duration * percentage, 3, 60)`;
/// otherwise `fallback * percentage` (unclamped).
pub fn clip_duration(track_duration: Option<f64>, percentage: f64, fallback: f64) -> f64 {
    match track_duration.filter(|d| *d > 0.0) {
        Some(duration) => (duration * percentage).clamp(MIN_CLIP_SECONDS, MAX_CLIP_SECONDS),
        None => fallback * percentage,
    }
}

/// Result of a normalization attempt; failures leave the clip untouched
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeOutcome {
    Normalized { measured_lufs: f64, gain: f64 },
    Unchanged { reason: String },
}

/// Clip extraction, normalization and assembly
#[derive(Debug, Clone)]
pub struct ClipProcessor {
    target_lufs: f64,
    curve: FadeCurve,
}

impl Default for ClipProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_LUFS, FadeCurve::default())
    }
}

impl ClipProcessor {
    pub fn new(target_lufs: f64, curve: FadeCurve) -> Self {
        Self { target_lufs, curve }
    }

    pub fn target_lufs(&self) -> f64 {
        self.target_lufs
    }

    /// Slice `[start, end)` seconds out of `source` into a canonical WAV clip
    pub async fn extract(&self, source: &Path, start: f64, end: f64, out: &Path) -> Result<PathBuf> {
        let source = source.to_path_buf();
        let out = out.to_path_buf();
        tokio::task::spawn_blocking(move || {
            extract_blocking(&source, start, end, &out)?;
            Ok(out)
        })
        .await
        .map_err(|e| anyhow!("Extraction task failed: {}", e))?
    }

    /// Rescale a clip in place to the target loudness
    pub async fn normalize(&self, clip: &Path) -> NormalizeOutcome {
        let path = clip.to_path_buf();
        let target = self.target_lufs;
        let result = tokio::task::spawn_blocking(move || normalize_blocking(&path, target))
            .await
            .map_err(|e| anyhow!("Normalization task failed: {}", e))
            .and_then(|r| r);

        match result {
            Ok((measured_lufs, gain)) => {
                tracing::debug!(
                    path = %clip.display(),
                    measured_lufs = format!("{:.2}", measured_lufs),
                    gain = format!("{:.3}", gain),
                    "Clip normalized"
                );
                NormalizeOutcome::Normalized { measured_lufs, gain }
            }
            Err(e) => {
                tracing::warn!(
                    path = %clip.display(),
                    error = %e,
                    "Normalization failed, keeping clip unmodified"
                );
                NormalizeOutcome::Unchanged {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Concatenate clips in order with a crossfade between each pair
    ///
    /// Always rebuilds the whole output and replaces `out` atomically.
    pub async fn assemble(&self, ordered: Vec<PathBuf>, out: &Path, crossfade_seconds: f64) -> Result<PathBuf> {
        let out = out.to_path_buf();
        let curve = self.curve;
        tokio::task::spawn_blocking(move || {
            assemble_blocking(&ordered, &out, crossfade_seconds, curve)?;
            Ok(out)
        })
        .await
        .map_err(|e| anyhow!("Assembly task failed: {}", e))?
    }

    /// Best-effort delete of ephemeral files
    pub async fn cleanup_clips(&self, paths: &[PathBuf]) {
        for path in paths {
            match tokio::fs::remove_file(path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed clip"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove clip"),
            }
        }
    }
}

/// Decode any input and convert it to the canonical clip layout
fn load_canonical(path: &Path) -> Result<Vec<f32>> {
    let decoded = audio_decoder::decode_audio_file(path)?;
    to_canonical(&decoded)
}

fn to_canonical(decoded: &DecodedAudio) -> Result<Vec<f32>> {
    let remapped = resampler::remap_channels(&decoded.samples, decoded.channels, CLIP_CHANNELS);
    resampler::resample(&remapped, decoded.sample_rate, CLIP_SAMPLE_RATE, CLIP_CHANNELS)
}

fn extract_blocking(source: &Path, start: f64, end: f64, out: &Path) -> Result<()> {
    if end.is_nan() || end <= start {
        bail!("Invalid clip range {:.2}..{:.2}", start, end);
    }

    let decoded = audio_decoder::decode_audio_file(source)
        .with_context(|| format!("Failed to decode {}", source.display()))?;

    let sr = decoded.sample_rate as f64;
    let frames = decoded.frames();
    let first = ((start.max(0.0) * sr) as usize).min(frames);
    let last = ((end * sr) as usize).min(frames);
    if last <= first {
        bail!(
            "Clip range {:.2}..{:.2}s is outside the {:.2}s source",
            start,
            end,
            decoded.duration_seconds
        );
    }

    let slice = DecodedAudio {
        samples: decoded.samples[first * decoded.channels..last * decoded.channels].to_vec(),
        sample_rate: decoded.sample_rate,
        channels: decoded.channels,
        duration_seconds: (last - first) as f64 / sr,
    };

    let samples = to_canonical(&slice)?;
    wav::write_wav(out, &samples, CLIP_SAMPLE_RATE, CLIP_CHANNELS)
}

fn normalize_blocking(clip: &Path, target_lufs: f64) -> Result<(f64, f64)> {
    let decoded = audio_decoder::decode_audio_file(clip)?;
    let measured = loudness::integrated_loudness(&decoded.samples, decoded.sample_rate, decoded.channels)?;
    if !measured.is_finite() {
        bail!("Loudness measurement was not finite");
    }

    let gain = loudness::normalization_gain(measured, target_lufs);
    let scaled: Vec<f32> = decoded.samples.iter().map(|s| s * gain as f32).collect();
    wav::write_wav(clip, &scaled, decoded.sample_rate, decoded.channels)?;

    Ok((measured, gain))
}

fn assemble_blocking(ordered: &[PathBuf], out: &Path, crossfade_seconds: f64, curve: FadeCurve) -> Result<()> {
    if ordered.is_empty() {
        bail!("No clips to assemble");
    }

    let crossfade_frames = (crossfade_seconds.max(0.0) * CLIP_SAMPLE_RATE as f64).round() as usize;
    let mut montage: Vec<f32> = Vec::new();

    for path in ordered {
        let clip = load_canonical(path).with_context(|| format!("Failed to load clip {}", path.display()))?;
        if montage.is_empty() {
            montage = clip;
            continue;
        }

        let montage_frames = montage.len() / CLIP_CHANNELS;
        let clip_frames = clip.len() / CLIP_CHANNELS;
        let overlap = crossfade_frames.min(montage_frames).min(clip_frames) * CLIP_CHANNELS;

        let tail_start = montage.len() - overlap;
        let mixed = curve.mix(&montage[tail_start..], &clip[..overlap], CLIP_CHANNELS);
        montage.truncate(tail_start);
        montage.extend_from_slice(&mixed);
        montage.extend_from_slice(&clip[overlap..]);
    }

    wav::write_wav(out, &montage, CLIP_SAMPLE_RATE, CLIP_CHANNELS)?;

    tracing::info!(
        path = %out.display(),
        clips = ordered.len(),
        duration_seconds = format!("{:.2}", montage.len() as f64 / (CLIP_SAMPLE_RATE as f64 * CLIP_CHANNELS as f64)),
        "Montage assembled"
    );

    Ok(())
}
