//! Fade curve implementations for crossfading
//!
//! The montage assembler overlaps the tail of one clip with the head of the
//! next; the curve decides how the two gains move across that overlap.

use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};

/// Fade curve types for crossfading
///
/// - Linear: Constant rate of change (gains always sum to 1.0)
/// - EqualPower: Constant perceived loudness during the overlap
/// - SCurve: Smooth acceleration and deceleration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// v(t) = t
    Linear,

    /// v(t) = sin(t × π/2)
    #[default]
    EqualPower,

    /// v(t) = 0.5 × (1 - cos(π × t))
    SCurve,
}

impl FadeCurve {
    /// Fade-in multiplier at normalized position (0.0 = start of fade, 1.0 = end)
    pub fn calculate_fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
            FadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
        }
    }

    /// Fade-out multiplier at normalized position (1.0 at start, 0.0 at end)
    pub fn calculate_fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
            FadeCurve::SCurve => 0.5 * (1.0 + (PI * t).cos()),
        }
    }

    /// Mix an outgoing tail with an incoming head of equal frame count
    ///
    /// Both slices are interleaved with `channels` samples per frame. Returns
    /// the mixed overlap, same length as the inputs.
    pub fn mix(&self, outgoing: &[f32], incoming: &[f32], channels: usize) -> Vec<f32> {
        let len = outgoing.len().min(incoming.len());
        let channels = channels.max(1);
        let frames = len / channels;
        let mut mixed = Vec::with_capacity(frames * channels);

        for frame in 0..frames {
            // Position runs 0.0 → 1.0 across the overlap, inclusive of both ends
            let position = if frames > 1 {
                frame as f32 / (frames - 1) as f32
            } else {
                0.5
            };
            let out_gain = self.calculate_fade_out(position);
            let in_gain = self.calculate_fade_in(position);

            for ch in 0..channels {
                let idx = frame * channels + ch;
                mixed.push(outgoing[idx] * out_gain + incoming[idx] * in_gain);
            }
        }

        mixed
    }

    /// Parse curve from a config string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(FadeCurve::Linear),
            "equal_power" | "equalpower" => Some(FadeCurve::EqualPower),
            "cosine" | "scurve" | "s-curve" | "s_curve" => Some(FadeCurve::SCurve),
            _ => None,
        }
    }

    pub fn all_variants() -> &'static [FadeCurve] {
        &[FadeCurve::Linear, FadeCurve::EqualPower, FadeCurve::SCurve]
    }
}

impl std::fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FadeCurve::Linear => "Linear",
            FadeCurve::EqualPower => "Equal Power",
            FadeCurve::SCurve => "S-Curve",
        };
        write!(f, "{}", name)
    }
}
