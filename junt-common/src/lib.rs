//! # Junt Common Library
//!
//! Shared code for the Junt montage service:
//! - Domain models (album descriptors, job and track states)
//! - Progress event union (MontageEvent)
//! - Configuration loading and root folder resolution
//! - Fade curve definitions used by the crossfade assembler
//! - SSE helpers

pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;
pub mod models;
pub mod sse;

pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
