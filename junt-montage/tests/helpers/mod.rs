//! Shared helpers for junt-montage integration tests

#![allow(dead_code)]

pub mod audio_generator;
pub mod stubs;

pub use audio_generator::{generate_test_wav, tone_frequency, wav_duration, AudioConfig};
pub use stubs::{album, RecordingSink, StubCatalog, StubDownloader};
