//! Utility modules for junt-montage

pub mod audio_decoder;
pub mod resampler;
pub mod wav;

pub use audio_decoder::{decode_audio_file, probe_duration, DecodedAudio};
pub use wav::write_wav;
