//! WAV output via hound
//!
//! Clips and montages are written as 16-bit PCM. Writes go to a sibling
//! `.part` file that is renamed over the target once finalized, so readers
//! never see a half-written file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Canonical clip format: 44.1 kHz stereo
pub const CLIP_SAMPLE_RATE: u32 = 44100;
pub const CLIP_CHANNELS: usize = 2;

fn part_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Write interleaved f32 samples as a 16-bit PCM WAV file, replacing `path`
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32, channels: usize) -> Result<()> {
    let spec = hound::WavSpec {
        channels: channels as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let tmp = part_path(path);
    let result = (|| -> Result<()> {
        let mut writer = hound::WavWriter::create(&tmp, spec)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        for sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer.write_sample(value)?;
        }
        writer.finalize().context("Failed to finalize WAV")?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }

    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move WAV into place: {}", path.display()))?;

    tracing::debug!(
        path = %path.display(),
        frames = samples.len() / channels.max(1),
        "Wrote WAV file"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        std::fs::write(&path, b"stale").unwrap();

        write_wav(&path, &[0.0, 0.5, -0.5, 1.0], 44100, 2).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.len(), 4);
        assert!(!part_path(&path).exists());
    }

    #[test]
    fn test_part_path_is_sibling() {
        let p = part_path(Path::new("/tmp/x/job_montage.wav"));
        assert_eq!(p, PathBuf::from("/tmp/x/job_montage.wav.part"));
    }
}
