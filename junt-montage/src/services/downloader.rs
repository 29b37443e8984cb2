//! Track audio download through yt-dlp
//!
//! Searches for `"<artist> <title> audio"`, takes the first hit and
//! extracts its audio track next to the requested stem.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::types::{CollaboratorError, TrackDownloader};

pub const DEFAULT_PROGRAM: &str = "yt-dlp";
pub const DEFAULT_AUDIO_FORMAT: &str = "mp3";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Downloader that shells out to yt-dlp
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    program: String,
    audio_format: String,
    timeout: Duration,
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM, DEFAULT_AUDIO_FORMAT, DEFAULT_TIMEOUT_SECS)
    }
}

impl YtDlpDownloader {
    pub fn new(program: impl Into<String>, audio_format: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            audio_format: audio_format.into(),
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    /// Path yt-dlp produces for `dest_stem` after audio extraction
    pub fn output_path(&self, dest_stem: &Path) -> PathBuf {
        let mut name = dest_stem.as_os_str().to_os_string();
        name.push(".");
        name.push(&self.audio_format);
        PathBuf::from(name)
    }

    fn search_query(artist: &str, title: &str) -> String {
        format!("ytsearch1:{} {} audio", artist, title)
    }

    fn build_args(&self, artist: &str, title: &str, dest_stem: &Path) -> Vec<String> {
        let template = format!("{}.%(ext)s", dest_stem.display());
        vec![
            "--quiet".into(),
            "--no-warnings".into(),
            "--no-playlist".into(),
            "--format".into(),
            "bestaudio/best".into(),
            "--extract-audio".into(),
            "--audio-format".into(),
            self.audio_format.clone(),
            "--audio-quality".into(),
            "192K".into(),
            "--output".into(),
            template,
            Self::search_query(artist, title),
        ]
    }
}

#[async_trait]
impl TrackDownloader for YtDlpDownloader {
    async fn download_track(
        &self,
        artist: &str,
        title: &str,
        dest_stem: &Path,
    ) -> Result<PathBuf, CollaboratorError> {
        if let Some(parent) = dest_stem.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let args = self.build_args(artist, title, dest_stem);
        tracing::debug!(program = %self.program, query = %Self::search_query(artist, title), "Starting download");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CollaboratorError::Process(format!("Failed to start {}: {}", self.program, e)))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => return Err(CollaboratorError::Timeout(self.timeout.as_secs())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollaboratorError::Process(format!(
                "{} exited with {}: {}",
                self.program,
                output.status.code().map_or("signal".to_string(), |c| c.to_string()),
                stderr.trim()
            )));
        }

        let path = self.output_path(dest_stem);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(CollaboratorError::NotFound(format!(
                "No audio downloaded for {} - {}",
                artist, title
            )));
        }

        tracing::info!(artist = %artist, title = %title, path = %path.display(), "Downloaded track");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_and_output_path() {
        let downloader = YtDlpDownloader::default();
        let stem = Path::new("/tmp/job_track_1");
        let args = downloader.build_args("Artist", "Song", stem);

        assert_eq!(args.last().map(String::as_str), Some("ytsearch1:Artist Song audio"));
        assert!(args.contains(&"/tmp/job_track_1.%(ext)s".to_string()));
        assert_eq!(downloader.output_path(stem), PathBuf::from("/tmp/job_track_1.mp3"));
    }

    #[tokio::test]
    async fn test_missing_program_is_process_error() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = YtDlpDownloader::new("definitely-not-a-real-binary-junt", "mp3", 5);
        let err = downloader
            .download_track("a", "b", &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Process(_)));
    }
}
