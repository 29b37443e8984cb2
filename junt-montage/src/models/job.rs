//! Montage job state
//!
//! A job moves `queued → processing → {completed | failed}`; the terminal
//! state is set at most once. The track list is sized once from the album
//! and never resized.

use chrono::{DateTime, Utc};
use junt_common::models::{
    AlbumDescriptor, DurationPreset, JobState, TrackArtifact, TrackState, TrackStatus,
};
use junt_common::events::MontageEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Montage job (in-memory state)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,

    /// Catalog id the job was created for
    pub album_id: String,

    pub duration: DurationPreset,

    pub status: JobState,

    /// completed_tracks / total_tracks (0.0 until the album is known)
    pub progress: f64,

    /// Track most recently touched by the pipeline
    pub current_track: Option<u32>,

    pub total_tracks: usize,

    /// Tracks that produced a clip
    pub completed_tracks: usize,

    /// One entry per album track, in album order
    pub track_statuses: Vec<TrackStatus>,

    /// Accumulated per-track and job-level errors
    pub errors: Vec<String>,

    /// Current playable artifact (partial montage, then the final one)
    pub file_path: Option<String>,

    /// Kept per-track clips (per-track persistence mode)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub track_files: Vec<TrackArtifact>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<AlbumDescriptor>,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(album_id: impl Into<String>, duration: DurationPreset) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            album_id: album_id.into(),
            duration,
            status: JobState::Queued,
            progress: 0.0,
            current_track: None,
            total_tracks: 0,
            completed_tracks: 0,
            track_statuses: Vec::new(),
            errors: Vec::new(),
            file_path: None,
            track_files: Vec::new(),
            album: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to `next`; returns false for an illegal or repeated transition
    pub fn transition_to(&mut self, next: JobState) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::debug!(
                job_id = %self.job_id,
                from = ?self.status,
                to = ?next,
                "Ignoring illegal job transition"
            );
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Size the track list from the album; only the first call has effect
    pub fn init_tracks(&mut self, album: &AlbumDescriptor) -> bool {
        if !self.track_statuses.is_empty() || self.total_tracks > 0 {
            return false;
        }
        self.total_tracks = album.tracks.len();
        self.track_statuses = album.tracks.iter().map(TrackStatus::pending).collect();
        self.album = Some(album.clone());
        true
    }

    /// Advance track `index` (album order) to `next`
    ///
    /// Returns the updated status when the transition was legal.
    pub fn advance_track(&mut self, index: usize, next: TrackState) -> Option<TrackStatus> {
        let status = self.track_statuses.get_mut(index)?;
        if !status.advance(next) {
            return None;
        }
        self.current_track = Some(status.track_number);
        let snapshot = status.clone();

        if next == TrackState::Complete {
            self.completed_tracks = (self.completed_tracks + 1).min(self.total_tracks);
            self.recompute_progress();
        }
        Some(snapshot)
    }

    /// Mark track `index` failed and record the error on the job
    pub fn fail_track(&mut self, index: usize, message: &str) -> Option<TrackStatus> {
        let status = self.track_statuses.get_mut(index)?;
        if !status.fail(message) {
            return None;
        }
        self.current_track = Some(status.track_number);
        let snapshot = status.clone();
        self.errors.push(format!(
            "Track {} ({}): {}",
            snapshot.track_number, snapshot.track_title, message
        ));
        Some(snapshot)
    }

    /// Finish successfully with the final artifact
    pub fn complete(&mut self, file_path: Option<String>, track_files: Vec<TrackArtifact>) -> bool {
        if !self.transition_to(JobState::Completed) {
            return false;
        }
        self.file_path = file_path;
        self.track_files = track_files;
        self.recompute_progress();
        true
    }

    /// Finish with a job-level error
    pub fn fail(&mut self, message: &str) -> bool {
        if !self.transition_to(JobState::Failed) {
            return false;
        }
        self.errors.push(format!("Job failed: {}", message));
        true
    }

    /// Event replaying how a finished job ended; None while it runs
    pub fn terminal_event(&self) -> Option<MontageEvent> {
        match self.status {
            JobState::Completed => Some(MontageEvent::Done {
                file_path: self.file_path.clone(),
                track_files: self.track_files.clone(),
                total_tracks: self.completed_tracks,
                errors: self.errors.clone(),
            }),
            JobState::Failed => {
                let message = self
                    .errors
                    .iter()
                    .rev()
                    .find_map(|e| e.strip_prefix("Job failed: "))
                    .unwrap_or("Job failed");
                Some(MontageEvent::job_failed(message))
            }
            JobState::Queued | JobState::Processing => None,
        }
    }

    fn recompute_progress(&mut self) {
        self.progress = if self.total_tracks > 0 {
            self.completed_tracks as f64 / self.total_tracks as f64
        } else {
            0.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use junt_common::models::TrackInfo;

    fn album(n: u32) -> AlbumDescriptor {
        AlbumDescriptor {
            id: "rel-1".to_string(),
            title: "Album".to_string(),
            artist: "Artist".to_string(),
            year: Some(1999),
            cover_url: None,
            tracks: (1..=n)
                .map(|i| TrackInfo {
                    number: i,
                    title: format!("Track {}", i),
                    duration_seconds: Some(200),
                })
                .collect(),
        }
    }

    #[test]
    fn test_terminal_state_set_once() {
        let mut job = Job::new("rel-1", DurationPreset::Short);
        assert!(job.transition_to(JobState::Processing));
        assert!(job.fail("catalog unavailable"));
        assert!(!job.complete(Some("x.wav".to_string()), Vec::new()));
        assert!(!job.fail("again"));
        assert_eq!(job.status, JobState::Failed);
        assert_eq!(job.errors.len(), 1);
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_track_list_fixed_after_init() {
        let mut job = Job::new("rel-1", DurationPreset::Medium);
        assert!(job.init_tracks(&album(4)));
        assert!(!job.init_tracks(&album(7)));
        assert_eq!(job.total_tracks, 4);
        assert_eq!(job.track_statuses.len(), 4);
    }

    #[test]
    fn test_progress_tracks_completions() {
        let mut job = Job::new("rel-1", DurationPreset::Long);
        job.transition_to(JobState::Processing);
        job.init_tracks(&album(4));

        for i in 0..2 {
            job.advance_track(i, TrackState::Downloading).unwrap();
            job.advance_track(i, TrackState::Analyzing).unwrap();
            job.advance_track(i, TrackState::Complete).unwrap();
        }
        job.advance_track(2, TrackState::Downloading).unwrap();
        job.fail_track(2, "no results").unwrap();

        assert_eq!(job.completed_tracks, 2);
        assert!((job.progress - 0.5).abs() < 1e-9);
        assert_eq!(job.errors, vec!["Track 3 (Track 3): no results".to_string()]);

        // Skips are rejected
        assert!(job.advance_track(3, TrackState::Complete).is_none());
        assert_eq!(job.completed_tracks, 2);
    }

    #[test]
    fn test_terminal_event_replays_outcome() {
        let mut job = Job::new("rel-1", DurationPreset::Short);
        assert!(job.terminal_event().is_none());

        job.transition_to(JobState::Processing);
        job.fail("Album rel-1 not found");
        assert_eq!(
            job.terminal_event(),
            Some(MontageEvent::job_failed("Album rel-1 not found"))
        );
    }
}
