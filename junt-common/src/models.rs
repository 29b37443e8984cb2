//! Domain models shared between the montage service and its clients
//!
//! Album descriptors come from the catalog collaborator; job and track
//! states are the two state machines driven by the job orchestrator.

use serde::{Deserialize, Serialize};

/// One track of a release as reported by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// 1-based position within the release
    pub number: u32,
    pub title: String,
    /// Track length in seconds, if the catalog knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
}

/// Release metadata handed to the pipeline by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumDescriptor {
    /// Catalog identifier (MusicBrainz release id)
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    pub tracks: Vec<TrackInfo>,
}

/// Montage length preset chosen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationPreset {
    Short,
    Medium,
    Long,
}

impl DurationPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationPreset::Short => "short",
            DurationPreset::Medium => "medium",
            DurationPreset::Long => "long",
        }
    }
}

impl std::str::FromStr for DurationPreset {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(DurationPreset::Short),
            "medium" => Ok(DurationPreset::Medium),
            "long" => Ok(DurationPreset::Long),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown duration preset: {}",
                other
            ))),
        }
    }
}

/// Job lifecycle: `queued → processing → {completed | failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    /// Completed and Failed are absorbing
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: JobState) -> bool {
        match (self, next) {
            (JobState::Queued, JobState::Processing) => true,
            (JobState::Queued, JobState::Failed) => true,
            (JobState::Processing, JobState::Completed) => true,
            (JobState::Processing, JobState::Failed) => true,
            _ => false,
        }
    }
}

/// Per-track lifecycle: `pending → downloading → analyzing → {complete | failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    Pending,
    Downloading,
    Analyzing,
    Complete,
    Failed,
}

impl TrackState {
    fn rank(&self) -> u8 {
        match self {
            TrackState::Pending => 0,
            TrackState::Downloading => 1,
            TrackState::Analyzing => 2,
            TrackState::Complete | TrackState::Failed => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackState::Complete | TrackState::Failed)
    }

    /// Forward-only: a track may fail from any non-terminal state, but
    /// only an analyzing track may complete.
    pub fn can_transition_to(&self, next: TrackState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            TrackState::Complete => *self == TrackState::Analyzing,
            TrackState::Failed => true,
            _ => next.rank() == self.rank() + 1,
        }
    }
}

/// Status of one track inside a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackStatus {
    pub track_number: u32,
    pub track_title: String,
    pub status: TrackState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrackStatus {
    pub fn pending(track: &TrackInfo) -> Self {
        Self {
            track_number: track.number,
            track_title: track.title.clone(),
            status: TrackState::Pending,
            error: None,
        }
    }

    /// Apply a transition; returns false (and leaves the status untouched)
    /// when the transition would skip or regress.
    pub fn advance(&mut self, next: TrackState) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        true
    }

    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if !self.advance(TrackState::Failed) {
            return false;
        }
        self.error = Some(error.into());
        true
    }
}

/// A finished per-track clip kept as a deliverable (per-track persistence mode)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackArtifact {
    pub track_number: u32,
    pub track_title: String,
    pub file_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_state_forward_only() {
        use TrackState::*;
        assert!(Pending.can_transition_to(Downloading));
        assert!(Downloading.can_transition_to(Analyzing));
        assert!(Analyzing.can_transition_to(Complete));
        assert!(Downloading.can_transition_to(Failed));

        // No skips
        assert!(!Pending.can_transition_to(Analyzing));
        assert!(!Downloading.can_transition_to(Complete));
        // No regressions
        assert!(!Analyzing.can_transition_to(Downloading));
        assert!(!Complete.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Pending));
    }

    #[test]
    fn test_track_status_fail_records_error_once() {
        let info = TrackInfo {
            number: 4,
            title: "Song".to_string(),
            duration_seconds: None,
        };
        let mut status = TrackStatus::pending(&info);
        assert!(status.advance(TrackState::Downloading));
        assert!(status.fail("no results"));
        assert_eq!(status.status, TrackState::Failed);
        assert_eq!(status.error.as_deref(), Some("no results"));

        assert!(!status.fail("second failure"));
        assert_eq!(status.error.as_deref(), Some("no results"));
    }

    #[test]
    fn test_job_state_terminal_is_absorbing() {
        assert!(JobState::Queued.can_transition_to(JobState::Processing));
        assert!(JobState::Processing.can_transition_to(JobState::Completed));
        assert!(!JobState::Completed.can_transition_to(JobState::Failed));
        assert!(!JobState::Failed.can_transition_to(JobState::Completed));
        assert!(!JobState::Processing.can_transition_to(JobState::Queued));
    }

    #[test]
    fn test_duration_preset_parse() {
        assert_eq!("Medium".parse::<DurationPreset>().unwrap(), DurationPreset::Medium);
        assert!("epic".parse::<DurationPreset>().is_err());

        let json = serde_json::to_string(&DurationPreset::Long).unwrap();
        assert_eq!(json, "\"long\"");
    }
}
