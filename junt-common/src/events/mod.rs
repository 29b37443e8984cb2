//! Progress event types for montage jobs
//!
//! Every observer of a job (WebSocket, SSE, in-process subscriber) receives
//! the same closed set of events. On the wire an event is
//! `{"type": "<kind>", "data": {...}}`.

use serde::{Deserialize, Serialize};

use crate::models::{AlbumDescriptor, JobState, TrackArtifact, TrackStatus};

/// Montage job progress event
///
/// Events are delivered at most once to each subscriber registered at the
/// time of emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MontageEvent {
    /// Job or track state moved forward
    ///
    /// Emitted when the job starts processing, when the track list is known
    /// and whenever a track enters a new stage.
    Progress(ProgressData),

    /// A track produced its clip
    TrackComplete {
        track_number: u32,
        track_title: String,
        /// Tracks completed so far
        completed: usize,
        total: usize,
        /// completed / total
        progress: f64,
    },

    /// A playable montage of the first finished tracks exists
    ///
    /// Emitted at most once per job.
    PartialReady {
        file_path: String,
        tracks_ready: usize,
        total_tracks: usize,
        message: String,
    },

    /// A track failed (track_number set) or the whole job failed (terminal)
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        track_number: Option<u32>,
        message: String,
    },

    /// Job completed; terminal
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        track_files: Vec<TrackArtifact>,
        /// Number of tracks that made it into the montage
        total_tracks: usize,
        errors: Vec<String>,
    },
}

/// Payload of a `progress` event; only the fields relevant to the update are set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tracks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<AlbumDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_track: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_status: Option<TrackStatus>,
}

impl MontageEvent {
    /// Wire name of the event kind (used as the SSE event name)
    pub fn event_type(&self) -> &'static str {
        match self {
            MontageEvent::Progress(_) => "progress",
            MontageEvent::TrackComplete { .. } => "track_complete",
            MontageEvent::PartialReady { .. } => "partial_ready",
            MontageEvent::Error { .. } => "error",
            MontageEvent::Done { .. } => "done",
        }
    }

    /// Terminal events end a job's stream
    pub fn is_terminal(&self) -> bool {
        match self {
            MontageEvent::Done { .. } => true,
            MontageEvent::Error { track_number, .. } => track_number.is_none(),
            _ => false,
        }
    }

    pub fn job_status(status: JobState) -> Self {
        MontageEvent::Progress(ProgressData {
            status: Some(status),
            ..Default::default()
        })
    }

    pub fn track_stage(current_track: u32, track_status: TrackStatus) -> Self {
        MontageEvent::Progress(ProgressData {
            current_track: Some(current_track),
            track_status: Some(track_status),
            ..Default::default()
        })
    }

    pub fn job_failed(message: impl Into<String>) -> Self {
        MontageEvent::Error {
            track_number: None,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackState;

    #[test]
    fn test_event_wire_shape() {
        let event = MontageEvent::TrackComplete {
            track_number: 2,
            track_title: "Second".to_string(),
            completed: 1,
            total: 4,
            progress: 0.25,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "track_complete");
        assert_eq!(json["data"]["track_number"], 2);
        assert_eq!(json["data"]["progress"], 0.25);
    }

    #[test]
    fn test_progress_omits_unset_fields() {
        let json = serde_json::to_value(MontageEvent::job_status(JobState::Processing)).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["data"]["status"], "processing");
        assert!(json["data"].get("album").is_none());
        assert!(json["data"].get("track_status").is_none());
    }

    #[test]
    fn test_track_stage_carries_status() {
        let status = TrackStatus {
            track_number: 3,
            track_title: "Third".to_string(),
            status: TrackState::Analyzing,
            error: None,
        };
        let json = serde_json::to_value(MontageEvent::track_stage(3, status)).unwrap();
        assert_eq!(json["data"]["current_track"], 3);
        assert_eq!(json["data"]["track_status"]["status"], "analyzing");
    }

    #[test]
    fn test_terminal_events() {
        assert!(MontageEvent::job_failed("boom").is_terminal());
        assert!(!MontageEvent::Error {
            track_number: Some(1),
            message: "download failed".to_string()
        }
        .is_terminal());
        assert!(MontageEvent::Done {
            file_path: Some("x.wav".to_string()),
            track_files: Vec::new(),
            total_tracks: 3,
            errors: Vec::new(),
        }
        .is_terminal());
    }

    #[test]
    fn test_event_round_trip_through_json() {
        let event = MontageEvent::PartialReady {
            file_path: "temp/j_montage.wav".to_string(),
            tracks_ready: 3,
            total_tracks: 10,
            message: "First 3 tracks ready".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: MontageEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
