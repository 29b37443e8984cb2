//! Finished-montage handoff and saved library entries

use chrono::{DateTime, Utc};
use junt_common::models::{AlbumDescriptor, DurationPreset, TrackArtifact};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the pipeline hands to persistence when a job completes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedMontage {
    pub job_id: Uuid,
    pub album: AlbumDescriptor,
    pub duration: DurationPreset,
    /// Final montage (montage persistence mode)
    pub file_path: Option<String>,
    /// Kept clips (per-track persistence mode)
    pub track_files: Vec<TrackArtifact>,
}

/// A montage stored in the library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedMontage {
    pub id: Uuid,
    pub job_id: Uuid,
    pub album: AlbumDescriptor,
    pub duration: DurationPreset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default)]
    pub track_files: Vec<TrackArtifact>,
    pub created_at: DateTime<Utc>,
}
