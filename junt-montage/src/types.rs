//! Collaborator traits for the montage pipeline
//!
//! The pipeline talks to the outside world only through these traits:
//! - **AlbumCatalog:** release metadata by id (MusicBrainz in production)
//! - **TrackDownloader:** fetches a track's audio to local disk (yt-dlp)
//! - **MontageRepository:** stores saved montages (SQLite)
//! - **UsageStore:** anonymous usage counters (SQLite)
//! - **CompletionSink:** receives finished montages for persistence
//!
//! Tests swap in stubs for each of them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use junt_common::models::AlbumDescriptor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CompletedMontage, SavedMontage, SignalKind, UsageRecord};

/// Collaborator failure
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// I/O error (file read/write)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network request failed
    #[error("Network error: {0}")]
    Network(String),

    /// Remote answered with something we could not use
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// External program failed
    #[error("Process error: {0}")]
    Process(String),

    /// Operation exceeded its time budget
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// Nothing matched the request
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Release metadata provider
///
/// # Example
/// ```rust,ignore
/// let album = catalog.fetch_album("f5093c06-23e3-404f-aeaa-40f72885ee3a").await?;
/// if let Some(album) = album {
///     println!("{} - {} ({} tracks)", album.artist, album.title, album.tracks.len());
/// }
/// ```
#[async_trait]
pub trait AlbumCatalog: Send + Sync {
    /// Fetch a release; `Ok(None)` when the id is unknown
    async fn fetch_album(&self, album_id: &str) -> Result<Option<AlbumDescriptor>, CollaboratorError>;
}

/// Audio source for individual tracks
#[async_trait]
pub trait TrackDownloader: Send + Sync {
    /// Download the best match for `artist` / `title`
    ///
    /// `dest_stem` is the output path without extension; the downloader
    /// picks the extension and returns the final path.
    async fn download_track(
        &self,
        artist: &str,
        title: &str,
        dest_stem: &Path,
    ) -> Result<PathBuf, CollaboratorError>;
}

/// Saved-montage storage
#[async_trait]
pub trait MontageRepository: Send + Sync {
    async fn save(&self, montage: &SavedMontage) -> junt_common::Result<()>;

    /// Newest first
    async fn list(&self, skip: u32, limit: u32) -> junt_common::Result<Vec<SavedMontage>>;

    async fn count(&self) -> junt_common::Result<u64>;

    async fn get(&self, id: Uuid) -> junt_common::Result<Option<SavedMontage>>;

    /// Returns false when nothing was deleted
    async fn delete(&self, id: Uuid) -> junt_common::Result<bool>;
}

/// Usage counters keyed by (signal kind, key)
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Record for `key` whose last activity is at or after `since`
    async fn find_active(
        &self,
        kind: SignalKind,
        key: &str,
        since: DateTime<Utc>,
    ) -> junt_common::Result<Option<UsageRecord>>;

    /// Create the record (count 1) or increment it, refreshing last activity
    async fn increment(&self, kind: SignalKind, key: &str, now: DateTime<Utc>) -> junt_common::Result<()>;
}

/// Receives every montage that completes while auto-save is on
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn on_completed(&self, montage: CompletedMontage) -> junt_common::Result<SavedMontage>;
}
