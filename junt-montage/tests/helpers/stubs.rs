//! Stand-in collaborators
//!
//! The catalog serves albums from a map; the downloader copies a fixture
//! WAV to the requested stem, failing or panicking for chosen titles.

use async_trait::async_trait;
use junt_common::models::{AlbumDescriptor, TrackInfo};
use junt_montage::models::{CompletedMontage, SavedMontage};
use junt_montage::types::{AlbumCatalog, CollaboratorError, CompletionSink, TrackDownloader};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub fn album(id: &str, titles: &[&str], track_seconds: u32) -> AlbumDescriptor {
    AlbumDescriptor {
        id: id.to_string(),
        title: format!("Album {}", id),
        artist: "Test Artist".to_string(),
        year: Some(2020),
        cover_url: None,
        tracks: titles
            .iter()
            .enumerate()
            .map(|(i, title)| TrackInfo {
                number: i as u32 + 1,
                title: title.to_string(),
                duration_seconds: Some(track_seconds),
            })
            .collect(),
    }
}

#[derive(Default)]
pub struct StubCatalog {
    albums: HashMap<String, AlbumDescriptor>,
    /// Delay before answering, so subscribers can attach first
    pub delay: Duration,
    pub fail: bool,
    pub panic: bool,
}

impl StubCatalog {
    pub fn with_album(album: AlbumDescriptor) -> Self {
        let mut albums = HashMap::new();
        albums.insert(album.id.clone(), album);
        Self {
            albums,
            delay: Duration::from_millis(100),
            fail: false,
            panic: false,
        }
    }
}

#[async_trait]
impl AlbumCatalog for StubCatalog {
    async fn fetch_album(&self, album_id: &str) -> Result<Option<AlbumDescriptor>, CollaboratorError> {
        tokio::time::sleep(self.delay).await;
        if self.panic {
            panic!("catalog blew up");
        }
        if self.fail {
            return Err(CollaboratorError::Network("catalog offline".to_string()));
        }
        Ok(self.albums.get(album_id).cloned())
    }
}

pub struct StubDownloader {
    fixture: PathBuf,
    /// Per-title fixture overriding the default one
    fixtures: HashMap<String, PathBuf>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    /// Per-title delay, to shuffle completion order within a batch
    delays: HashMap<String, Duration>,
}

impl StubDownloader {
    pub fn new(fixture: PathBuf) -> Self {
        Self {
            fixture,
            fixtures: HashMap::new(),
            failing: HashSet::new(),
            panicking: HashSet::new(),
            delays: HashMap::new(),
        }
    }

    pub fn failing(mut self, titles: &[&str]) -> Self {
        self.failing.extend(titles.iter().map(|t| t.to_string()));
        self
    }

    pub fn panicking(mut self, titles: &[&str]) -> Self {
        self.panicking.extend(titles.iter().map(|t| t.to_string()));
        self
    }

    pub fn with_fixture(mut self, title: &str, fixture: PathBuf) -> Self {
        self.fixtures.insert(title.to_string(), fixture);
        self
    }

    pub fn delayed(mut self, title: &str, delay: Duration) -> Self {
        self.delays.insert(title.to_string(), delay);
        self
    }
}

#[async_trait]
impl TrackDownloader for StubDownloader {
    async fn download_track(
        &self,
        _artist: &str,
        title: &str,
        dest_stem: &Path,
    ) -> Result<PathBuf, CollaboratorError> {
        if let Some(delay) = self.delays.get(title) {
            tokio::time::sleep(*delay).await;
        }
        if self.panicking.contains(title) {
            panic!("downloader blew up on {}", title);
        }
        if self.failing.contains(title) {
            return Err(CollaboratorError::NotFound(format!("No results for {}", title)));
        }
        let fixture = self.fixtures.get(title).unwrap_or(&self.fixture);
        let dest = dest_stem.with_extension("wav");
        tokio::fs::copy(fixture, &dest).await?;
        Ok(dest)
    }
}

/// Sink that records every handoff
#[derive(Default)]
pub struct RecordingSink {
    pub received: Mutex<Vec<CompletedMontage>>,
}

#[async_trait]
impl CompletionSink for RecordingSink {
    async fn on_completed(&self, montage: CompletedMontage) -> junt_common::Result<SavedMontage> {
        let saved = SavedMontage {
            id: uuid::Uuid::new_v4(),
            job_id: montage.job_id,
            album: montage.album.clone(),
            duration: montage.duration,
            file_path: montage.file_path.clone(),
            track_files: montage.track_files.clone(),
            created_at: chrono::Utc::now(),
        };
        self.received.lock().unwrap().push(montage);
        Ok(saved)
    }
}
