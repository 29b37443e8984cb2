//! Saved montage library
//!
//! Copies a finished job's artifacts out of the temp directory into
//! `<root>/montages/` and records the entry in the repository. Temp files
//! are left for the cleanup sweep.

use async_trait::async_trait;
use chrono::Utc;
use junt_common::models::{JobState, TrackArtifact};
use junt_common::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{CompletedMontage, Job, SavedMontage};
use crate::types::{CompletionSink, MontageRepository};

/// One page of the library
#[derive(Debug, Clone, Serialize)]
pub struct LibraryPage {
    pub montages: Vec<SavedMontage>,
    pub total: u64,
}

#[derive(Clone)]
pub struct LibraryService {
    repo: Arc<dyn MontageRepository>,
    montages_dir: PathBuf,
}

impl LibraryService {
    pub fn new(repo: Arc<dyn MontageRepository>, montages_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo,
            montages_dir: montages_dir.into(),
        }
    }

    pub fn montages_dir(&self) -> &Path {
        &self.montages_dir
    }

    async fn copy_artifact(&self, src: &str, file_name: String) -> Result<String> {
        let src = Path::new(src);
        if !tokio::fs::try_exists(src).await.unwrap_or(false) {
            return Err(Error::NotFound(format!("Montage file not found: {}", src.display())));
        }
        let ext = src.extension().and_then(|e| e.to_str()).unwrap_or("wav");
        let dest = self.montages_dir.join(format!("{}.{}", file_name, ext));
        tokio::fs::copy(src, &dest).await?;
        Ok(dest.to_string_lossy().to_string())
    }

    /// Persist a completed montage
    pub async fn save(&self, montage: CompletedMontage) -> Result<SavedMontage> {
        tokio::fs::create_dir_all(&self.montages_dir).await?;
        let id = Uuid::new_v4();

        let file_path = match &montage.file_path {
            Some(path) => Some(self.copy_artifact(path, id.to_string()).await?),
            None => None,
        };

        let mut track_files = Vec::with_capacity(montage.track_files.len());
        for artifact in &montage.track_files {
            let copied = self
                .copy_artifact(&artifact.file_path, format!("{}_track_{}", id, artifact.track_number))
                .await?;
            track_files.push(TrackArtifact {
                file_path: copied,
                ..artifact.clone()
            });
        }

        let saved = SavedMontage {
            id,
            job_id: montage.job_id,
            album: montage.album,
            duration: montage.duration,
            file_path,
            track_files,
            created_at: Utc::now(),
        };
        self.repo.save(&saved).await?;

        tracing::info!(
            montage_id = %saved.id,
            job_id = %saved.job_id,
            album = %saved.album.title,
            "Saved montage to library"
        );
        Ok(saved)
    }

    /// Save a completed job on request
    pub async fn save_from_job(&self, job: &Job) -> Result<SavedMontage> {
        if job.status != JobState::Completed {
            return Err(Error::InvalidInput(format!(
                "Job {} is not completed (status: {:?})",
                job.job_id, job.status
            )));
        }
        let album = job
            .album
            .clone()
            .ok_or_else(|| Error::Internal(format!("Job {} has no album", job.job_id)))?;

        self.save(CompletedMontage {
            job_id: job.job_id,
            album,
            duration: job.duration,
            file_path: job.file_path.clone(),
            track_files: job.track_files.clone(),
        })
        .await
    }

    pub async fn list(&self, skip: u32, limit: u32) -> Result<LibraryPage> {
        let montages = self.repo.list(skip, limit).await?;
        let total = self.repo.count().await?;
        Ok(LibraryPage { montages, total })
    }

    pub async fn get(&self, id: Uuid) -> Result<SavedMontage> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Montage {}", id)))
    }

    /// Remove the entry and its files
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let montage = self.get(id).await?;

        let files = montage
            .file_path
            .iter()
            .chain(montage.track_files.iter().map(|t| &t.file_path));
        for path in files {
            if let Err(e) = tokio::fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(montage_id = %id, path = %path, error = %e, "Failed to remove montage file");
                }
            }
        }

        if !self.repo.delete(id).await? {
            return Err(Error::NotFound(format!("Montage {}", id)));
        }
        tracing::info!(montage_id = %id, "Deleted montage");
        Ok(())
    }
}

#[async_trait]
impl CompletionSink for LibraryService {
    async fn on_completed(&self, montage: CompletedMontage) -> Result<SavedMontage> {
        self.save(montage).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use junt_common::models::{AlbumDescriptor, DurationPreset};
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MemoryRepo {
        rows: Mutex<HashMap<Uuid, SavedMontage>>,
    }

    #[async_trait]
    impl MontageRepository for MemoryRepo {
        async fn save(&self, montage: &SavedMontage) -> Result<()> {
            self.rows.lock().await.insert(montage.id, montage.clone());
            Ok(())
        }
        async fn list(&self, skip: u32, limit: u32) -> Result<Vec<SavedMontage>> {
            let mut all: Vec<_> = self.rows.lock().await.values().cloned().collect();
            all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(all.into_iter().skip(skip as usize).take(limit as usize).collect())
        }
        async fn count(&self) -> Result<u64> {
            Ok(self.rows.lock().await.len() as u64)
        }
        async fn get(&self, id: Uuid) -> Result<Option<SavedMontage>> {
            Ok(self.rows.lock().await.get(&id).cloned())
        }
        async fn delete(&self, id: Uuid) -> Result<bool> {
            Ok(self.rows.lock().await.remove(&id).is_some())
        }
    }

    fn album() -> AlbumDescriptor {
        AlbumDescriptor {
            id: "rel-1".into(),
            title: "Record".into(),
            artist: "Band".into(),
            year: None,
            cover_url: None,
            tracks: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_save_copies_and_delete_removes() {
        let temp = tempfile::tempdir().unwrap();
        let src = temp.path().join("job_montage.wav");
        std::fs::write(&src, b"RIFF").unwrap();

        let library = LibraryService::new(Arc::new(MemoryRepo::default()), temp.path().join("montages"));
        let saved = library
            .save(CompletedMontage {
                job_id: Uuid::new_v4(),
                album: album(),
                duration: DurationPreset::Medium,
                file_path: Some(src.to_string_lossy().to_string()),
                track_files: Vec::new(),
            })
            .await
            .unwrap();

        let copied = saved.file_path.clone().unwrap();
        assert!(copied.ends_with(&format!("{}.wav", saved.id)));
        assert!(Path::new(&copied).exists());
        assert!(src.exists());

        let page = library.list(0, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.montages[0].id, saved.id);

        library.delete(saved.id).await.unwrap();
        assert!(!Path::new(&copied).exists());
        assert!(matches!(library.get(saved.id).await, Err(Error::NotFound(_))));
        assert!(matches!(library.delete(saved.id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unfinished_job_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let library = LibraryService::new(Arc::new(MemoryRepo::default()), temp.path());
        let job = Job::new("rel-1", DurationPreset::Short);
        assert!(matches!(library.save_from_job(&job).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_missing_artifact_is_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let library = LibraryService::new(Arc::new(MemoryRepo::default()), temp.path().join("m"));
        let result = library
            .save(CompletedMontage {
                job_id: Uuid::new_v4(),
                album: album(),
                duration: DurationPreset::Short,
                file_path: Some(temp.path().join("gone.wav").to_string_lossy().to_string()),
                track_files: Vec::new(),
            })
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
