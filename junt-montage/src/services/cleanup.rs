//! Temp directory maintenance
//!
//! Jobs leave downloads, clips and montages in the temp directory. Files
//! older than `max_age_hours` are considered orphaned and swept
//! periodically together with finished-job eviction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::services::job_orchestrator::JobOrchestrator;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One deleted file
#[derive(Debug, Clone, Serialize)]
pub struct DeletedFile {
    pub name: String,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_hours: Option<f64>,
}

/// Outcome of a sweep
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub deleted_count: usize,
    pub deleted_files: Vec<DeletedFile>,
    pub total_size_mb: f64,
    pub errors: Vec<String>,
}

/// One file currently in the temp directory
#[derive(Debug, Clone, Serialize)]
pub struct TempFileInfo {
    pub name: String,
    pub size_bytes: u64,
    pub size_mb: f64,
    pub age_hours: f64,
    pub is_orphaned: bool,
    pub modified: DateTime<Utc>,
}

/// Temp directory summary, oldest files first
#[derive(Debug, Clone, Default, Serialize)]
pub struct TempFilesInfo {
    pub total_count: usize,
    pub total_size_mb: f64,
    pub orphaned_count: usize,
    pub files: Vec<TempFileInfo>,
}

struct FileEntry {
    path: PathBuf,
    name: String,
    size: u64,
    age: Duration,
    modified: SystemTime,
}

/// Temp file sweeper
#[derive(Debug, Clone)]
pub struct TempCleanup {
    temp_dir: PathBuf,
    max_age: Duration,
}

impl TempCleanup {
    pub fn new(temp_dir: impl Into<PathBuf>, max_age_hours: u64) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            max_age: Duration::from_secs(max_age_hours * 3600),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn max_age_hours(&self) -> u64 {
        self.max_age.as_secs() / 3600
    }

    /// Regular files in the temp dir; unreadable entries are reported in `errors`
    async fn scan(&self, errors: &mut Vec<String>) -> Vec<FileEntry> {
        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.temp_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return files,
            Err(e) => {
                errors.push(format!("Error scanning temp directory: {}", e));
                return files;
            }
        };

        let now = SystemTime::now();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    errors.push(format!("Error scanning temp directory: {}", e));
                    break;
                }
            };
            let name = entry.file_name().to_string_lossy().to_string();
            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(e) => {
                    errors.push(format!("Error processing {}: {}", name, e));
                    continue;
                }
            };
            let modified = meta.modified().unwrap_or(now);
            files.push(FileEntry {
                path: entry.path(),
                name,
                size: meta.len(),
                age: now.duration_since(modified).unwrap_or_default(),
                modified,
            });
        }
        files
    }

    async fn delete(&self, files: Vec<FileEntry>, with_age: bool, errors: &mut Vec<String>) -> CleanupReport {
        let mut report = CleanupReport::default();
        let mut total = 0u64;

        for file in files {
            match tokio::fs::remove_file(&file.path).await {
                Ok(()) => {
                    let age_hours = file.age.as_secs_f64() / 3600.0;
                    tracing::info!(
                        file = %file.name,
                        age_hours = format!("{:.1}", age_hours),
                        size_mb = format!("{:.2}", file.size as f64 / BYTES_PER_MB),
                        "Deleted temp file"
                    );
                    total += file.size;
                    report.deleted_files.push(DeletedFile {
                        name: file.name,
                        size_bytes: file.size,
                        age_hours: with_age.then_some(round2(age_hours)),
                    });
                }
                Err(e) => {
                    let msg = format!("Error deleting {}: {}", file.name, e);
                    tracing::error!("{}", msg);
                    errors.push(msg);
                }
            }
        }

        report.deleted_count = report.deleted_files.len();
        report.total_size_mb = round2(total as f64 / BYTES_PER_MB);
        report
    }

    /// Delete files older than the max age
    pub async fn cleanup_orphaned(&self) -> CleanupReport {
        let mut errors = Vec::new();
        let orphaned: Vec<FileEntry> = self
            .scan(&mut errors)
            .await
            .into_iter()
            .filter(|f| f.age > self.max_age)
            .collect();

        let mut report = self.delete(orphaned, true, &mut errors).await;
        report.errors = errors;

        if report.deleted_count > 0 {
            tracing::info!(
                deleted = report.deleted_count,
                freed_mb = report.total_size_mb,
                "Orphan cleanup complete"
            );
        }
        report
    }

    /// Delete every temp file, including those of running jobs
    pub async fn force_cleanup_all(&self) -> CleanupReport {
        let mut errors = Vec::new();
        let files = self.scan(&mut errors).await;
        let mut report = self.delete(files, false, &mut errors).await;
        report.errors = errors;

        tracing::warn!(
            deleted = report.deleted_count,
            freed_mb = report.total_size_mb,
            "Force cleanup complete"
        );
        report
    }

    /// Current temp files, oldest first
    pub async fn temp_files_info(&self) -> TempFilesInfo {
        let mut errors = Vec::new();
        let mut files = self.scan(&mut errors).await;
        for e in &errors {
            tracing::error!("{}", e);
        }
        files.sort_by(|a, b| b.age.cmp(&a.age));

        let total: u64 = files.iter().map(|f| f.size).sum();
        let infos: Vec<TempFileInfo> = files
            .into_iter()
            .map(|f| TempFileInfo {
                size_mb: round2(f.size as f64 / BYTES_PER_MB),
                age_hours: round2(f.age.as_secs_f64() / 3600.0),
                is_orphaned: f.age > self.max_age,
                modified: DateTime::<Utc>::from(f.modified),
                name: f.name,
                size_bytes: f.size,
            })
            .collect();

        TempFilesInfo {
            total_count: infos.len(),
            total_size_mb: round2(total as f64 / BYTES_PER_MB),
            orphaned_count: infos.iter().filter(|f| f.is_orphaned).count(),
            files: infos,
        }
    }
}

/// Periodic orphan sweep and finished-job eviction
///
/// Runs once immediately, then every `interval` until `token` is cancelled.
pub fn spawn_maintenance(
    cleanup: TempCleanup,
    orchestrator: JobOrchestrator,
    job_retention: chrono::Duration,
    interval: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tracing::info!(
        interval_minutes = interval.as_secs() / 60,
        max_age_hours = cleanup.max_age_hours(),
        "Starting periodic cleanup"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Stopped periodic cleanup");
                    break;
                }
                _ = ticker.tick() => {
                    let report = cleanup.cleanup_orphaned().await;
                    for e in &report.errors {
                        tracing::warn!(error = %e, "Cleanup error");
                    }
                    orchestrator.evict_finished(job_retention).await;
                }
            }
        }
    })
}
