//! Background task for one montage job

use anyhow::{anyhow, bail, Context, Result};
use futures::future::join_all;
use futures::FutureExt;
use junt_common::events::{MontageEvent, ProgressData};
use junt_common::models::{AlbumDescriptor, JobState, TrackArtifact, TrackInfo, TrackState};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use super::{OrchestratorContext, PersistenceMode};
use crate::models::CompletedMontage;
use crate::services::clip_processor::ClipPolicy;

/// A track's normalized clip, keyed by album position in the clip map
#[derive(Debug, Clone)]
struct Clip {
    track_number: u32,
    track_title: String,
    path: PathBuf,
}

fn montage_path(temp_dir: &Path, job_id: Uuid) -> PathBuf {
    temp_dir.join(format!("{}_montage.wav", job_id))
}

fn clip_path(temp_dir: &Path, job_id: Uuid, track_number: u32) -> PathBuf {
    temp_dir.join(format!("{}_clip_{}.wav", job_id, track_number))
}

fn download_stem(temp_dir: &Path, job_id: Uuid, track_number: u32) -> PathBuf {
    temp_dir.join(format!("{}_track_{}", job_id, track_number))
}

/// Run a job to a terminal state
///
/// The pipeline runs in its own task so a panic anywhere in it still ends
/// the job as `failed`.
pub(super) async fn run(ctx: Arc<OrchestratorContext>, job_id: Uuid) {
    let task_ctx = Arc::clone(&ctx);
    let outcome = tokio::spawn(async move { execute(&task_ctx, job_id).await }).await;

    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(e) if e.is_panic() => Some(anyhow!("Pipeline panicked: {}", panic_message(e.into_panic().as_ref()))),
        Err(e) => Some(anyhow!("Pipeline task ended unexpectedly: {}", e)),
    };

    if let Some(e) = failure {
        let message = e.to_string();
        tracing::error!(job_id = %job_id, error = %format!("{:#}", e), "Montage job failed");

        let failed = ctx.store.update(job_id, |job| job.fail(&message)).await;
        if failed == Some(true) {
            ctx.emit(job_id, MontageEvent::job_failed(message));
        }
        remove_stray_files(&ctx.config.temp_dir, job_id).await;
    }
}

async fn execute(ctx: &OrchestratorContext, job_id: Uuid) -> Result<()> {
    let job = ctx
        .store
        .snapshot(job_id)
        .await
        .ok_or_else(|| anyhow!("Job {} disappeared", job_id))?;

    ctx.store
        .update(job_id, |job| job.transition_to(JobState::Processing))
        .await;
    ctx.emit(job_id, MontageEvent::job_status(JobState::Processing));
    tracing::info!(job_id = %job_id, album_id = %job.album_id, "Montage job started");

    let album = match ctx.catalog.fetch_album(&job.album_id).await {
        Ok(Some(album)) => album,
        Ok(None) => bail!("Album {} not found", job.album_id),
        Err(e) => bail!("Failed to fetch album details: {}", e),
    };
    if album.tracks.is_empty() {
        bail!("Album {} has no tracks", album.id);
    }

    ctx.store.update(job_id, |job| job.init_tracks(&album)).await;
    ctx.emit(
        job_id,
        MontageEvent::Progress(ProgressData {
            total_tracks: Some(album.tracks.len()),
            album: Some(album.clone()),
            ..Default::default()
        }),
    );

    let policy = ClipPolicy::for_preset(job.duration);
    let total = album.tracks.len();
    let batch_size = ctx.config.batch_size;
    let threshold = ctx.config.partial_ready_threshold;
    let output = montage_path(&ctx.config.temp_dir, job_id);

    let mut clips: BTreeMap<usize, Clip> = BTreeMap::new();
    let mut partial_sent = false;

    let indexed: Vec<(usize, &TrackInfo)> = album.tracks.iter().enumerate().collect();
    for (batch_no, batch) in indexed.chunks(batch_size).enumerate() {
        tracing::debug!(job_id = %job_id, batch = batch_no, size = batch.len(), "Starting batch");

        let results = join_all(
            batch
                .iter()
                .map(|(index, track)| process_track(ctx, job_id, &album, *index, track, &policy)),
        )
        .await;

        for (index, clip) in batch.iter().map(|(i, _)| *i).zip(results) {
            if let Some(clip) = clip {
                clips.insert(index, clip);
            }
        }

        if !partial_sent && threshold > 0 && clips.len() >= threshold {
            let snapshot: Vec<PathBuf> = clips.values().map(|c| c.path.clone()).collect();
            let tracks_ready = snapshot.len();
            match ctx
                .processor
                .assemble(snapshot, &output, policy.crossfade_seconds)
                .await
            {
                Ok(path) => {
                    let file_path = path.to_string_lossy().to_string();
                    ctx.store
                        .update(job_id, |job| job.file_path = Some(file_path.clone()))
                        .await;
                    ctx.emit(
                        job_id,
                        MontageEvent::PartialReady {
                            file_path,
                            tracks_ready,
                            total_tracks: total,
                            message: format!(
                                "First {} tracks ready! More tracks are being added...",
                                tracks_ready
                            ),
                        },
                    );
                    partial_sent = true;
                    tracing::info!(
                        job_id = %job_id,
                        tracks_ready,
                        total_tracks = total,
                        "Partial montage ready"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = %job_id,
                        error = %format!("{:#}", e),
                        "Partial montage failed, retrying after next batch"
                    );
                }
            }
        }
    }

    if clips.is_empty() {
        bail!("All tracks failed to process");
    }

    let ordered: Vec<PathBuf> = clips.values().map(|c| c.path.clone()).collect();
    let final_path = ctx
        .processor
        .assemble(ordered.clone(), &output, policy.crossfade_seconds)
        .await
        .context("Final montage assembly failed")?;

    let track_files = match ctx.config.persistence_mode {
        PersistenceMode::Montage => {
            ctx.processor.cleanup_clips(&ordered).await;
            Vec::new()
        }
        PersistenceMode::PerTrack => clips
            .values()
            .map(|c| TrackArtifact {
                track_number: c.track_number,
                track_title: c.track_title.clone(),
                file_path: c.path.to_string_lossy().to_string(),
            })
            .collect(),
    };

    let file_path = final_path.to_string_lossy().to_string();
    let (completed, errors) = ctx
        .store
        .update(job_id, |job| {
            job.complete(Some(file_path.clone()), track_files.clone());
            (job.completed_tracks, job.errors.clone())
        })
        .await
        .ok_or_else(|| anyhow!("Job {} disappeared", job_id))?;

    ctx.emit(
        job_id,
        MontageEvent::Done {
            file_path: Some(file_path.clone()),
            track_files: track_files.clone(),
            total_tracks: completed,
            errors: errors.clone(),
        },
    );
    tracing::info!(
        job_id = %job_id,
        tracks = completed,
        total_tracks = total,
        failures = errors.len(),
        "Montage job completed"
    );

    if ctx.config.auto_save {
        if let Some(sink) = &ctx.sink {
            let handoff = CompletedMontage {
                job_id,
                album: album.clone(),
                duration: job.duration,
                file_path: Some(file_path),
                track_files,
            };
            match sink.on_completed(handoff).await {
                Ok(saved) => tracing::info!(job_id = %job_id, montage_id = %saved.id, "Montage saved to library"),
                Err(e) => tracing::warn!(job_id = %job_id, error = %e, "Auto-save failed"),
            }
        }
    }

    Ok(())
}

/// Per-track pipeline; failures stay inside this track
async fn process_track(
    ctx: &OrchestratorContext,
    job_id: Uuid,
    album: &AlbumDescriptor,
    index: usize,
    track: &TrackInfo,
    policy: &ClipPolicy,
) -> Option<Clip> {
    let result = match AssertUnwindSafe(produce_clip(ctx, job_id, album, index, track, policy))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(anyhow!("Track processing panicked: {}", panic_message(panic.as_ref()))),
    };

    match result {
        Ok(path) => {
            let update = ctx
                .store
                .update(job_id, |job| {
                    job.advance_track(index, TrackState::Complete)
                        .map(|_| (job.completed_tracks, job.total_tracks, job.progress))
                })
                .await
                .flatten();

            if let Some((completed, total, progress)) = update {
                ctx.emit(
                    job_id,
                    MontageEvent::TrackComplete {
                        track_number: track.number,
                        track_title: track.title.clone(),
                        completed,
                        total,
                        progress,
                    },
                );
            }
            tracing::info!(job_id = %job_id, track_number = track.number, "Track clip ready");

            Some(Clip {
                track_number: track.number,
                track_title: track.title.clone(),
                path,
            })
        }
        Err(e) => {
            let message = format!("{:#}", e);
            tracing::warn!(
                job_id = %job_id,
                track_number = track.number,
                error = %message,
                "Track failed"
            );
            ctx.store
                .update(job_id, |job| job.fail_track(index, &message))
                .await;
            ctx.emit(
                job_id,
                MontageEvent::Error {
                    track_number: Some(track.number),
                    message,
                },
            );
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn set_stage(ctx: &OrchestratorContext, job_id: Uuid, index: usize, track_number: u32, stage: TrackState) {
    let status = ctx
        .store
        .update(job_id, |job| job.advance_track(index, stage))
        .await
        .flatten();
    if let Some(status) = status {
        ctx.emit(job_id, MontageEvent::track_stage(track_number, status));
    }
}

async fn produce_clip(
    ctx: &OrchestratorContext,
    job_id: Uuid,
    album: &AlbumDescriptor,
    index: usize,
    track: &TrackInfo,
    policy: &ClipPolicy,
) -> Result<PathBuf> {
    let temp_dir = &ctx.config.temp_dir;

    set_stage(ctx, job_id, index, track.number, TrackState::Downloading).await;
    let source = ctx
        .downloader
        .download_track(&album.artist, &track.title, &download_stem(temp_dir, job_id, track.number))
        .await
        .map_err(|e| anyhow!("Failed to download track: {}", e))?;

    set_stage(ctx, job_id, index, track.number, TrackState::Analyzing).await;
    let clip_duration = policy.clip_duration(track.duration_seconds.map(f64::from));
    let window = ctx.analyzer.find_peak_window(&source, clip_duration).await;

    let clip = clip_path(temp_dir, job_id, track.number);
    let extracted = ctx
        .processor
        .extract(&source, window.start, window.end, &clip)
        .await;

    if let Err(e) = tokio::fs::remove_file(&source).await {
        tracing::debug!(path = %source.display(), error = %e, "Could not remove downloaded source");
    }

    let clip = extracted.context("Failed to extract clip")?;
    ctx.processor.normalize(&clip).await;
    Ok(clip)
}

/// Delete per-track leftovers (`<job>_clip_*`, `<job>_track_*`) from the temp dir
async fn remove_stray_files(temp_dir: &Path, job_id: Uuid) {
    let clip_prefix = format!("{}_clip_", job_id);
    let track_prefix = format!("{}_track_", job_id);

    let mut entries = match tokio::fs::read_dir(temp_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(path = %temp_dir.display(), error = %e, "Temp dir not readable");
            return;
        }
    };

    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(&clip_prefix) && !name.starts_with(&track_prefix) {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(path = %entry.path().display(), error = %e, "Failed to remove stray file"),
        }
    }

    if removed > 0 {
        tracing::info!(job_id = %job_id, removed, "Removed stray track files");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stray_cleanup_matches_job_prefix_only() {
        let dir = tempfile::tempdir().unwrap();
        let job = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mine = [
            dir.path().join(format!("{}_clip_1.wav", job)),
            dir.path().join(format!("{}_track_2.mp3", job)),
        ];
        let keep = [
            dir.path().join(format!("{}_clip_1.wav", other)),
            dir.path().join(format!("{}_montage.wav", job)),
        ];
        for p in mine.iter().chain(keep.iter()) {
            std::fs::write(p, b"x").unwrap();
        }

        remove_stray_files(dir.path(), job).await;

        assert!(mine.iter().all(|p| !p.exists()));
        assert!(keep.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_paths_follow_naming_pattern() {
        let job = Uuid::nil();
        let dir = Path::new("/tmp/junt");
        assert_eq!(
            clip_path(dir, job, 3),
            PathBuf::from(format!("/tmp/junt/{}_clip_3.wav", job))
        );
        assert_eq!(
            download_stem(dir, job, 3),
            PathBuf::from(format!("/tmp/junt/{}_track_3", job))
        );
        assert_eq!(
            montage_path(dir, job),
            PathBuf::from(format!("/tmp/junt/{}_montage.wav", job))
        );
    }
}
