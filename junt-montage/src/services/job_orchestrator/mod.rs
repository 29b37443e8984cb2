//! Montage job orchestration
//!
//! Owns job state, schedules per-track work in fixed-size batches and
//! drives progress events. One background task per job; creating a job
//! returns before any work is done.
//!
//! **Per-job pipeline:**
//! 1. `processing`, fetch the album from the catalog
//! 2. Size the track list, pick clip length from the preset
//! 3. Batches of K tracks run concurrently; the next batch waits for the whole batch
//! 4. Per track: download → peak window → extract → normalize
//! 5. First time the success count reaches the threshold: partial montage
//! 6. Final montage, `done` (or `failed` if nothing succeeded)

mod pipeline;
mod store;

pub use store::JobStore;

use chrono::Utc;
use junt_common::events::MontageEvent;
use junt_common::models::DurationPreset;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::Job;
use crate::services::analyzer::AnalyzerEngine;
use crate::services::clip_processor::ClipProcessor;
use crate::services::progress_channel::{ProgressChannel, SubscriberId, Subscription};
use crate::types::{AlbumCatalog, CompletionSink, TrackDownloader};

/// What a completed job keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceMode {
    /// Keep only the assembled montage; clips are deleted
    #[default]
    Montage,
    /// Keep the montage and every normalized clip
    PerTrack,
}

/// Scheduling and output settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Tracks processed concurrently per batch
    pub batch_size: usize,
    /// Successful tracks needed before the partial montage is built
    pub partial_ready_threshold: usize,
    pub persistence_mode: PersistenceMode,
    /// Hand completed montages to the completion sink
    pub auto_save: bool,
    /// Working directory for downloads, clips and montages
    pub temp_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            partial_ready_threshold: 3,
            persistence_mode: PersistenceMode::Montage,
            auto_save: false,
            temp_dir: PathBuf::from("temp"),
        }
    }
}

/// Shared by the orchestrator handle and every job task
pub(crate) struct OrchestratorContext {
    pub store: JobStore,
    pub channel: ProgressChannel,
    pub catalog: Arc<dyn AlbumCatalog>,
    pub downloader: Arc<dyn TrackDownloader>,
    pub analyzer: AnalyzerEngine,
    pub processor: ClipProcessor,
    pub config: PipelineConfig,
    pub sink: Option<Arc<dyn CompletionSink>>,
}

impl OrchestratorContext {
    pub fn emit(&self, job_id: Uuid, event: MontageEvent) {
        let report = self.channel.broadcast(job_id, &event);
        tracing::debug!(
            job_id = %job_id,
            event = event.event_type(),
            delivered = report.delivered,
            "Progress event emitted"
        );
    }
}

/// Job orchestrator handle (cheap to clone)
#[derive(Clone)]
pub struct JobOrchestrator {
    ctx: Arc<OrchestratorContext>,
}

impl JobOrchestrator {
    pub fn new(
        catalog: Arc<dyn AlbumCatalog>,
        downloader: Arc<dyn TrackDownloader>,
        processor: ClipProcessor,
        config: PipelineConfig,
    ) -> Self {
        Self::with_sink(catalog, downloader, processor, config, None)
    }

    pub fn with_sink(
        catalog: Arc<dyn AlbumCatalog>,
        downloader: Arc<dyn TrackDownloader>,
        processor: ClipProcessor,
        mut config: PipelineConfig,
        sink: Option<Arc<dyn CompletionSink>>,
    ) -> Self {
        config.batch_size = config.batch_size.max(1);
        Self {
            ctx: Arc::new(OrchestratorContext {
                store: JobStore::new(),
                channel: ProgressChannel::default(),
                catalog,
                downloader,
                analyzer: AnalyzerEngine::new(),
                processor,
                config,
                sink,
            }),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.ctx.config
    }

    /// Queue a job and start its pipeline in the background
    pub async fn create_job(&self, album_id: &str, duration: DurationPreset) -> Uuid {
        let job = Job::new(album_id, duration);
        let job_id = job.job_id;

        self.ctx.store.insert(job).await;
        self.ctx.channel.register_job(job_id);

        tracing::info!(
            job_id = %job_id,
            album_id = %album_id,
            duration = duration.as_str(),
            "Montage job queued"
        );

        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            pipeline::run(ctx, job_id).await;
        });

        job_id
    }

    /// Consistent snapshot of a job
    pub async fn get_status(&self, job_id: Uuid) -> Option<Job> {
        self.ctx.store.snapshot(job_id).await
    }

    /// Start receiving a job's events; None for unknown jobs
    pub fn subscribe(&self, job_id: Uuid) -> Option<Subscription> {
        self.ctx.channel.subscribe(job_id)
    }

    pub fn unsubscribe(&self, job_id: Uuid, subscriber: SubscriberId) {
        self.ctx.channel.unsubscribe(job_id, subscriber);
    }

    pub fn subscriber_count(&self, job_id: Uuid) -> usize {
        self.ctx.channel.subscriber_count(job_id)
    }

    /// Jobs still queued or processing
    pub async fn active_jobs(&self) -> usize {
        self.ctx.store.active_count().await
    }

    /// Forget terminal jobs that finished more than `max_age` ago
    pub async fn evict_finished(&self, max_age: chrono::Duration) -> usize {
        let evicted = self.ctx.store.evict_finished_before(Utc::now() - max_age).await;
        for job_id in &evicted {
            self.ctx.channel.remove_job(*job_id);
        }
        if !evicted.is_empty() {
            tracing::info!(count = evicted.len(), "Evicted finished jobs");
        }
        evicted.len()
    }
}
