//! Service modules for the montage pipeline
//!
//! Core: analyzer, loudness, clip processor, quota tracker, progress
//! channel and the job orchestrator. Collaborators: MusicBrainz catalog,
//! yt-dlp downloader and the saved-montage library. Maintenance: temp
//! file cleanup.

pub mod analyzer;
pub mod cleanup;
pub mod clip_processor;
pub mod downloader;
pub mod job_orchestrator;
pub mod library;
pub mod loudness;
pub mod musicbrainz_client;
pub mod progress_channel;
pub mod quota_tracker;

pub use analyzer::{AnalyzerEngine, PeakWindow};
pub use cleanup::{spawn_maintenance, CleanupReport, TempCleanup, TempFilesInfo};
pub use clip_processor::{ClipPolicy, ClipProcessor, NormalizeOutcome};
pub use downloader::YtDlpDownloader;
pub use job_orchestrator::{JobOrchestrator, PersistenceMode, PipelineConfig};
pub use library::{LibraryPage, LibraryService};
pub use musicbrainz_client::MusicBrainzCatalog;
pub use progress_channel::{ProgressChannel, Subscription};
pub use quota_tracker::{identity_signals, QuotaTracker};
