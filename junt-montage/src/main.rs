//! junt-montage - album preview montage service
//!
//! Startup order: arguments, config file, logging, root folder, database,
//! collaborators, orchestrator, router, maintenance task, server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use junt_montage::config::{Args, MontageConfig, Settings};
use junt_montage::db::{self, SqliteMontageRepository, SqliteUsageStore};
use junt_montage::services::{
    spawn_maintenance, ClipProcessor, JobOrchestrator, LibraryService, MusicBrainzCatalog,
    QuotaTracker, TempCleanup, YtDlpDownloader,
};
use junt_montage::types::CompletionSink;
use junt_montage::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = MontageConfig::load(&args).context("Failed to load configuration")?;
    let settings = Settings::resolve(&args, config);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting junt-montage v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Build: {} ({}, {})",
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Root folder: {}", settings.root_folder.display());

    let temp_dir = settings.temp_dir();
    let montages_dir = settings.montages_dir();
    std::fs::create_dir_all(&temp_dir)
        .with_context(|| format!("Failed to create {}", temp_dir.display()))?;
    std::fs::create_dir_all(&montages_dir)
        .with_context(|| format!("Failed to create {}", montages_dir.display()))?;

    let db_path = settings.database_path();
    info!("Database: {}", db_path.display());
    let pool = db::init_database_pool(&db_path).await?;

    let cfg = &settings.config;

    let catalog = MusicBrainzCatalog::new(
        cfg.catalog.base_url.clone(),
        &cfg.catalog.user_agent,
        cfg.catalog.requests_per_second,
    )
    .context("Failed to build MusicBrainz client")?;
    let downloader = YtDlpDownloader::new(
        cfg.downloader.program.clone(),
        cfg.downloader.audio_format.clone(),
        cfg.downloader.timeout_secs,
    );
    let processor = ClipProcessor::new(cfg.pipeline.target_lufs, cfg.pipeline.crossfade_curve);

    let library = LibraryService::new(
        Arc::new(SqliteMontageRepository::new(pool.clone())),
        montages_dir,
    );
    let sink: Arc<dyn CompletionSink> = Arc::new(library.clone());

    let orchestrator = JobOrchestrator::with_sink(
        Arc::new(catalog),
        Arc::new(downloader),
        processor,
        cfg.pipeline_config(&temp_dir),
        Some(sink),
    );

    let quota = QuotaTracker::new(
        Arc::new(SqliteUsageStore::new(pool.clone())),
        cfg.quota.max_anonymous_jobs,
        cfg.quota.window_hours,
    );
    let cleanup = TempCleanup::new(&temp_dir, cfg.cleanup.max_age_hours);

    let shutdown = CancellationToken::new();
    let maintenance = if cfg.cleanup.enabled {
        Some(spawn_maintenance(
            cleanup.clone(),
            orchestrator.clone(),
            chrono::Duration::hours(cfg.pipeline.job_retention_hours as i64),
            Duration::from_secs(cfg.cleanup.interval_minutes.max(1) * 60),
            shutdown.clone(),
        ))
    } else {
        None
    };

    let mut state = AppState::new(orchestrator, quota, library, cleanup);
    state.quota_enabled = cfg.quota.enabled;
    state.maintenance_running = maintenance.is_some();

    let app = junt_montage::build_router(state, &cfg.cors_origins);

    let addr = format!("{}:{}", settings.bind_address, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Some(handle) = maintenance {
        let _ = handle.await;
    }
    pool.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
