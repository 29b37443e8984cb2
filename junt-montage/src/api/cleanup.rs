//! Temp file maintenance endpoints

use axum::{extract::State, routing::{get, post}, Json, Router};
use serde::Serialize;

use crate::services::cleanup::{CleanupReport, TempFilesInfo};
use crate::AppState;

/// Sweep result
#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub message: String,
    pub details: CleanupReport,
}

#[derive(Debug, Serialize)]
pub struct TempInfoResponse {
    pub success: bool,
    pub data: TempFilesInfo,
}

#[derive(Debug, Serialize)]
pub struct CleanupStatus {
    pub running: bool,
    pub max_age_hours: u64,
    pub temp_dir: String,
}

#[derive(Debug, Serialize)]
pub struct CleanupStatusResponse {
    pub success: bool,
    pub status: CleanupStatus,
}

/// POST /api/cleanup/orphaned
pub async fn cleanup_orphaned(State(state): State<AppState>) -> Json<CleanupResponse> {
    let report = state.cleanup.cleanup_orphaned().await;
    Json(CleanupResponse {
        success: true,
        message: format!(
            "Cleaned up {} orphaned files ({}MB freed)",
            report.deleted_count, report.total_size_mb
        ),
        details: report,
    })
}

/// POST /api/cleanup/force
///
/// Deletes every temp file, including those of running jobs.
pub async fn force_cleanup(State(state): State<AppState>) -> Json<CleanupResponse> {
    let report = state.cleanup.force_cleanup_all().await;
    Json(CleanupResponse {
        success: true,
        message: format!(
            "Force cleanup complete: {} files deleted ({}MB freed)",
            report.deleted_count, report.total_size_mb
        ),
        details: report,
    })
}

/// GET /api/cleanup/info
pub async fn temp_files_info(State(state): State<AppState>) -> Json<TempInfoResponse> {
    Json(TempInfoResponse {
        success: true,
        data: state.cleanup.temp_files_info().await,
    })
}

/// GET /api/cleanup/status
pub async fn cleanup_status(State(state): State<AppState>) -> Json<CleanupStatusResponse> {
    Json(CleanupStatusResponse {
        success: true,
        status: CleanupStatus {
            running: state.maintenance_running,
            max_age_hours: state.cleanup.max_age_hours(),
            temp_dir: state.cleanup.temp_dir().display().to_string(),
        },
    })
}

/// Build cleanup routes
pub fn cleanup_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cleanup/orphaned", post(cleanup_orphaned))
        .route("/api/cleanup/force", post(force_cleanup))
        .route("/api/cleanup/info", get(temp_files_info))
        .route("/api/cleanup/status", get(cleanup_status))
}
