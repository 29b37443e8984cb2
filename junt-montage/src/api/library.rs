//! Saved montage library endpoints

use axum::{
    body::Body,
    extract::{Path, Query, Request, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::SavedMontage;
use crate::services::library::LibraryPage;
use crate::AppState;

const MAX_PAGE_SIZE: u32 = 100;

/// POST /api/library/save request
#[derive(Debug, Deserialize)]
pub struct SaveMontageRequest {
    pub job_id: Uuid,
}

/// GET /api/library query
#[derive(Debug, Deserialize)]
pub struct LibraryQuery {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// POST /api/library/save
pub async fn save_montage(
    State(state): State<AppState>,
    Json(request): Json<SaveMontageRequest>,
) -> ApiResult<(StatusCode, Json<SavedMontage>)> {
    let job = state
        .orchestrator
        .get_status(request.job_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Job {}", request.job_id)))?;

    let saved = state.library.save_from_job(&job).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// GET /api/library?skip&limit
pub async fn list_montages(
    State(state): State<AppState>,
    Query(query): Query<LibraryQuery>,
) -> ApiResult<Json<LibraryPage>> {
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    Ok(Json(state.library.list(query.skip, limit).await?))
}

/// GET /api/library/:id
pub async fn get_montage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SavedMontage>> {
    Ok(Json(state.library.get(id).await?))
}

/// GET /api/library/:id/stream
pub async fn stream_saved_montage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    request: Request,
) -> ApiResult<Response> {
    let montage = state.library.get(id).await?;
    let path = montage
        .file_path
        .ok_or_else(|| ApiError::NotFound("Montage has no audio file".to_string()))?;
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(ApiError::NotFound("Montage file not found".to_string()));
    }

    let response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    Ok(response.map(Body::new))
}

/// DELETE /api/library/:id
pub async fn delete_montage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.library.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build library routes
pub fn library_routes() -> Router<AppState> {
    Router::new()
        .route("/api/library", get(list_montages))
        .route("/api/library/save", post(save_montage))
        .route("/api/library/:id", get(get_montage).delete(delete_montage))
        .route("/api/library/:id/stream", get(stream_saved_montage))
}
