//! Montage job endpoints
//!
//! POST /api/montage/create, GET /api/montage/:job_id/{status,download,stream,events}

use axum::{
    body::Body,
    extract::{ConnectInfo, Path, Request, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use junt_common::models::{DurationPreset, JobState};
use junt_common::sse::create_job_sse_stream;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::Job;
use crate::services::quota_tracker::identity_signals;
use crate::AppState;

/// POST /api/montage/create request
#[derive(Debug, Deserialize)]
pub struct CreateMontageRequest {
    #[serde(alias = "mbid")]
    pub album_id: String,
    pub duration: DurationPreset,
}

/// POST /api/montage/create response
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMontageResponse {
    pub job_id: Uuid,
    pub session_id: String,
}

/// POST /api/montage/create
///
/// Every caller is anonymous: the quota is checked first and usage is
/// recorded once the job exists.
pub async fn create_montage(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<CreateMontageRequest>,
) -> ApiResult<Json<CreateMontageResponse>> {
    let album_id = request.album_id.trim();
    if album_id.is_empty() {
        return Err(ApiError::BadRequest("album_id is required".to_string()));
    }

    let signals = identity_signals(&headers, peer.map(|ConnectInfo(addr)| addr));

    if state.quota_enabled {
        let decision = state.quota.check_limit(&signals).await;
        if !decision.allowed {
            tracing::info!(
                ip = %signals.ip_address,
                count = decision.usage.montage_count,
                limit = decision.usage.limit,
                "Anonymous quota exceeded"
            );
            return Err(ApiError::QuotaExceeded {
                usage: decision.usage,
                session_id: decision.session_id,
            });
        }
    }

    let job_id = state.orchestrator.create_job(album_id, request.duration).await;

    if state.quota_enabled {
        state.quota.record_usage(&signals).await;
    }

    Ok(Json(CreateMontageResponse {
        job_id,
        session_id: signals.session_id,
    }))
}

async fn find_job(state: &AppState, job_id: Uuid) -> ApiResult<Job> {
    state
        .orchestrator
        .get_status(job_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Job {}", job_id)))
}

/// GET /api/montage/:job_id/status
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    Ok(Json(find_job(&state, job_id).await?))
}

async fn serve_file(path: &str, request: Request) -> ApiResult<Response> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(ApiError::NotFound("Montage file not found".to_string()));
    }
    let response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    Ok(response.map(Body::new))
}

/// GET /api/montage/:job_id/download
///
/// Final montage as an attachment; only for completed jobs.
pub async fn download_montage(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    request: Request,
) -> ApiResult<Response> {
    let job = find_job(&state, job_id).await?;
    if job.status != JobState::Completed {
        return Err(ApiError::BadRequest("Job not completed yet".to_string()));
    }
    let path = job
        .file_path
        .ok_or_else(|| ApiError::NotFound("Montage file not found".to_string()))?;

    let mut response = serve_file(&path, request).await?;
    let disposition = format!("attachment; filename=\"montage_{}.wav\"", job_id);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

/// GET /api/montage/:job_id/stream
///
/// Current artifact (partial or final) with range support for players.
pub async fn stream_montage(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    request: Request,
) -> ApiResult<Response> {
    let job = find_job(&state, job_id).await?;
    let path = job
        .file_path
        .ok_or_else(|| ApiError::NotFound("No playable montage yet".to_string()))?;
    serve_file(&path, request).await
}

/// GET /api/montage/:job_id/events
///
/// SSE stream of the job's events. Already-finished jobs get their final
/// event and the stream ends. The subscription is released when the
/// stream closes.
pub async fn job_event_stream(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Response> {
    let subscription = state
        .orchestrator
        .subscribe(job_id)
        .ok_or_else(|| ApiError::NotFound(format!("Job {}", job_id)))?;
    let subscriber = subscription.id;
    let job = match find_job(&state, job_id).await {
        Ok(job) => job,
        Err(e) => {
            state.orchestrator.unsubscribe(job_id, subscriber);
            return Err(e);
        }
    };

    let initial = job.terminal_event();
    tracing::info!(job_id = %job_id, "SSE client subscribed to job events");

    let orchestrator = state.orchestrator.clone();
    let stream = create_job_sse_stream(job_id.to_string(), initial, subscription.rx, move || {
        orchestrator.unsubscribe(job_id, subscriber);
    });
    Ok(stream.into_response())
}

/// Build montage routes
pub fn montage_routes() -> Router<AppState> {
    Router::new()
        .route("/api/montage/create", post(create_montage))
        .route("/api/montage/:job_id/status", get(get_status))
        .route("/api/montage/:job_id/download", get(download_montage))
        .route("/api/montage/:job_id/stream", get(stream_montage))
        .route("/api/montage/:job_id/events", get(job_event_stream))
}
