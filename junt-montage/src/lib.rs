//! junt-montage library interface
//!
//! Album preview montages: fetch a release, clip the most energetic part of
//! each track, normalize loudness and crossfade the clips into one file.
//! Exposes the services and the router for the binary and for tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod types;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::http::{HeaderValue, Method};
use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::services::{JobOrchestrator, LibraryService, QuotaTracker, TempCleanup};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: JobOrchestrator,
    pub quota: QuotaTracker,
    /// When false, job creation skips the quota check and usage recording
    pub quota_enabled: bool,
    pub library: LibraryService,
    pub cleanup: TempCleanup,
    /// Whether the periodic maintenance task was started
    pub maintenance_running: bool,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        orchestrator: JobOrchestrator,
        quota: QuotaTracker,
        library: LibraryService,
        cleanup: TempCleanup,
    ) -> Self {
        Self {
            orchestrator,
            quota,
            quota_enabled: true,
            library,
            cleanup,
            maintenance_running: false,
            startup_time: Utc::now(),
        }
    }
}

/// CORS for the configured origins; any origin when the list is empty
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

/// Build application router
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .merge(api::montage_routes())
        .merge(api::websocket_routes())
        .merge(api::usage_routes())
        .merge(api::library_routes())
        .merge(api::cleanup_routes())
        .merge(api::health_routes())
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
