//! Anonymous usage endpoint

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;

use crate::models::QuotaDecision;
use crate::services::quota_tracker::identity_signals;
use crate::AppState;

/// GET /api/anonymous/usage
///
/// Read-only; never counts against the quota.
pub async fn get_usage(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Json<QuotaDecision> {
    let signals = identity_signals(&headers, peer.map(|ConnectInfo(addr)| addr));
    Json(state.quota.get_usage_info(&signals).await)
}

/// Build usage routes
pub fn usage_routes() -> Router<AppState> {
    Router::new().route("/api/anonymous/usage", get(get_usage))
}
