//! WebSocket progress endpoint
//!
//! GET /ws/progress/:job_id
//!
//! Frames are JSON text: first `{"type":"status","data":<job>}`, then every
//! job event as `{"type","data"}`. A text `ping` is answered with `pong`.
//! Unknown jobs get one `error` frame and the socket is closed.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use uuid::Uuid;

use crate::services::progress_channel::Subscription;
use crate::AppState;

/// GET /ws/progress/:job_id
pub async fn progress_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, raw_id))
}

async fn send_json(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    value: &serde_json::Value,
) -> bool {
    sender.send(Message::Text(value.to_string())).await.is_ok()
}

async fn handle_socket(socket: WebSocket, state: AppState, raw_id: String) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading the snapshot so no event falls in between
    let subscription = Uuid::parse_str(&raw_id)
        .ok()
        .and_then(|id| state.orchestrator.subscribe(id));
    let snapshot = match &subscription {
        Some(sub) => state.orchestrator.get_status(sub.job_id).await,
        None => None,
    };

    let (Some(Subscription { job_id, id, mut rx }), Some(job)) = (subscription, snapshot) else {
        tracing::debug!(job_id = %raw_id, "WebSocket requested unknown job");
        let _ = send_json(&mut sender, &json!({"type": "error", "data": {"message": "Job not found"}})).await;
        let _ = sender.close().await;
        return;
    };

    tracing::info!(job_id = %job_id, subscriber = id, "WebSocket client connected");

    if !send_json(&mut sender, &json!({"type": "status", "data": job})).await {
        state.orchestrator.unsubscribe(job_id, id);
        return;
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text == "ping" && sender.send(Message::Text("pong".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(job_id = %job_id, "WebSocket error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }

            event = rx.recv() => {
                let Some(event) = event else { break };
                match serde_json::to_value(&event) {
                    Ok(value) => {
                        if !send_json(&mut sender, &value).await {
                            tracing::debug!(job_id = %job_id, "Failed to send event, client gone");
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(job_id = %job_id, "Failed to serialize event: {}", e),
                }
            }
        }
    }

    state.orchestrator.unsubscribe(job_id, id);
    tracing::info!(job_id = %job_id, subscriber = id, "WebSocket client disconnected");
}

/// Build WebSocket routes
pub fn websocket_routes() -> Router<AppState> {
    Router::new().route("/ws/progress/:job_id", get(progress_ws))
}
