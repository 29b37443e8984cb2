//! Server-Sent Events (SSE) utilities
//!
//! Turns a job's progress subscription into an SSE response.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::events::MontageEvent;

/// Heartbeat interval shared by every SSE stream
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Encode a montage event as an SSE frame
///
/// The SSE event name is the event kind; the data is the full
/// `{"type", "data"}` JSON so SSE and WebSocket clients parse the same payload.
pub fn montage_event_frame(event: &MontageEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(json) => Event::default().event(event.event_type()).data(json),
        Err(e) => {
            warn!("Failed to serialize montage event: {}", e);
            Event::default().comment("serialization error")
        }
    }
}

/// Runs a callback once when dropped
struct OnClose<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> Drop for OnClose<F> {
    fn drop(&mut self) {
        if let Some(callback) = self.0.take() {
            callback();
        }
    }
}

/// Create an SSE stream over a job's event receiver
///
/// `initial` is sent first (usually the job status snapshot). The stream
/// ends after a terminal event or when the sender side is dropped.
/// `on_close` runs exactly once when the stream goes away, whether it
/// finished or the client disconnected, and should release the subscription.
///
/// # Example
/// ```rust,ignore
/// let sub = state.orchestrator.subscribe(job_id)?;
/// let orchestrator = state.orchestrator.clone();
/// junt_common::sse::create_job_sse_stream(job_id.to_string(), None, sub.rx, move || {
///     orchestrator.unsubscribe(job_id, sub.id)
/// })
/// ```
pub fn create_job_sse_stream<F>(
    job_id: String,
    initial: Option<MontageEvent>,
    mut rx: mpsc::Receiver<MontageEvent>,
    on_close: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    F: FnOnce() + Send + 'static,
{
    info!("New SSE client connected to job {}", job_id);
    let guard = OnClose(Some(on_close));

    let stream = async_stream::stream! {
        let _guard = guard;

        if let Some(event) = initial {
            let terminal = event.is_terminal();
            yield Ok(montage_event_frame(&event));
            if terminal {
                return;
            }
        }

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                received = rx.recv() => {
                    match received {
                        Some(event) => {
                            let terminal = event.is_terminal();
                            yield Ok(montage_event_frame(&event));
                            if terminal {
                                debug!("SSE: job {} reached terminal event", job_id);
                                break;
                            }
                        }
                        None => {
                            debug!("SSE: job {} channel closed", job_id);
                            break;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    yield Ok(Event::default().comment("heartbeat"));
                }
            }
        }

        info!("SSE: job {} event stream ended", job_id);
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat"))
}
