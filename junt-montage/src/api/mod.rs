//! HTTP and WebSocket handlers for junt-montage
//!
//! - `/api/montage/*`: job creation, status, downloads, SSE events
//! - `/ws/progress/:job_id`: WebSocket progress
//! - `/api/anonymous/usage`, `/api/library/*`, `/api/cleanup/*`, `/health`

pub mod cleanup;
pub mod health;
pub mod library;
pub mod montage;
pub mod progress_ws;
pub mod usage;

pub use cleanup::cleanup_routes;
pub use health::health_routes;
pub use library::library_routes;
pub use montage::montage_routes;
pub use progress_ws::websocket_routes;
pub use usage::usage_routes;
