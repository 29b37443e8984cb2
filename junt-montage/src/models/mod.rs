//! Data models for junt-montage
//!
//! - Job state machine and per-track progress
//! - Anonymous usage records
//! - Library handoff shapes

pub mod job;
pub mod library;
pub mod usage;

pub use job::Job;
pub use library::{CompletedMontage, SavedMontage};
pub use usage::{IdentitySignals, QuotaDecision, SignalKind, UsageInfo, UsageRecord};
