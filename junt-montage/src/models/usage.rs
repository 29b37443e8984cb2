//! Anonymous usage tracking records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity signal kind; each kind keeps its own usage record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Client network address
    Ip,
    /// Hash of the client's request headers
    Fingerprint,
    /// Caller-held session token
    Session,
}

impl SignalKind {
    pub const ALL: [SignalKind; 3] = [SignalKind::Ip, SignalKind::Fingerprint, SignalKind::Session];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Ip => "ip",
            SignalKind::Fingerprint => "fingerprint",
            SignalKind::Session => "session",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ip" => Some(SignalKind::Ip),
            "fingerprint" => Some(SignalKind::Fingerprint),
            "session" => Some(SignalKind::Session),
            _ => None,
        }
    }
}

/// The three identity signals of one caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySignals {
    pub ip_address: String,
    pub fingerprint: String,
    pub session_id: String,
}

impl IdentitySignals {
    /// (kind, key) pairs in a fixed order
    pub fn keys(&self) -> [(SignalKind, &str); 3] {
        [
            (SignalKind::Ip, self.ip_address.as_str()),
            (SignalKind::Fingerprint, self.fingerprint.as_str()),
            (SignalKind::Session, self.session_id.as_str()),
        ]
    }
}

/// Stored usage counter for one signal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub kind: SignalKind,
    pub key: String,
    pub count: u32,
    pub first_seen: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Usage summary returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageInfo {
    /// Highest count across matching signals
    pub montage_count: u32,
    pub limit: u32,
    /// Signal kinds that had a record inside the window
    pub tracked_by: Vec<SignalKind>,
}

/// Outcome of a quota check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub session_id: String,
    pub usage: UsageInfo,
}
