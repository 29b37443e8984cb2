//! Anonymous usage quota
//!
//! A caller is identified by three independent signals: network address,
//! a fingerprint of request headers and a session token. Usage is recorded
//! against all three, so clearing any one of them does not reset the quota.
//!
//! The check and the record are separate calls; two concurrent requests
//! from one identity can both pass. Store errors fail open.

use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::models::{IdentitySignals, QuotaDecision, SignalKind, UsageInfo};
use crate::types::UsageStore;

/// Header carrying the caller's session token
pub const SESSION_HEADER: &str = "x-session-id";

/// Headers hashed into the fingerprint, in order
const FINGERPRINT_HEADERS: [&str; 4] = ["user-agent", "accept", "accept-language", "accept-encoding"];

/// Source of "now" for window calculations
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Client address: first `X-Forwarded-For` entry, then `X-Real-IP`, then the peer
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    peer.map(|p| p.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// SHA-256 hex of `user-agent|accept|accept-language|accept-encoding`
pub fn header_fingerprint(headers: &HeaderMap) -> String {
    let joined = FINGERPRINT_HEADERS
        .iter()
        .map(|name| headers.get(*name).and_then(|v| v.to_str().ok()).unwrap_or(""))
        .collect::<Vec<_>>()
        .join("|");

    let digest = Sha256::digest(joined.as_bytes());
    format!("{:x}", digest)
}

/// Derive all three identity signals from a request
///
/// A missing or blank session header gets a fresh token.
pub fn identity_signals(headers: &HeaderMap, peer: Option<SocketAddr>) -> IdentitySignals {
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    IdentitySignals {
        ip_address: client_address(headers, peer),
        fingerprint: header_fingerprint(headers),
        session_id,
    }
}

/// Multi-signal anonymous quota
#[derive(Clone)]
pub struct QuotaTracker {
    store: Arc<dyn UsageStore>,
    clock: Arc<dyn Clock>,
    max_jobs: u32,
    window: Duration,
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn UsageStore>, max_jobs: u32, window_hours: u32) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), max_jobs, window_hours)
    }

    pub fn with_clock(
        store: Arc<dyn UsageStore>,
        clock: Arc<dyn Clock>,
        max_jobs: u32,
        window_hours: u32,
    ) -> Self {
        Self {
            store,
            clock,
            max_jobs,
            window: Duration::hours(window_hours as i64),
        }
    }

    pub fn limit(&self) -> u32 {
        self.max_jobs
    }

    /// Whether this identity may start another job
    ///
    /// Denied when any signal's record inside the window has reached the
    /// limit.
    pub async fn check_limit(&self, signals: &IdentitySignals) -> QuotaDecision {
        let cutoff = self.clock.now() - self.window;
        let mut montage_count = 0;
        let mut tracked_by = Vec::new();

        for (kind, key) in signals.keys() {
            match self.store.find_active(kind, key, cutoff).await {
                Ok(Some(record)) => {
                    montage_count = montage_count.max(record.count);
                    tracked_by.push(kind);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        signal = kind.as_str(),
                        error = %e,
                        "Usage lookup failed, ignoring signal"
                    );
                }
            }
        }

        QuotaDecision {
            allowed: montage_count < self.max_jobs,
            session_id: signals.session_id.clone(),
            usage: UsageInfo {
                montage_count,
                limit: self.max_jobs,
                tracked_by,
            },
        }
    }

    /// Count one job against every signal
    pub async fn record_usage(&self, signals: &IdentitySignals) {
        let now = self.clock.now();
        for (kind, key) in signals.keys() {
            if let Err(e) = self.store.increment(kind, key, now).await {
                tracing::warn!(signal = kind.as_str(), error = %e, "Failed to record usage");
            }
        }
        tracing::debug!(session_id = %signals.session_id, "Recorded anonymous usage");
    }

    /// Read-only usage summary
    pub async fn get_usage_info(&self, signals: &IdentitySignals) -> QuotaDecision {
        self.check_limit(signals).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UsageRecord;
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use std::collections::HashMap;

    /// In-memory store for tracker logic tests
    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<HashMap<(SignalKind, String), UsageRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl UsageStore for MemoryStore {
        async fn find_active(
            &self,
            kind: SignalKind,
            key: &str,
            since: DateTime<Utc>,
        ) -> junt_common::Result<Option<UsageRecord>> {
            if self.fail {
                return Err(junt_common::Error::Internal("store down".to_string()));
            }
            let records = self.records.lock().unwrap();
            Ok(records
                .get(&(kind, key.to_string()))
                .filter(|r| r.last_activity >= since)
                .cloned())
        }

        async fn increment(&self, kind: SignalKind, key: &str, now: DateTime<Utc>) -> junt_common::Result<()> {
            if self.fail {
                return Err(junt_common::Error::Internal("store down".to_string()));
            }
            let mut records = self.records.lock().unwrap();
            let record = records.entry((kind, key.to_string())).or_insert(UsageRecord {
                kind,
                key: key.to_string(),
                count: 0,
                first_seen: now,
                last_activity: now,
            });
            record.count += 1;
            record.last_activity = now;
            Ok(())
        }
    }

    fn signals(session: &str) -> IdentitySignals {
        IdentitySignals {
            ip_address: "203.0.113.7".to_string(),
            fingerprint: "abc".to_string(),
            session_id: session.to_string(),
        }
    }

    #[tokio::test]
    async fn test_quota_window() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let tracker = QuotaTracker::with_clock(Arc::new(MemoryStore::default()), clock.clone(), 1, 24);
        let who = signals("s-1");

        let fresh = tracker.check_limit(&who).await;
        assert!(fresh.allowed);
        assert_eq!(fresh.usage.montage_count, 0);
        assert!(fresh.usage.tracked_by.is_empty());

        tracker.record_usage(&who).await;
        let after = tracker.check_limit(&who).await;
        assert!(!after.allowed);
        assert_eq!(after.usage.montage_count, 1);
        assert_eq!(
            after.usage.tracked_by,
            vec![SignalKind::Ip, SignalKind::Fingerprint, SignalKind::Session]
        );

        clock.advance(Duration::hours(25));
        assert!(tracker.check_limit(&who).await.allowed);
    }

    #[tokio::test]
    async fn test_new_session_same_address_is_denied() {
        let tracker = QuotaTracker::new(Arc::new(MemoryStore::default()), 1, 24);
        tracker.record_usage(&signals("first")).await;

        let decision = tracker.check_limit(&signals("cleared-cookie")).await;
        assert!(!decision.allowed);
        assert!(!decision.usage.tracked_by.contains(&SignalKind::Session));
        assert_eq!(decision.session_id, "cleared-cookie");
    }

    #[tokio::test]
    async fn test_store_errors_fail_open() {
        let store = MemoryStore {
            fail: true,
            ..Default::default()
        };
        let tracker = QuotaTracker::new(Arc::new(store), 1, 24);
        let who = signals("s");
        tracker.record_usage(&who).await;
        assert!(tracker.check_limit(&who).await.allowed);
    }

    #[test]
    fn test_client_address_precedence() {
        let peer: SocketAddr = "192.0.2.1:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_address(&headers, Some(peer)), "192.0.2.1");

        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(client_address(&headers, Some(peer)), "198.51.100.4");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_address(&headers, Some(peer)), "203.0.113.9");

        assert_eq!(client_address(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn test_fingerprint_depends_on_headers() {
        let mut a = HeaderMap::new();
        a.insert("user-agent", HeaderValue::from_static("Mozilla/5.0"));
        let mut b = a.clone();
        b.insert("accept-language", HeaderValue::from_static("de-DE"));

        let fa = header_fingerprint(&a);
        assert_eq!(fa.len(), 64);
        assert_eq!(fa, header_fingerprint(&a.clone()));
        assert_ne!(fa, header_fingerprint(&b));
    }

    #[test]
    fn test_session_generated_when_absent() {
        let signals = identity_signals(&HeaderMap::new(), None);
        assert!(Uuid::parse_str(&signals.session_id).is_ok());

        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("my-session"));
        assert_eq!(identity_signals(&headers, None).session_id, "my-session");
    }
}
