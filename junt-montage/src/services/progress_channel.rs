//! Per-job progress fan-out
//!
//! Each subscriber owns a bounded queue. Broadcasting never blocks: a full
//! queue drops that event for that subscriber only, and a closed queue is
//! pruned. Subscribers may leave at any time, including mid-broadcast.

use junt_common::events::MontageEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Default per-subscriber queue depth
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Subscriber handle within one job
pub type SubscriberId = u64;

/// Receiving end of a subscription
#[derive(Debug)]
pub struct Subscription {
    pub job_id: Uuid,
    pub id: SubscriberId,
    pub rx: mpsc::Receiver<MontageEvent>,
}

type SubscriberMap = HashMap<Uuid, HashMap<SubscriberId, mpsc::Sender<MontageEvent>>>;

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Subscribers whose queue was full
    pub skipped: usize,
    /// Subscribers found closed and removed
    pub pruned: usize,
}

/// Per-job subscriber registry
#[derive(Clone)]
pub struct ProgressChannel {
    subscribers: Arc<RwLock<SubscriberMap>>,
    next_id: Arc<AtomicU64>,
    capacity: usize,
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl ProgressChannel {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            capacity: capacity.max(1),
        }
    }

    // A panic while holding the lock cannot leave the map half-updated,
    // so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, SubscriberMap> {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SubscriberMap> {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Create the empty subscriber set for a new job
    pub fn register_job(&self, job_id: Uuid) {
        self.write().entry(job_id).or_default();
    }

    /// Drop a job and all of its subscribers
    pub fn remove_job(&self, job_id: Uuid) {
        if let Some(subs) = self.write().remove(&job_id) {
            tracing::debug!(job_id = %job_id, subscribers = subs.len(), "Removed job subscribers");
        }
    }

    /// Add a subscriber; None if the job was never registered
    pub fn subscribe(&self, job_id: Uuid) -> Option<Subscription> {
        let mut map = self.write();
        let subs = map.get_mut(&job_id)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.capacity);
        subs.insert(id, tx);

        tracing::debug!(job_id = %job_id, subscriber = id, "Subscriber registered");
        Some(Subscription { job_id, id, rx })
    }

    /// Remove a subscriber; unknown ids are ignored
    pub fn unsubscribe(&self, job_id: Uuid, id: SubscriberId) {
        let mut map = self.write();
        if let Some(subs) = map.get_mut(&job_id) {
            if subs.remove(&id).is_some() {
                tracing::debug!(job_id = %job_id, subscriber = id, "Subscriber removed");
            }
        }
    }

    pub fn subscriber_count(&self, job_id: Uuid) -> usize {
        self.read().get(&job_id).map(|s| s.len()).unwrap_or(0)
    }

    /// Deliver `event` to every current subscriber of the job
    pub fn broadcast(&self, job_id: Uuid, event: &MontageEvent) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();

        {
            let map = self.read();
            let Some(subs) = map.get(&job_id) else {
                return report;
            };

            for (id, tx) in subs {
                match tx.try_send(event.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        report.skipped += 1;
                        tracing::warn!(
                            job_id = %job_id,
                            subscriber = id,
                            event = event.event_type(),
                            "Subscriber queue full, dropping event"
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut map = self.write();
            if let Some(subs) = map.get_mut(&job_id) {
                for id in &closed {
                    subs.remove(id);
                }
            }
            report.pruned = closed.len();
            tracing::debug!(job_id = %job_id, pruned = report.pruned, "Pruned closed subscribers");
        }

        report
    }
}
