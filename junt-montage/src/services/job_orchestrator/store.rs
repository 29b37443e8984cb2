//! Process-wide job storage
//!
//! Each job sits behind its own lock so a composite update (status,
//! counters, track list) is seen by readers all at once or not at all.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::Job;

#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<Uuid, Arc<RwLock<Job>>>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job: Job) {
        let id = job.job_id;
        self.jobs.write().await.insert(id, Arc::new(RwLock::new(job)));
    }

    async fn entry(&self, id: Uuid) -> Option<Arc<RwLock<Job>>> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// Consistent copy of a job
    pub async fn snapshot(&self, id: Uuid) -> Option<Job> {
        let entry = self.entry(id).await?;
        let job = entry.read().await;
        Some(job.clone())
    }

    /// Apply `f` under the job's write lock
    pub async fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut Job) -> R) -> Option<R> {
        let entry = self.entry(id).await?;
        let mut job = entry.write().await;
        Some(f(&mut job))
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.jobs.read().await.contains_key(&id)
    }

    /// Jobs that have not reached a terminal state
    pub async fn active_count(&self) -> usize {
        let entries: Vec<_> = self.jobs.read().await.values().cloned().collect();
        let mut active = 0;
        for entry in entries {
            if !entry.read().await.is_terminal() {
                active += 1;
            }
        }
        active
    }

    /// Remove terminal jobs that finished before `cutoff`; returns their ids
    pub async fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> Vec<Uuid> {
        let entries: Vec<_> = self
            .jobs
            .read()
            .await
            .iter()
            .map(|(id, entry)| (*id, entry.clone()))
            .collect();

        let mut expired = Vec::new();
        for (id, entry) in entries {
            let job = entry.read().await;
            if job.is_terminal() && job.finished_at.map_or(false, |t| t < cutoff) {
                expired.push(id);
            }
        }

        if !expired.is_empty() {
            let mut jobs = self.jobs.write().await;
            for id in &expired {
                jobs.remove(id);
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use junt_common::models::{DurationPreset, JobState};

    #[tokio::test]
    async fn test_update_and_snapshot() {
        let store = JobStore::new();
        let job = Job::new("rel", DurationPreset::Short);
        let id = job.job_id;
        store.insert(job).await;

        let moved = store.update(id, |j| j.transition_to(JobState::Processing)).await;
        assert_eq!(moved, Some(true));
        assert_eq!(store.snapshot(id).await.unwrap().status, JobState::Processing);
        assert_eq!(store.active_count().await, 1);
        assert!(store.update(Uuid::new_v4(), |_| ()).await.is_none());
    }

    #[tokio::test]
    async fn test_eviction_only_removes_old_terminal_jobs() {
        let store = JobStore::new();

        let mut done = Job::new("a", DurationPreset::Short);
        done.transition_to(JobState::Failed);
        let done_id = done.job_id;
        store.insert(done).await;

        let running = Job::new("b", DurationPreset::Short);
        let running_id = running.job_id;
        store.insert(running).await;

        let evicted = store
            .evict_finished_before(Utc::now() + chrono::Duration::seconds(1))
            .await;
        assert_eq!(evicted, vec![done_id]);
        assert!(!store.contains(done_id).await);
        assert!(store.contains(running_id).await);
    }
}
