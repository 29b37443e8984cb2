//! Anonymous usage counters

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use junt_common::Result;
use sqlx::{Row, SqlitePool};

use super::{format_timestamp, parse_timestamp};
use crate::models::{SignalKind, UsageRecord};
use crate::types::UsageStore;

#[derive(Clone)]
pub struct SqliteUsageStore {
    pool: SqlitePool,
}

impl SqliteUsageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageStore for SqliteUsageStore {
    async fn find_active(
        &self,
        kind: SignalKind,
        key: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<UsageRecord>> {
        let row = sqlx::query(
            r#"
            SELECT count, first_seen, last_activity
            FROM anonymous_usage
            WHERE kind = ? AND key = ?
            "#,
        )
        .bind(kind.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let last_activity = parse_timestamp("last_activity", &row.get::<String, _>("last_activity"))?;
        if last_activity < since {
            return Ok(None);
        }

        Ok(Some(UsageRecord {
            kind,
            key: key.to_string(),
            count: row.get::<i64, _>("count").max(0) as u32,
            first_seen: parse_timestamp("first_seen", &row.get::<String, _>("first_seen"))?,
            last_activity,
        }))
    }

    async fn increment(&self, kind: SignalKind, key: &str, now: DateTime<Utc>) -> Result<()> {
        let now = format_timestamp(now);
        sqlx::query(
            r#"
            INSERT INTO anonymous_usage (kind, key, count, first_seen, last_activity)
            VALUES (?, ?, 1, ?, ?)
            ON CONFLICT(kind, key) DO UPDATE SET
                count = count + 1,
                last_activity = excluded.last_activity
            "#,
        )
        .bind(kind.as_str())
        .bind(key)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use chrono::Duration;

    #[tokio::test]
    async fn test_increment_creates_then_counts() {
        let store = SqliteUsageStore::new(memory_pool().await);
        let t0 = Utc::now();

        assert!(store.find_active(SignalKind::Ip, "1.2.3.4", t0).await.unwrap().is_none());

        store.increment(SignalKind::Ip, "1.2.3.4", t0).await.unwrap();
        store.increment(SignalKind::Ip, "1.2.3.4", t0 + Duration::minutes(5)).await.unwrap();

        let record = store
            .find_active(SignalKind::Ip, "1.2.3.4", t0 - Duration::hours(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.count, 2);
        assert!(record.last_activity > record.first_seen);

        // Same key under another kind is a separate record
        assert!(store
            .find_active(SignalKind::Session, "1.2.3.4", t0 - Duration::hours(1))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_stale_record_is_inactive() {
        let store = SqliteUsageStore::new(memory_pool().await);
        let t0 = Utc::now() - Duration::hours(30);
        store.increment(SignalKind::Fingerprint, "abc", t0).await.unwrap();

        let since = Utc::now() - Duration::hours(24);
        assert!(store.find_active(SignalKind::Fingerprint, "abc", since).await.unwrap().is_none());
    }
}
