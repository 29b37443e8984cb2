//! Saved montage storage

use async_trait::async_trait;
use junt_common::models::{AlbumDescriptor, DurationPreset, TrackArtifact};
use junt_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp};
use crate::models::SavedMontage;
use crate::types::MontageRepository;

#[derive(Clone)]
pub struct SqliteMontageRepository {
    pool: SqlitePool,
}

impl SqliteMontageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn to_json<T: serde::Serialize>(what: &str, value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Internal(format!("Failed to serialize {}: {}", what, e)))
}

fn from_row(row: &SqliteRow) -> Result<SavedMontage> {
    let id: String = row.get("id");
    let job_id: String = row.get("job_id");
    let album: String = row.get("album");
    let duration: String = row.get("duration");
    let track_files: String = row.get("track_files");
    let created_at: String = row.get("created_at");

    let album: AlbumDescriptor = serde_json::from_str(&album)
        .map_err(|e| Error::Internal(format!("Failed to deserialize album: {}", e)))?;
    let track_files: Vec<TrackArtifact> = serde_json::from_str(&track_files)
        .map_err(|e| Error::Internal(format!("Failed to deserialize track_files: {}", e)))?;

    Ok(SavedMontage {
        id: Uuid::parse_str(&id).map_err(|e| Error::Internal(format!("Invalid montage id: {}", e)))?,
        job_id: Uuid::parse_str(&job_id).map_err(|e| Error::Internal(format!("Invalid job id: {}", e)))?,
        album,
        duration: duration.parse::<DurationPreset>()?,
        file_path: row.get("file_path"),
        track_files,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[async_trait]
impl MontageRepository for SqliteMontageRepository {
    async fn save(&self, montage: &SavedMontage) -> Result<()> {
        let album = to_json("album", &montage.album)?;
        let track_files = to_json("track_files", &montage.track_files)?;

        sqlx::query(
            r#"
            INSERT INTO montages (id, job_id, album, duration, file_path, track_files, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(montage.id.to_string())
        .bind(montage.job_id.to_string())
        .bind(&album)
        .bind(montage.duration.as_str())
        .bind(&montage.file_path)
        .bind(&track_files)
        .bind(format_timestamp(montage.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, skip: u32, limit: u32) -> Result<Vec<SavedMontage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, job_id, album, duration, file_path, track_files, created_at
            FROM montages
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit as i64)
        .bind(skip as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(from_row).collect()
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM montages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn get(&self, id: Uuid) -> Result<Option<SavedMontage>> {
        let row = sqlx::query(
            r#"
            SELECT id, job_id, album, duration, file_path, track_files, created_at
            FROM montages
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(from_row).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM montages WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use chrono::{Duration, Utc};
    use junt_common::models::TrackInfo;

    fn montage(created_at: chrono::DateTime<Utc>) -> SavedMontage {
        SavedMontage {
            id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            album: AlbumDescriptor {
                id: "rel".into(),
                title: "Album".into(),
                artist: "Artist".into(),
                year: Some(2001),
                cover_url: None,
                tracks: vec![TrackInfo {
                    number: 1,
                    title: "One".into(),
                    duration_seconds: Some(200),
                }],
            },
            duration: DurationPreset::Long,
            file_path: Some("/lib/x.wav".into()),
            track_files: vec![TrackArtifact {
                track_number: 1,
                track_title: "One".into(),
                file_path: "/lib/x_track_1.wav".into(),
            }],
            created_at,
        }
    }

    #[tokio::test]
    async fn test_save_get_delete() {
        let repo = SqliteMontageRepository::new(memory_pool().await);
        let saved = montage(Utc::now());
        repo.save(&saved).await.unwrap();

        let loaded = repo.get(saved.id).await.unwrap().unwrap();
        assert_eq!(loaded.album, saved.album);
        assert_eq!(loaded.track_files, saved.track_files);
        assert_eq!(loaded.duration, DurationPreset::Long);

        assert!(repo.delete(saved.id).await.unwrap());
        assert!(!repo.delete(saved.id).await.unwrap());
        assert!(repo.get(saved.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first_with_paging() {
        let repo = SqliteMontageRepository::new(memory_pool().await);
        let now = Utc::now();
        let older = montage(now - Duration::hours(2));
        let newer = montage(now);
        repo.save(&older).await.unwrap();
        repo.save(&newer).await.unwrap();

        let page = repo.list(0, 10).await.unwrap();
        assert_eq!(page.iter().map(|m| m.id).collect::<Vec<_>>(), vec![newer.id, older.id]);

        let second = repo.list(1, 1).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, older.id);
        assert_eq!(repo.count().await.unwrap(), 2);
    }
}
