use sqlx::Row;

use super::repository::{blank_to_none, new_id, now, Repository, Touched};
use crate::errors::AppError;
use crate::models::{
    collections, video_id_from_url, ChangeKind, CreateSermonRequest, Sermon, SyncReport, VideoItem,
};

const SERMON_COLUMNS: &str =
    "id, title, speaker, preached_on, video_id, video_url, description, thumbnail_url, created_at";

impl Repository {
    /// Sermons, most recently preached first; undated entries last.
    pub async fn list_sermons(&self) -> Result<Vec<Sermon>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM sermons ORDER BY preached_on IS NULL, preached_on DESC, created_at DESC",
            SERMON_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(sermon_from_row).collect())
    }

    pub async fn create_sermon(&self, request: &CreateSermonRequest) -> Result<Sermon, AppError> {
        let video_url = blank_to_none(request.video_url.clone());
        let video_id = video_url.as_deref().and_then(video_id_from_url);

        if let Some(video_id) = &video_id {
            let exists = sqlx::query("SELECT id FROM sermons WHERE video_id = ?")
                .bind(video_id)
                .fetch_optional(&self.pool)
                .await?;
            if exists.is_some() {
                return Err(AppError::Rejected(
                    "A sermon for this video already exists".to_string(),
                ));
            }
        }

        let sermon = Sermon {
            id: new_id(),
            title: request.title.trim().to_string(),
            speaker: blank_to_none(request.speaker.clone()),
            preached_on: request.preached_on,
            thumbnail_url: video_id
                .as_ref()
                .map(|id| format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id)),
            video_id,
            video_url,
            description: blank_to_none(request.description.clone()),
            created_at: now(),
        };

        let mut tx = self.begin().await?;
        insert_sermon(&mut tx, &sermon).await?;
        self.commit_one(tx, collections::SERMONS, &sermon.id, ChangeKind::Created)
            .await?;

        Ok(sermon)
    }

    pub async fn delete_sermon(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query("DELETE FROM sermons WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Sermon {} not found", id)));
        }

        self.commit_one(tx, collections::SERMONS, id, ChangeKind::Deleted)
            .await?;
        Ok(())
    }

    /// Upsert playlist items by video id. Speaker and manual edits on existing
    /// rows are left alone; only title, description and thumbnail follow the feed.
    pub async fn sync_sermons(&self, videos: &[VideoItem]) -> Result<SyncReport, AppError> {
        let mut report = SyncReport::default();
        let mut tx = self.begin().await?;

        for video in videos {
            let existing = sqlx::query_scalar::<_, String>("SELECT id FROM sermons WHERE video_id = ?")
                .bind(&video.video_id)
                .fetch_optional(&mut *tx)
                .await?;

            match existing {
                Some(id) => {
                    let changed = sqlx::query(
                        "UPDATE sermons SET title = ?, description = ?, thumbnail_url = ? WHERE id = ? \
                         AND (title IS NOT ? OR description IS NOT ? OR thumbnail_url IS NOT ?)",
                    )
                    .bind(&video.title)
                    .bind(&video.description)
                    .bind(&video.thumbnail_url)
                    .bind(&id)
                    .bind(&video.title)
                    .bind(&video.description)
                    .bind(&video.thumbnail_url)
                    .execute(&mut *tx)
                    .await?;
                    if changed.rows_affected() > 0 {
                        report.updated += 1;
                    }
                }
                None => {
                    let sermon = Sermon {
                        id: new_id(),
                        title: video.title.clone(),
                        speaker: None,
                        preached_on: video.published_on,
                        video_id: Some(video.video_id.clone()),
                        video_url: Some(video.watch_url()),
                        description: video.description.clone(),
                        thumbnail_url: video.thumbnail_url.clone(),
                        created_at: now(),
                    };
                    insert_sermon(&mut tx, &sermon).await?;
                    report.added += 1;
                }
            }
        }

        if report.added + report.updated > 0 {
            self.commit(
                tx,
                vec![Touched::collection(collections::SERMONS, ChangeKind::Replaced)],
            )
            .await?;
        } else {
            tx.commit().await?;
        }

        Ok(report)
    }
}

async fn insert_sermon(tx: &mut super::repository::Tx, sermon: &Sermon) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO sermons (id, title, speaker, preached_on, video_id, video_url, description, thumbnail_url, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&sermon.id)
    .bind(&sermon.title)
    .bind(&sermon.speaker)
    .bind(sermon.preached_on)
    .bind(&sermon.video_id)
    .bind(&sermon.video_url)
    .bind(&sermon.description)
    .bind(&sermon.thumbnail_url)
    .bind(&sermon.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn sermon_from_row(row: &sqlx::sqlite::SqliteRow) -> Sermon {
    Sermon {
        id: row.get("id"),
        title: row.get("title"),
        speaker: row.get("speaker"),
        preached_on: row.get("preached_on"),
        video_id: row.get("video_id"),
        video_url: row.get("video_url"),
        description: row.get("description"),
        thumbnail_url: row.get("thumbnail_url"),
        created_at: row.get("created_at"),
    }
}
