use sqlx::Row;

use super::repository::{flag, new_id, now, Repository};
use crate::errors::AppError;
use crate::models::{
    collections, ApprovalStatus, ChangeKind, ContentStatus, CreatePrayerRequest, PrayerItem,
    PrayerKind, UserProfile,
};

const PRAYER_COLUMNS: &str = "id, title, content, kind, author_id, author_name, anonymous, status, \
     approval, created_at, updated_at, version";

impl Repository {
    /// Every prayer item, optionally filtered by approval state. Moderator view.
    pub async fn list_prayer_items(
        &self,
        approval: Option<ApprovalStatus>,
    ) -> Result<Vec<PrayerItem>, AppError> {
        let rows = match approval {
            Some(approval) => {
                sqlx::query(&format!(
                    "SELECT {} FROM prayer_items WHERE approval = ? ORDER BY created_at DESC",
                    PRAYER_COLUMNS
                ))
                .bind(approval.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM prayer_items ORDER BY created_at DESC",
                    PRAYER_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(prayer_from_row).collect())
    }

    /// Approved active items plus everything the viewer authored.
    pub async fn list_visible_prayer_items(
        &self,
        viewer_id: &str,
    ) -> Result<Vec<PrayerItem>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM prayer_items \
             WHERE (approval = 'approved' AND status = 'active') OR author_id = ? \
             ORDER BY created_at DESC",
            PRAYER_COLUMNS
        ))
        .bind(viewer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(prayer_from_row).collect())
    }

    pub async fn get_prayer_item(&self, id: &str) -> Result<Option<PrayerItem>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM prayer_items WHERE id = ?",
            PRAYER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(prayer_from_row))
    }

    /// Submit a prayer item. Moderator submissions skip the review queue.
    pub async fn create_prayer_item(
        &self,
        author: &UserProfile,
        request: &CreatePrayerRequest,
        approval: ApprovalStatus,
    ) -> Result<PrayerItem, AppError> {
        let id = new_id();
        let now = now();

        let mut tx = self.begin().await?;
        sqlx::query(
            "INSERT INTO prayer_items (id, title, content, kind, author_id, author_name, anonymous, status, \
             approval, created_at, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, 'active', ?, ?, ?, 1)",
        )
        .bind(&id)
        .bind(request.title.trim())
        .bind(&request.content)
        .bind(request.kind.as_str())
        .bind(&author.id)
        .bind(&author.display_name)
        .bind(request.anonymous as i32)
        .bind(approval.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        self.commit_one(tx, collections::PRAYER, &id, ChangeKind::Created)
            .await?;

        Ok(PrayerItem {
            id,
            title: request.title.trim().to_string(),
            content: request.content.clone(),
            kind: request.kind,
            author_id: Some(author.id.clone()),
            author_name: author.display_name.clone(),
            anonymous: request.anonymous,
            status: ContentStatus::Active,
            approval,
            created_at: now.clone(),
            updated_at: now,
            version: 1,
        })
    }

    pub async fn set_prayer_approval(
        &self,
        id: &str,
        approval: ApprovalStatus,
    ) -> Result<PrayerItem, AppError> {
        let existing = self.require_prayer_item(id).await?;
        let now = now();

        let mut tx = self.begin().await?;
        sqlx::query(
            "UPDATE prayer_items SET approval = ?, updated_at = ?, version = version + 1 WHERE id = ?",
        )
        .bind(approval.as_str())
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        self.commit_one(tx, collections::PRAYER, id, ChangeKind::Updated)
            .await?;

        Ok(PrayerItem {
            approval,
            updated_at: now,
            version: existing.version + 1,
            ..existing
        })
    }

    pub async fn set_prayer_status(
        &self,
        id: &str,
        status: ContentStatus,
    ) -> Result<PrayerItem, AppError> {
        let existing = self.require_prayer_item(id).await?;
        let now = now();

        let mut tx = self.begin().await?;
        sqlx::query(
            "UPDATE prayer_items SET status = ?, updated_at = ?, version = version + 1 WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        self.commit_one(tx, collections::PRAYER, id, ChangeKind::Updated)
            .await?;

        Ok(PrayerItem {
            status,
            updated_at: now,
            version: existing.version + 1,
            ..existing
        })
    }

    pub async fn delete_prayer_item(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query("DELETE FROM prayer_items WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Prayer item {} not found", id)));
        }

        self.commit_one(tx, collections::PRAYER, id, ChangeKind::Deleted)
            .await?;
        Ok(())
    }

    pub async fn require_prayer_item(&self, id: &str) -> Result<PrayerItem, AppError> {
        self.get_prayer_item(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Prayer item {} not found", id)))
    }
}

fn prayer_from_row(row: &sqlx::sqlite::SqliteRow) -> PrayerItem {
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    let approval: String = row.get("approval");
    PrayerItem {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        kind: PrayerKind::parse(&kind).unwrap_or(PrayerKind::Prayer),
        author_id: Some(row.get("author_id")),
        author_name: row.get("author_name"),
        anonymous: flag(row, "anonymous"),
        status: ContentStatus::parse(&status).unwrap_or(ContentStatus::Active),
        approval: ApprovalStatus::parse(&approval).unwrap_or(ApprovalStatus::Pending),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}
