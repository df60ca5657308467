//! Announcement and event category persistence.

use sqlx::Row;

use super::repository::{
    blank_to_none, check_version, concurrent_modification, new_id, now, patch_optional, Repository,
};
use crate::errors::AppError;
use crate::models::{
    collections, Announcement, ChangeKind, ContentStatus, CreateAnnouncementRequest,
    CreateEventCategoryRequest, EventCategory, UpdateAnnouncementRequest, UserProfile,
};

const ANNOUNCEMENT_COLUMNS: &str =
    "id, title, content, category, author_id, author_name, status, created_at, updated_at, version";

impl Repository {
    /// List announcements with the given status, newest first.
    pub async fn list_announcements(
        &self,
        status: ContentStatus,
    ) -> Result<Vec<Announcement>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM announcements WHERE status = ? ORDER BY created_at DESC",
            ANNOUNCEMENT_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(announcement_from_row).collect())
    }

    /// Active announcements created at or after `since` (RFC 3339), newest first.
    pub async fn announcements_since(&self, since: &str) -> Result<Vec<Announcement>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM announcements WHERE status = 'active' AND created_at >= ? ORDER BY created_at DESC",
            ANNOUNCEMENT_COLUMNS
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(announcement_from_row).collect())
    }

    pub async fn get_announcement(&self, id: &str) -> Result<Option<Announcement>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM announcements WHERE id = ?",
            ANNOUNCEMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(announcement_from_row))
    }

    pub async fn create_announcement(
        &self,
        author: &UserProfile,
        request: &CreateAnnouncementRequest,
    ) -> Result<Announcement, AppError> {
        let id = new_id();
        let now = now();
        let category = blank_to_none(request.category.clone());

        let mut tx = self.begin().await?;
        sqlx::query(
            "INSERT INTO announcements (id, title, content, category, author_id, author_name, status, created_at, updated_at, version) \
             VALUES (?, ?, ?, ?, ?, ?, 'active', ?, ?, 1)",
        )
        .bind(&id)
        .bind(request.title.trim())
        .bind(&request.content)
        .bind(&category)
        .bind(&author.id)
        .bind(&author.display_name)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        self.commit_one(tx, collections::ANNOUNCEMENTS, &id, ChangeKind::Created)
            .await?;

        Ok(Announcement {
            id,
            title: request.title.trim().to_string(),
            content: request.content.clone(),
            category,
            author_id: author.id.clone(),
            author_name: author.display_name.clone(),
            status: ContentStatus::Active,
            created_at: now.clone(),
            updated_at: now,
            version: 1,
        })
    }

    /// Edit an announcement with optimistic concurrency control.
    pub async fn update_announcement(
        &self,
        id: &str,
        request: &UpdateAnnouncementRequest,
    ) -> Result<Announcement, AppError> {
        let existing = self.require_announcement(id).await?;
        check_version(request.expected_version, existing.version)?;

        let title = request
            .title
            .as_ref()
            .map(|t| t.trim().to_string())
            .unwrap_or_else(|| existing.title.clone());
        let content = request
            .content
            .clone()
            .unwrap_or_else(|| existing.content.clone());
        let category = patch_optional(&request.category, &existing.category);
        let now = now();

        let mut tx = self.begin().await?;
        let result = sqlx::query(
            "UPDATE announcements SET title = ?, content = ?, category = ?, updated_at = ?, version = version + 1 \
             WHERE id = ? AND version = ?",
        )
        .bind(&title)
        .bind(&content)
        .bind(&category)
        .bind(&now)
        .bind(id)
        .bind(existing.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(concurrent_modification(existing.version));
        }
        self.commit_one(tx, collections::ANNOUNCEMENTS, id, ChangeKind::Updated)
            .await?;

        Ok(Announcement {
            title,
            content,
            category,
            updated_at: now,
            version: existing.version + 1,
            ..existing
        })
    }

    pub async fn set_announcement_status(
        &self,
        id: &str,
        status: ContentStatus,
    ) -> Result<Announcement, AppError> {
        let existing = self.require_announcement(id).await?;
        let now = now();

        let mut tx = self.begin().await?;
        sqlx::query(
            "UPDATE announcements SET status = ?, updated_at = ?, version = version + 1 WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        self.commit_one(tx, collections::ANNOUNCEMENTS, id, ChangeKind::Updated)
            .await?;

        Ok(Announcement {
            status,
            updated_at: now,
            version: existing.version + 1,
            ..existing
        })
    }

    pub async fn delete_announcement(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query("DELETE FROM announcements WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Announcement {} not found", id)));
        }

        self.commit_one(tx, collections::ANNOUNCEMENTS, id, ChangeKind::Deleted)
            .await?;
        Ok(())
    }

    async fn require_announcement(&self, id: &str) -> Result<Announcement, AppError> {
        self.get_announcement(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Announcement {} not found", id)))
    }

    // ==================== EVENT CATEGORIES ====================

    pub async fn list_event_categories(&self) -> Result<Vec<EventCategory>, AppError> {
        let rows = sqlx::query("SELECT id, name, color, created_at FROM event_categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| EventCategory {
                id: row.get("id"),
                name: row.get("name"),
                color: row.get("color"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    pub async fn create_event_category(
        &self,
        request: &CreateEventCategoryRequest,
    ) -> Result<EventCategory, AppError> {
        let name = request.name.trim().to_string();
        let exists = sqlx::query("SELECT id FROM event_categories WHERE name = ? COLLATE NOCASE")
            .bind(&name)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_some() {
            return Err(AppError::Rejected(format!("Category '{}' already exists", name)));
        }

        let id = new_id();
        let now = now();
        let color = blank_to_none(request.color.clone());

        let mut tx = self.begin().await?;
        sqlx::query("INSERT INTO event_categories (id, name, color, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(&name)
            .bind(&color)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        self.commit_one(tx, collections::EVENT_CATEGORIES, &id, ChangeKind::Created)
            .await?;

        Ok(EventCategory {
            id,
            name,
            color,
            created_at: now,
        })
    }

    pub async fn delete_event_category(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query("DELETE FROM event_categories WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Category {} not found", id)));
        }

        self.commit_one(tx, collections::EVENT_CATEGORIES, id, ChangeKind::Deleted)
            .await?;
        Ok(())
    }
}

fn announcement_from_row(row: &sqlx::sqlite::SqliteRow) -> Announcement {
    let status: String = row.get("status");
    Announcement {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        category: row.get("category"),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        status: ContentStatus::parse(&status).unwrap_or(ContentStatus::Active),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}
