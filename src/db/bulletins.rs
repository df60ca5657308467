use sqlx::Row;

use super::repository::{new_id, now, Repository};
use crate::errors::AppError;
use crate::models::{collections, Bulletin, ChangeKind, CreateBulletinRequest};

impl Repository {
    /// Bulletins, most recent service date first.
    pub async fn list_bulletins(&self) -> Result<Vec<Bulletin>, AppError> {
        let rows = sqlx::query(
            "SELECT id, title, date, file_url, created_by, created_at FROM bulletins ORDER BY date DESC, created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(bulletin_from_row).collect())
    }

    pub async fn get_bulletin(&self, id: &str) -> Result<Option<Bulletin>, AppError> {
        let row = sqlx::query(
            "SELECT id, title, date, file_url, created_by, created_at FROM bulletins WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(bulletin_from_row))
    }

    pub async fn create_bulletin(
        &self,
        created_by: &str,
        request: &CreateBulletinRequest,
    ) -> Result<Bulletin, AppError> {
        let bulletin = Bulletin {
            id: new_id(),
            title: request.title.trim().to_string(),
            date: request.date,
            file_url: request.file_url.trim().to_string(),
            created_by: created_by.to_string(),
            created_at: now(),
        };

        let mut tx = self.begin().await?;
        sqlx::query(
            "INSERT INTO bulletins (id, title, date, file_url, created_by, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&bulletin.id)
        .bind(&bulletin.title)
        .bind(bulletin.date)
        .bind(&bulletin.file_url)
        .bind(&bulletin.created_by)
        .bind(&bulletin.created_at)
        .execute(&mut *tx)
        .await?;
        self.commit_one(tx, collections::BULLETINS, &bulletin.id, ChangeKind::Created)
            .await?;

        Ok(bulletin)
    }

    pub async fn delete_bulletin(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query("DELETE FROM bulletins WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Bulletin {} not found", id)));
        }

        self.commit_one(tx, collections::BULLETINS, id, ChangeKind::Deleted)
            .await?;
        Ok(())
    }
}

fn bulletin_from_row(row: &sqlx::sqlite::SqliteRow) -> Bulletin {
    Bulletin {
        id: row.get("id"),
        title: row.get("title"),
        date: row.get("date"),
        file_url: row.get("file_url"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
    }
}
