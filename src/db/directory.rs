//! Directory submissions and approved listings.

use sqlx::Row;

use super::repository::{blank_to_none, new_id, now, Repository, Touched};
use crate::errors::AppError;
use crate::models::{
    collections, ApprovalStatus, ChangeKind, CreateSubmissionRequest, DirectoryMember,
    DirectorySubmission,
};

const SUBMISSION_COLUMNS: &str = "id, first_name, last_name, email, phone, address, photo_url, status, \
     submitted_by, created_at, decided_at, decided_by";

const MEMBER_COLUMNS: &str =
    "id, first_name, last_name, email, phone, address, photo_url, submission_id, created_at";

impl Repository {
    pub async fn list_submissions(
        &self,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<DirectorySubmission>, AppError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {} FROM directory_submissions WHERE status = ? ORDER BY created_at DESC",
                    SUBMISSION_COLUMNS
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM directory_submissions ORDER BY created_at DESC",
                    SUBMISSION_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(submission_from_row).collect())
    }

    async fn require_submission(&self, id: &str) -> Result<DirectorySubmission, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM directory_submissions WHERE id = ?",
            SUBMISSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(submission_from_row)
            .ok_or_else(|| AppError::NotFound(format!("Submission {} not found", id)))
    }

    /// Queue a listing request. A missing photo is stored as an empty string.
    pub async fn create_submission(
        &self,
        submitted_by: &str,
        request: &CreateSubmissionRequest,
    ) -> Result<DirectorySubmission, AppError> {
        let submission = DirectorySubmission {
            id: new_id(),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email: blank_to_none(request.email.clone()),
            phone: blank_to_none(request.phone.clone()),
            address: blank_to_none(request.address.clone()),
            photo_url: blank_to_none(request.photo_url.clone()).unwrap_or_default(),
            status: ApprovalStatus::Pending,
            submitted_by: submitted_by.to_string(),
            created_at: now(),
            decided_at: None,
            decided_by: None,
        };

        let mut tx = self.begin().await?;
        sqlx::query(
            "INSERT INTO directory_submissions (id, first_name, last_name, email, phone, address, photo_url, \
             status, submitted_by, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)",
        )
        .bind(&submission.id)
        .bind(&submission.first_name)
        .bind(&submission.last_name)
        .bind(&submission.email)
        .bind(&submission.phone)
        .bind(&submission.address)
        .bind(&submission.photo_url)
        .bind(&submission.submitted_by)
        .bind(&submission.created_at)
        .execute(&mut *tx)
        .await?;
        self.commit_one(
            tx,
            collections::DIRECTORY_SUBMISSIONS,
            &submission.id,
            ChangeKind::Created,
        )
        .await?;

        Ok(submission)
    }

    /// Approve a pending submission: the listing is created and the submission
    /// marked approved in the same transaction.
    pub async fn approve_submission(
        &self,
        id: &str,
        decided_by: &str,
    ) -> Result<DirectoryMember, AppError> {
        let submission = self.require_submission(id).await?;
        if submission.status != ApprovalStatus::Pending {
            return Err(AppError::Rejected(format!(
                "Submission is already {}",
                submission.status.as_str()
            )));
        }

        let now = now();
        let member = DirectoryMember {
            id: new_id(),
            first_name: submission.first_name.clone(),
            last_name: submission.last_name.clone(),
            email: submission.email.clone(),
            phone: submission.phone.clone(),
            address: submission.address.clone(),
            photo_url: submission.photo_url.clone(),
            submission_id: Some(submission.id.clone()),
            created_at: now.clone(),
        };

        let mut tx = self.begin().await?;
        let decided = sqlx::query(
            "UPDATE directory_submissions SET status = 'approved', decided_at = ?, decided_by = ? \
             WHERE id = ? AND status = 'pending'",
        )
        .bind(&now)
        .bind(decided_by)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if decided.rows_affected() == 0 {
            return Err(AppError::Rejected("Submission was already decided".to_string()));
        }

        sqlx::query(
            "INSERT INTO directory_members (id, first_name, last_name, email, phone, address, photo_url, \
             submission_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&member.id)
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(&member.email)
        .bind(&member.phone)
        .bind(&member.address)
        .bind(&member.photo_url)
        .bind(&member.submission_id)
        .bind(&member.created_at)
        .execute(&mut *tx)
        .await?;

        self.commit(
            tx,
            vec![
                Touched::new(collections::DIRECTORY_SUBMISSIONS, id, ChangeKind::Updated),
                Touched::new(collections::DIRECTORY, member.id.clone(), ChangeKind::Created),
            ],
        )
        .await?;

        Ok(member)
    }

    pub async fn reject_submission(
        &self,
        id: &str,
        decided_by: &str,
    ) -> Result<DirectorySubmission, AppError> {
        let submission = self.require_submission(id).await?;
        if submission.status != ApprovalStatus::Pending {
            return Err(AppError::Rejected(format!(
                "Submission is already {}",
                submission.status.as_str()
            )));
        }

        let now = now();
        let mut tx = self.begin().await?;
        let decided = sqlx::query(
            "UPDATE directory_submissions SET status = 'rejected', decided_at = ?, decided_by = ? \
             WHERE id = ? AND status = 'pending'",
        )
        .bind(&now)
        .bind(decided_by)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if decided.rows_affected() == 0 {
            return Err(AppError::Rejected("Submission was already decided".to_string()));
        }
        self.commit_one(tx, collections::DIRECTORY_SUBMISSIONS, id, ChangeKind::Updated)
            .await?;

        Ok(DirectorySubmission {
            status: ApprovalStatus::Rejected,
            decided_at: Some(now),
            decided_by: Some(decided_by.to_string()),
            ..submission
        })
    }

    /// Approved listings sorted by last then first name, optionally filtered
    /// by a case-insensitive substring of name or email.
    pub async fn list_directory(&self, query: Option<&str>) -> Result<Vec<DirectoryMember>, AppError> {
        let needle = query.map(str::trim).filter(|q| !q.is_empty());

        let rows = match needle {
            Some(needle) => {
                let pattern = format!("%{}%", needle.replace('%', "\\%").replace('_', "\\_"));
                sqlx::query(&format!(
                    "SELECT {} FROM directory_members \
                     WHERE first_name LIKE ?1 ESCAPE '\\' OR last_name LIKE ?1 ESCAPE '\\' \
                     OR (first_name || ' ' || last_name) LIKE ?1 ESCAPE '\\' OR email LIKE ?1 ESCAPE '\\' \
                     ORDER BY last_name COLLATE NOCASE, first_name COLLATE NOCASE",
                    MEMBER_COLUMNS
                ))
                .bind(pattern)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM directory_members \
                     ORDER BY last_name COLLATE NOCASE, first_name COLLATE NOCASE",
                    MEMBER_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(member_from_row).collect())
    }

    pub async fn get_directory_member(&self, id: &str) -> Result<Option<DirectoryMember>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM directory_members WHERE id = ?",
            MEMBER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(member_from_row))
    }

    pub async fn delete_directory_member(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query("DELETE FROM directory_members WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Directory entry {} not found", id)));
        }

        self.commit_one(tx, collections::DIRECTORY, id, ChangeKind::Deleted)
            .await?;
        Ok(())
    }
}

fn submission_from_row(row: &sqlx::sqlite::SqliteRow) -> DirectorySubmission {
    let status: String = row.get("status");
    DirectorySubmission {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        phone: row.get("phone"),
        address: row.get("address"),
        photo_url: row.get("photo_url"),
        status: ApprovalStatus::parse(&status).unwrap_or(ApprovalStatus::Pending),
        submitted_by: row.get("submitted_by"),
        created_at: row.get("created_at"),
        decided_at: row.get("decided_at"),
        decided_by: row.get("decided_by"),
    }
}

fn member_from_row(row: &sqlx::sqlite::SqliteRow) -> DirectoryMember {
    DirectoryMember {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        phone: row.get("phone"),
        address: row.get("address"),
        photo_url: row.get("photo_url"),
        submission_id: row.get("submission_id"),
        created_at: row.get("created_at"),
    }
}
