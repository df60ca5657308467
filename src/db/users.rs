//! User profile and credential persistence.

use sqlx::Row;

use super::repository::{check_version, concurrent_modification, flag, new_id, now, Repository};
use crate::errors::AppError;
use crate::models::{
    collections, ApprovalStatus, ChangeKind, EmailKind, EmailSubscriptions, Role,
    UpdateProfileRequest, UserProfile,
};

const USER_COLUMNS: &str = "id, email, display_name, role, is_admin, status, notifications_enabled, \
     email_announcements, email_prayer_requests, email_volunteer_opportunities, \
     email_service_reminders, photo_url, created_at, updated_at, version";

/// Stored secret material for a sign-in attempt.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: String,
    pub password_hash: String,
    pub session_epoch: i64,
    pub status: ApprovalStatus,
}

/// Fields for a new account.
pub struct NewUser<'a> {
    pub email: &'a str,
    pub display_name: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub is_admin: bool,
    pub status: ApprovalStatus,
}

impl Repository {
    /// List users, optionally filtered by approval status.
    pub async fn list_users(
        &self,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<UserProfile>, AppError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {} FROM users WHERE status = ? ORDER BY display_name",
                    USER_COLUMNS
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM users ORDER BY display_name",
                    USER_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(user_from_row).collect())
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<Option<UserProfile>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Profile and current session epoch, used when resolving a session token.
    pub async fn get_user_for_session(
        &self,
        id: &str,
    ) -> Result<Option<(UserProfile, i64)>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {}, session_epoch FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .as_ref()
            .map(|row| (user_from_row(row), row.get("session_epoch"))))
    }

    /// Look up credentials by email (case-insensitive).
    pub async fn find_credentials(&self, email: &str) -> Result<Option<Credentials>, AppError> {
        let row = sqlx::query(
            "SELECT id, password_hash, session_epoch, status FROM users WHERE email = ? COLLATE NOCASE",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let status: String = row.get("status");
            Credentials {
                user_id: row.get("id"),
                password_hash: row.get("password_hash"),
                session_epoch: row.get("session_epoch"),
                status: ApprovalStatus::parse(&status).unwrap_or(ApprovalStatus::Pending),
            }
        }))
    }

    /// Create a new account.
    pub async fn create_user(&self, user: NewUser<'_>) -> Result<UserProfile, AppError> {
        if self.find_credentials(user.email).await?.is_some() {
            return Err(AppError::Rejected("Email is already registered".to_string()));
        }

        let id = new_id();
        let now = now();
        let subscriptions = EmailSubscriptions::default();

        let mut tx = self.begin().await?;
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, display_name, role, is_admin, status, notifications_enabled, \
             email_announcements, email_prayer_requests, email_volunteer_opportunities, email_service_reminders, \
             photo_url, session_epoch, created_at, updated_at, version) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, NULL, 0, ?, ?, 1)",
        )
        .bind(&id)
        .bind(user.email.trim())
        .bind(user.password_hash)
        .bind(user.display_name.trim())
        .bind(user.role.as_str())
        .bind(user.is_admin as i32)
        .bind(user.status.as_str())
        .bind(subscriptions.announcements as i32)
        .bind(subscriptions.prayer_requests as i32)
        .bind(subscriptions.volunteer_opportunities as i32)
        .bind(subscriptions.service_reminders as i32)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        self.commit_one(tx, collections::USERS, &id, ChangeKind::Created)
            .await?;

        Ok(UserProfile {
            id,
            email: user.email.trim().to_string(),
            display_name: user.display_name.trim().to_string(),
            role: user.role,
            is_admin: user.is_admin,
            status: user.status,
            notifications_enabled: false,
            email_subscriptions: subscriptions,
            photo_url: None,
            created_at: now.clone(),
            updated_at: now,
            version: 1,
        })
    }

    /// Update the caller's own settings with optimistic concurrency control.
    pub async fn update_profile(
        &self,
        id: &str,
        request: &UpdateProfileRequest,
    ) -> Result<UserProfile, AppError> {
        let existing = self.require_user(id).await?;
        check_version(request.expected_version, existing.version)?;

        let display_name = request
            .display_name
            .as_ref()
            .map(|n| n.trim().to_string())
            .unwrap_or_else(|| existing.display_name.clone());
        let notifications_enabled = request
            .notifications_enabled
            .unwrap_or(existing.notifications_enabled);
        let subscriptions = request
            .email_subscriptions
            .unwrap_or(existing.email_subscriptions);
        let photo_url = super::repository::patch_optional(&request.photo_url, &existing.photo_url);

        let now = now();
        let mut tx = self.begin().await?;
        let result = sqlx::query(
            "UPDATE users SET display_name = ?, notifications_enabled = ?, email_announcements = ?, \
             email_prayer_requests = ?, email_volunteer_opportunities = ?, email_service_reminders = ?, \
             photo_url = ?, updated_at = ?, version = version + 1 WHERE id = ? AND version = ?",
        )
        .bind(&display_name)
        .bind(notifications_enabled as i32)
        .bind(subscriptions.announcements as i32)
        .bind(subscriptions.prayer_requests as i32)
        .bind(subscriptions.volunteer_opportunities as i32)
        .bind(subscriptions.service_reminders as i32)
        .bind(&photo_url)
        .bind(&now)
        .bind(id)
        .bind(existing.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(concurrent_modification(existing.version));
        }
        self.commit_one(tx, collections::USERS, id, ChangeKind::Updated)
            .await?;

        Ok(UserProfile {
            display_name,
            notifications_enabled,
            email_subscriptions: subscriptions,
            photo_url,
            updated_at: now,
            version: existing.version + 1,
            ..existing
        })
    }

    /// Record an admin approval decision.
    pub async fn set_user_status(
        &self,
        id: &str,
        status: ApprovalStatus,
    ) -> Result<UserProfile, AppError> {
        let existing = self.require_user(id).await?;
        let now = now();

        let mut tx = self.begin().await?;
        sqlx::query("UPDATE users SET status = ?, updated_at = ?, version = version + 1 WHERE id = ?")
            .bind(status.as_str())
            .bind(&now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        self.commit_one(tx, collections::USERS, id, ChangeKind::Updated)
            .await?;

        Ok(UserProfile {
            status,
            updated_at: now,
            version: existing.version + 1,
            ..existing
        })
    }

    /// Change a user's role and admin flag.
    pub async fn set_user_role(
        &self,
        id: &str,
        role: Role,
        is_admin: bool,
    ) -> Result<UserProfile, AppError> {
        let existing = self.require_user(id).await?;
        let now = now();

        let mut tx = self.begin().await?;
        sqlx::query(
            "UPDATE users SET role = ?, is_admin = ?, updated_at = ?, version = version + 1 WHERE id = ?",
        )
        .bind(role.as_str())
        .bind(is_admin as i32)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        self.commit_one(tx, collections::USERS, id, ChangeKind::Updated)
            .await?;

        Ok(UserProfile {
            role,
            is_admin,
            updated_at: now,
            version: existing.version + 1,
            ..existing
        })
    }

    /// Invalidate every token issued to the user so far.
    pub async fn bump_session_epoch(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET session_epoch = session_epoch + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }
        Ok(())
    }

    /// Delete a user.
    pub async fn delete_user(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }

        sqlx::query("DELETE FROM push_subscriptions WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        self.commit_one(tx, collections::USERS, id, ChangeKind::Deleted)
            .await?;
        Ok(())
    }

    /// Approved users who opted into this kind of email.
    pub async fn email_recipients(&self, kind: EmailKind) -> Result<Vec<UserProfile>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE status = 'approved' AND {} = 1 ORDER BY email",
            USER_COLUMNS,
            kind.column()
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    pub(super) async fn require_user(&self, id: &str) -> Result<UserProfile, AppError> {
        self.get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }
}

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> UserProfile {
    let role: String = row.get("role");
    let status: String = row.get("status");
    UserProfile {
        id: row.get("id"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        role: Role::parse(&role).unwrap_or(Role::User),
        is_admin: flag(row, "is_admin"),
        status: ApprovalStatus::parse(&status).unwrap_or(ApprovalStatus::Pending),
        notifications_enabled: flag(row, "notifications_enabled"),
        email_subscriptions: EmailSubscriptions {
            announcements: flag(row, "email_announcements"),
            prayer_requests: flag(row, "email_prayer_requests"),
            volunteer_opportunities: flag(row, "email_volunteer_opportunities"),
            service_reminders: flag(row, "email_service_reminders"),
        },
        photo_url: row.get("photo_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}
