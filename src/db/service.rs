//! Weekly service-role scheduling.
//!
//! A week is saved as a whole: the edit map is diffed against the stored pairs
//! inside one transaction guarded by the week's version.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use sqlx::Row;

use super::repository::{check_version, concurrent_modification, new_id, now, Repository, Tx};
use crate::errors::AppError;
use crate::models::{
    collections, AssignmentStatus, ChangeKind, CreateServiceRoleRequest, SaveWeekRequest,
    ServiceAssignment, ServiceRole, ServiceWeek, WeekPlan,
};

const ASSIGNMENT_SELECT: &str = "SELECT a.id, a.week_start, a.role, a.user_id, u.display_name AS user_name, \
     a.status, a.assigned_at, a.responded_at, a.updated_at \
     FROM service_assignments a JOIN users u ON u.id = a.user_id";

/// Result of saving a week: the stored week and the pairs that were newly created.
#[derive(Debug, Clone)]
pub struct SavedWeek {
    pub week: ServiceWeek,
    pub added: Vec<ServiceAssignment>,
}

impl Repository {
    pub async fn list_service_roles(&self) -> Result<Vec<ServiceRole>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, sort_order, created_at FROM service_roles ORDER BY sort_order, name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ServiceRole {
                id: row.get("id"),
                name: row.get("name"),
                sort_order: row.get("sort_order"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    pub async fn create_service_role(
        &self,
        request: &CreateServiceRoleRequest,
    ) -> Result<ServiceRole, AppError> {
        let name = request.name.trim().to_string();
        let exists = sqlx::query("SELECT id FROM service_roles WHERE name = ?")
            .bind(&name)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_some() {
            return Err(AppError::Rejected(format!("Role '{}' already exists", name)));
        }

        let role = ServiceRole {
            id: new_id(),
            name,
            sort_order: request.sort_order,
            created_at: now(),
        };

        let mut tx = self.begin().await?;
        sqlx::query("INSERT INTO service_roles (id, name, sort_order, created_at) VALUES (?, ?, ?, ?)")
            .bind(&role.id)
            .bind(&role.name)
            .bind(role.sort_order)
            .bind(&role.created_at)
            .execute(&mut *tx)
            .await?;
        self.commit_one(tx, collections::SERVICE_ROLES, &role.id, ChangeKind::Created)
            .await?;

        Ok(role)
    }

    pub async fn delete_service_role(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query("DELETE FROM service_roles WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Service role {} not found", id)));
        }

        self.commit_one(tx, collections::SERVICE_ROLES, id, ChangeKind::Deleted)
            .await?;
        Ok(())
    }

    /// The week starting on `week_start`. An unsaved week has version 0.
    pub async fn get_service_week(&self, week_start: NaiveDate) -> Result<ServiceWeek, AppError> {
        let version = sqlx::query_scalar::<_, i64>("SELECT version FROM service_weeks WHERE week_start = ?")
            .bind(week_start)
            .fetch_optional(&self.pool)
            .await?
            .unwrap_or(0);

        let rows = sqlx::query(&format!(
            "{} WHERE a.week_start = ? ORDER BY a.role, u.display_name",
            ASSIGNMENT_SELECT
        ))
        .bind(week_start)
        .fetch_all(&self.pool)
        .await?;

        Ok(ServiceWeek {
            week_start,
            version,
            assignments: rows.iter().map(assignment_from_row).collect(),
        })
    }

    /// Replace the week's assignments with the non-empty entries of the edit map.
    ///
    /// Unknown roles or users reject the whole save. Pairs already stored keep
    /// their id and status; new pairs await confirmation.
    pub async fn save_service_week(
        &self,
        week_start: NaiveDate,
        request: &SaveWeekRequest,
    ) -> Result<SavedWeek, AppError> {
        self.validate_week_request(request).await?;

        let now = now();
        let mut tx = self.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO service_weeks (week_start, version, updated_at) VALUES (?, 0, ?)")
            .bind(week_start)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        let current = sqlx::query_scalar::<_, i64>("SELECT version FROM service_weeks WHERE week_start = ?")
            .bind(week_start)
            .fetch_one(&mut *tx)
            .await?;
        check_version(request.expected_version, current)?;

        let bumped = sqlx::query(
            "UPDATE service_weeks SET version = version + 1, updated_at = ? WHERE week_start = ? AND version = ?",
        )
        .bind(&now)
        .bind(week_start)
        .bind(current)
        .execute(&mut *tx)
        .await?;
        if bumped.rows_affected() == 0 {
            return Err(concurrent_modification(current));
        }

        let existing = load_week_assignments(&mut tx, week_start).await?;
        let plan = WeekPlan::diff(&existing, &request.assignments);

        for id in &plan.remove {
            sqlx::query("DELETE FROM service_assignments WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let mut added_ids = Vec::with_capacity(plan.add.len());
        for (role, user_id) in &plan.add {
            let id = new_id();
            sqlx::query(
                "INSERT INTO service_assignments (id, week_start, role, user_id, status, assigned_at, responded_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, NULL, ?)",
            )
            .bind(&id)
            .bind(week_start)
            .bind(role)
            .bind(user_id)
            .bind(AssignmentStatus::AwaitingConfirmation.as_str())
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
            added_ids.push(id);
        }

        let assignments = load_week_assignments(&mut tx, week_start).await?;
        self.commit_one(
            tx,
            collections::SERVICE_ASSIGNMENTS,
            &week_start.to_string(),
            ChangeKind::Replaced,
        )
        .await?;

        let added = assignments
            .iter()
            .filter(|a| added_ids.contains(&a.id))
            .cloned()
            .collect();

        Ok(SavedWeek {
            week: ServiceWeek {
                week_start,
                version: current + 1,
                assignments,
            },
            added,
        })
    }

    async fn validate_week_request(&self, request: &SaveWeekRequest) -> Result<(), AppError> {
        let roles: BTreeSet<String> = sqlx::query_scalar::<_, String>("SELECT name FROM service_roles")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .collect();

        if let Some(unknown) = request.assignments.keys().find(|role| !roles.contains(*role)) {
            return Err(AppError::Validation(format!("Unknown service role '{}'", unknown)));
        }

        for user_id in request.assignments.values().flatten() {
            let user_id = user_id.trim();
            if user_id.is_empty() {
                continue;
            }
            let known = sqlx::query("SELECT id FROM users WHERE id = ? AND status = 'approved'")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
            if known.is_none() {
                return Err(AppError::Validation(format!("Unknown user '{}'", user_id)));
            }
        }

        Ok(())
    }

    /// The caller's assignments from `from` onward, soonest first.
    pub async fn list_assignments_for_user(
        &self,
        user_id: &str,
        from: NaiveDate,
    ) -> Result<Vec<ServiceAssignment>, AppError> {
        let rows = sqlx::query(&format!(
            "{} WHERE a.user_id = ? AND a.week_start >= ? ORDER BY a.week_start, a.role",
            ASSIGNMENT_SELECT
        ))
        .bind(user_id)
        .bind(from)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(assignment_from_row).collect())
    }

    /// Accept or decline an assignment. Only the assignee may respond.
    pub async fn respond_to_assignment(
        &self,
        id: &str,
        user_id: &str,
        accept: bool,
    ) -> Result<ServiceAssignment, AppError> {
        let row = sqlx::query(&format!("{} WHERE a.id = ?", ASSIGNMENT_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let existing = row
            .as_ref()
            .map(assignment_from_row)
            .ok_or_else(|| AppError::NotFound(format!("Assignment {} not found", id)))?;

        if existing.user_id != user_id {
            return Err(AppError::Forbidden(
                "Only the assignee can respond to this assignment".to_string(),
            ));
        }

        let status = if accept {
            AssignmentStatus::Accepted
        } else {
            AssignmentStatus::Declined
        };
        let now = now();

        let mut tx = self.begin().await?;
        sqlx::query("UPDATE service_assignments SET status = ?, responded_at = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(&now)
            .bind(&now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        self.commit_one(tx, collections::SERVICE_ASSIGNMENTS, id, ChangeKind::Updated)
            .await?;

        Ok(ServiceAssignment {
            status,
            responded_at: Some(now.clone()),
            updated_at: now,
            ..existing
        })
    }
}

async fn load_week_assignments(
    tx: &mut Tx,
    week_start: NaiveDate,
) -> Result<Vec<ServiceAssignment>, AppError> {
    let rows = sqlx::query(&format!(
        "{} WHERE a.week_start = ? ORDER BY a.role, u.display_name",
        ASSIGNMENT_SELECT
    ))
    .bind(week_start)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows.iter().map(assignment_from_row).collect())
}

fn assignment_from_row(row: &sqlx::sqlite::SqliteRow) -> ServiceAssignment {
    let status: String = row.get("status");
    ServiceAssignment {
        id: row.get("id"),
        week_start: row.get("week_start"),
        role: row.get("role"),
        user_id: row.get("user_id"),
        user_name: row.get("user_name"),
        status: AssignmentStatus::parse(&status).unwrap_or(AssignmentStatus::Pending),
        assigned_at: row.get("assigned_at"),
        responded_at: row.get("responded_at"),
        updated_at: row.get("updated_at"),
    }
}
