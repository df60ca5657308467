use std::collections::HashMap;

use sqlx::Row;

use super::repository::{
    blank_to_none, check_version, concurrent_modification, new_id, now, patch_optional, Repository,
};
use crate::errors::AppError;
use crate::models::{
    collections, ChangeKind, CreateOpportunityRequest, OpportunityStatus, UpdateOpportunityRequest,
    UserProfile, VolunteerOpportunity, VolunteerSignup,
};

const OPPORTUNITY_COLUMNS: &str = "id, title, description, starts_at, location, max_volunteers, status, \
     created_by, created_at, updated_at, version";

impl Repository {
    /// List opportunities, optionally filtered by status, soonest first.
    pub async fn list_opportunities(
        &self,
        status: Option<OpportunityStatus>,
    ) -> Result<Vec<VolunteerOpportunity>, AppError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {} FROM volunteer_opportunities WHERE status = ? ORDER BY starts_at",
                    OPPORTUNITY_COLUMNS
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM volunteer_opportunities ORDER BY starts_at",
                    OPPORTUNITY_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        let signups = sqlx::query(
            "SELECT opportunity_id, user_id, name, signed_up_at FROM volunteer_signups ORDER BY signed_up_at",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut by_opportunity: HashMap<String, Vec<VolunteerSignup>> = HashMap::new();
        for row in &signups {
            by_opportunity
                .entry(row.get("opportunity_id"))
                .or_default()
                .push(signup_from_row(row));
        }

        Ok(rows
            .iter()
            .map(|row| {
                let mut opportunity = opportunity_from_row(row);
                opportunity.volunteers = by_opportunity.remove(&opportunity.id).unwrap_or_default();
                opportunity
            })
            .collect())
    }

    pub async fn get_opportunity(&self, id: &str) -> Result<Option<VolunteerOpportunity>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM volunteer_opportunities WHERE id = ?",
            OPPORTUNITY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let signups = sqlx::query(
            "SELECT user_id, name, signed_up_at FROM volunteer_signups WHERE opportunity_id = ? ORDER BY signed_up_at",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut opportunity = opportunity_from_row(&row);
        opportunity.volunteers = signups.iter().map(signup_from_row).collect();
        Ok(Some(opportunity))
    }

    pub async fn require_opportunity(&self, id: &str) -> Result<VolunteerOpportunity, AppError> {
        self.get_opportunity(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Opportunity {} not found", id)))
    }

    pub async fn create_opportunity(
        &self,
        creator: &UserProfile,
        request: &CreateOpportunityRequest,
        status: OpportunityStatus,
    ) -> Result<VolunteerOpportunity, AppError> {
        let now = now();
        let opportunity = VolunteerOpportunity {
            id: new_id(),
            title: request.title.trim().to_string(),
            description: request.description.clone(),
            starts_at: request.starts_at.trim().to_string(),
            location: blank_to_none(request.location.clone()),
            max_volunteers: request.max_volunteers,
            status,
            created_by: creator.id.clone(),
            volunteers: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
            version: 1,
        };

        let mut tx = self.begin().await?;
        sqlx::query(
            "INSERT INTO volunteer_opportunities (id, title, description, starts_at, location, max_volunteers, \
             status, created_by, created_at, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&opportunity.id)
        .bind(&opportunity.title)
        .bind(&opportunity.description)
        .bind(&opportunity.starts_at)
        .bind(&opportunity.location)
        .bind(opportunity.max_volunteers)
        .bind(opportunity.status.as_str())
        .bind(&opportunity.created_by)
        .bind(&opportunity.created_at)
        .bind(&opportunity.updated_at)
        .execute(&mut *tx)
        .await?;
        self.commit_one(tx, collections::VOLUNTEERS, &opportunity.id, ChangeKind::Created)
            .await?;

        Ok(opportunity)
    }

    pub async fn update_opportunity(
        &self,
        id: &str,
        request: &UpdateOpportunityRequest,
    ) -> Result<VolunteerOpportunity, AppError> {
        let existing = self.require_opportunity(id).await?;
        check_version(request.expected_version, existing.version)?;

        let max_volunteers = request.max_volunteers.or(existing.max_volunteers);
        if let Some(max) = max_volunteers {
            if (max as usize) < existing.volunteers.len() {
                return Err(AppError::Validation(format!(
                    "Capacity {} is below the {} volunteers already signed up",
                    max,
                    existing.volunteers.len()
                )));
            }
        }

        let updated = VolunteerOpportunity {
            title: request
                .title
                .as_ref()
                .map(|t| t.trim().to_string())
                .unwrap_or_else(|| existing.title.clone()),
            description: request
                .description
                .clone()
                .unwrap_or_else(|| existing.description.clone()),
            starts_at: request
                .starts_at
                .as_ref()
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| existing.starts_at.clone()),
            location: patch_optional(&request.location, &existing.location),
            max_volunteers,
            updated_at: now(),
            version: existing.version + 1,
            ..existing.clone()
        };

        let mut tx = self.begin().await?;
        let result = sqlx::query(
            "UPDATE volunteer_opportunities SET title = ?, description = ?, starts_at = ?, location = ?, \
             max_volunteers = ?, updated_at = ?, version = version + 1 WHERE id = ? AND version = ?",
        )
        .bind(&updated.title)
        .bind(&updated.description)
        .bind(&updated.starts_at)
        .bind(&updated.location)
        .bind(updated.max_volunteers)
        .bind(&updated.updated_at)
        .bind(id)
        .bind(existing.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(concurrent_modification(existing.version));
        }
        self.commit_one(tx, collections::VOLUNTEERS, id, ChangeKind::Updated)
            .await?;

        Ok(updated)
    }

    pub async fn set_opportunity_status(
        &self,
        id: &str,
        status: OpportunityStatus,
    ) -> Result<VolunteerOpportunity, AppError> {
        let existing = self.require_opportunity(id).await?;
        let now = now();

        let mut tx = self.begin().await?;
        sqlx::query(
            "UPDATE volunteer_opportunities SET status = ?, updated_at = ?, version = version + 1 WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        self.commit_one(tx, collections::VOLUNTEERS, id, ChangeKind::Updated)
            .await?;

        Ok(VolunteerOpportunity {
            status,
            updated_at: now,
            version: existing.version + 1,
            ..existing
        })
    }

    pub async fn delete_opportunity(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query("DELETE FROM volunteer_opportunities WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Opportunity {} not found", id)));
        }

        self.commit_one(tx, collections::VOLUNTEERS, id, ChangeKind::Deleted)
            .await?;
        Ok(())
    }

    /// Sign the user up. Capacity is checked by the insert itself, so two
    /// concurrent sign-ups for the last slot cannot both succeed.
    pub async fn sign_up_volunteer(
        &self,
        id: &str,
        user: &UserProfile,
    ) -> Result<VolunteerOpportunity, AppError> {
        let existing = self.require_opportunity(id).await?;
        if existing.status != OpportunityStatus::Open {
            return Err(AppError::Rejected(
                "Opportunity is not open for sign-ups".to_string(),
            ));
        }
        if existing.volunteers.iter().any(|v| v.user_id == user.id) {
            return Err(AppError::Rejected("Already signed up".to_string()));
        }

        let mut tx = self.begin().await?;
        let result = sqlx::query(
            "INSERT OR IGNORE INTO volunteer_signups (opportunity_id, user_id, name, signed_up_at) \
             SELECT o.id, ?, ?, ? FROM volunteer_opportunities o \
             WHERE o.id = ? AND o.status = 'open' AND (o.max_volunteers IS NULL OR \
             (SELECT COUNT(*) FROM volunteer_signups s WHERE s.opportunity_id = o.id) < o.max_volunteers)",
        )
        .bind(&user.id)
        .bind(&user.display_name)
        .bind(now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Lost a race: either this user's other request got in first or
            // the last slot was taken.
            let already = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM volunteer_signups WHERE opportunity_id = ? AND user_id = ?",
            )
            .bind(id)
            .bind(&user.id)
            .fetch_one(&mut *tx)
            .await?;
            let reason = if already > 0 {
                "Already signed up"
            } else {
                "Opportunity is full"
            };
            return Err(AppError::Rejected(reason.to_string()));
        }

        sqlx::query("UPDATE volunteer_opportunities SET version = version + 1, updated_at = ? WHERE id = ?")
            .bind(now())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        self.commit_one(tx, collections::VOLUNTEERS, id, ChangeKind::Updated)
            .await?;

        self.require_opportunity(id).await
    }

    pub async fn withdraw_volunteer(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<VolunteerOpportunity, AppError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query("DELETE FROM volunteer_signups WHERE opportunity_id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Sign-up not found".to_string()));
        }

        sqlx::query("UPDATE volunteer_opportunities SET version = version + 1, updated_at = ? WHERE id = ?")
            .bind(now())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        self.commit_one(tx, collections::VOLUNTEERS, id, ChangeKind::Updated)
            .await?;

        self.require_opportunity(id).await
    }
}

fn opportunity_from_row(row: &sqlx::sqlite::SqliteRow) -> VolunteerOpportunity {
    let status: String = row.get("status");
    VolunteerOpportunity {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        starts_at: row.get("starts_at"),
        location: row.get("location"),
        max_volunteers: row.get("max_volunteers"),
        status: OpportunityStatus::parse(&status).unwrap_or(OpportunityStatus::Pending),
        created_by: row.get("created_by"),
        volunteers: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}

fn signup_from_row(row: &sqlx::sqlite::SqliteRow) -> VolunteerSignup {
    VolunteerSignup {
        user_id: row.get("user_id"),
        name: row.get("name"),
        signed_up_at: row.get("signed_up_at"),
    }
}
