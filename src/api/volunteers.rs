//! Volunteer opportunity endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::DateTime;

use super::{current_revision, error, require_text, saved, success, ApiResult, AtRevision};
use crate::auth::{Permission, Session};
use crate::errors::AppError;
use crate::models::{
    CreateOpportunityRequest, EmailKind, OpportunityQuery, OpportunityStatus,
    OpportunityStatusRequest, UpdateOpportunityRequest, VolunteerOpportunity,
};
use crate::notify::templates;
use crate::AppState;

fn validate_schedule(starts_at: &str, max_volunteers: Option<i64>) -> Result<(), AppError> {
    if DateTime::parse_from_rfc3339(starts_at.trim()).is_err() {
        return Err(AppError::Validation(
            "startsAt must be an RFC 3339 timestamp".to_string(),
        ));
    }
    if matches!(max_volunteers, Some(max) if max < 1) {
        return Err(AppError::Validation(
            "maxVolunteers must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn announce(state: &AppState, opportunity: &VolunteerOpportunity) {
    state.notifier.broadcast_in_background(
        EmailKind::VolunteerOpportunities,
        templates::opportunity(opportunity),
    );
}

/// GET /api/volunteer-opportunities - Non-managers only see open items.
pub async fn list_opportunities(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<OpportunityQuery>,
) -> ApiResult<Vec<VolunteerOpportunity>> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    let status = if session.can(Permission::ManageVolunteers) {
        query.status
    } else {
        Some(OpportunityStatus::Open)
    };

    match state.repo.list_opportunities(status).await {
        Ok(items) => success(items, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/volunteer-opportunities/:id
pub async fn get_opportunity(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<VolunteerOpportunity> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    let opportunity = state.repo.require_opportunity(&id).await.at(revision_id)?;
    let visible = session.can(Permission::ManageVolunteers)
        || opportunity.status == OpportunityStatus::Open
        || opportunity.created_by == session.user_id();
    if !visible {
        return error(
            AppError::NotFound(format!("Opportunity {} not found", id)),
            revision_id,
        );
    }

    success(opportunity, revision_id)
}

/// POST /api/volunteer-opportunities - Proposals from non-managers start pending.
pub async fn create_opportunity(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateOpportunityRequest>,
) -> ApiResult<VolunteerOpportunity> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    require_text(&request.title, "Title").at(revision_id)?;
    validate_schedule(&request.starts_at, request.max_volunteers).at(revision_id)?;

    let status = if session.can(Permission::ManageVolunteers) {
        OpportunityStatus::Open
    } else {
        OpportunityStatus::Pending
    };

    let opportunity = state
        .repo
        .create_opportunity(&session.profile, &request, status)
        .await
        .at(revision_id)?;

    if opportunity.status == OpportunityStatus::Open {
        announce(&state, &opportunity);
    }

    saved(&state, opportunity, revision_id).await
}

/// PUT /api/volunteer-opportunities/:id
pub async fn update_opportunity(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(request): Json<UpdateOpportunityRequest>,
) -> ApiResult<VolunteerOpportunity> {
    let revision_id = current_revision(&state).await;
    session
        .require(Permission::ManageVolunteers)
        .at(revision_id)?;

    if let Some(title) = &request.title {
        require_text(title, "Title").at(revision_id)?;
    }
    if let Some(starts_at) = &request.starts_at {
        validate_schedule(starts_at, request.max_volunteers).at(revision_id)?;
    } else if matches!(request.max_volunteers, Some(max) if max < 1) {
        return error(
            AppError::Validation("maxVolunteers must be at least 1".to_string()),
            revision_id,
        );
    }

    match state.repo.update_opportunity(&id, &request).await {
        Ok(opportunity) => saved(&state, opportunity, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/volunteer-opportunities/:id/status - Opening one emails subscribers.
pub async fn set_opportunity_status(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(request): Json<OpportunityStatusRequest>,
) -> ApiResult<VolunteerOpportunity> {
    let revision_id = current_revision(&state).await;
    session
        .require(Permission::ManageVolunteers)
        .at(revision_id)?;

    let previous = state.repo.require_opportunity(&id).await.at(revision_id)?;
    let opportunity = state
        .repo
        .set_opportunity_status(&id, request.status)
        .await
        .at(revision_id)?;

    if previous.status == OpportunityStatus::Pending && opportunity.status == OpportunityStatus::Open
    {
        announce(&state, &opportunity);
    }

    saved(&state, opportunity, revision_id).await
}

/// DELETE /api/volunteer-opportunities/:id
pub async fn delete_opportunity(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let revision_id = current_revision(&state).await;
    session
        .require(Permission::ManageVolunteers)
        .at(revision_id)?;

    match state.repo.delete_opportunity(&id).await {
        Ok(()) => saved(&state, true, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/volunteer-opportunities/:id/signup
pub async fn sign_up_volunteer(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<VolunteerOpportunity> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    match state.repo.sign_up_volunteer(&id, &session.profile).await {
        Ok(opportunity) => saved(&state, opportunity, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/volunteer-opportunities/:id/signup
pub async fn withdraw_volunteer(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<VolunteerOpportunity> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    match state.repo.withdraw_volunteer(&id, session.user_id()).await {
        Ok(opportunity) => saved(&state, opportunity, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_schedule() {
        assert!(validate_schedule("2024-06-09T10:00:00Z", Some(3)).is_ok());
        assert!(validate_schedule("2024-06-09T10:00:00-05:00", None).is_ok());
        assert!(validate_schedule("next sunday", None).is_err());
        assert!(validate_schedule("2024-06-09T10:00:00Z", Some(0)).is_err());
    }
}
