//! Service role scheduling endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{NaiveDate, Utc};

use super::{current_revision, error, require_text, saved, success, ApiResult, AtRevision};
use crate::auth::{Permission, Session};
use crate::errors::AppError;
use crate::models::{
    week_start_for, CreateServiceRoleRequest, RespondRequest, SaveWeekRequest, ServiceAssignment,
    ServiceRole, ServiceWeek,
};
use crate::AppState;

/// Any date in the week; the week is keyed by its Sunday.
fn parse_week(date: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(week_start_for)
        .map_err(|_| AppError::Validation(format!("Invalid date '{}', expected YYYY-MM-DD", date)))
}

/// GET /api/service-roles
pub async fn list_service_roles(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Vec<ServiceRole>> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    match state.repo.list_service_roles().await {
        Ok(roles) => success(roles, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/service-roles
pub async fn create_service_role(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateServiceRoleRequest>,
) -> ApiResult<ServiceRole> {
    let revision_id = current_revision(&state).await;
    session
        .require(Permission::ManageServiceRoles)
        .at(revision_id)?;
    require_text(&request.name, "Name").at(revision_id)?;

    match state.repo.create_service_role(&request).await {
        Ok(role) => saved(&state, role, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/service-roles/:id
pub async fn delete_service_role(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let revision_id = current_revision(&state).await;
    session
        .require(Permission::ManageServiceRoles)
        .at(revision_id)?;

    match state.repo.delete_service_role(&id).await {
        Ok(()) => saved(&state, true, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/service-weeks/:date
pub async fn get_service_week(
    State(state): State<AppState>,
    session: Session,
    Path(date): Path<String>,
) -> ApiResult<ServiceWeek> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;
    let week_start = parse_week(&date).at(revision_id)?;

    match state.repo.get_service_week(week_start).await {
        Ok(week) => success(week, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/service-weeks/:date - Replace the week's assignments.
pub async fn save_service_week(
    State(state): State<AppState>,
    session: Session,
    Path(date): Path<String>,
    Json(request): Json<SaveWeekRequest>,
) -> ApiResult<ServiceWeek> {
    let revision_id = current_revision(&state).await;
    session
        .require(Permission::ManageServiceRoles)
        .at(revision_id)?;
    let week_start = parse_week(&date).at(revision_id)?;

    let saved_week = state
        .repo
        .save_service_week(week_start, &request)
        .await
        .at(revision_id)?;
    tracing::info!(
        week_start = %week_start,
        added = saved_week.added.len(),
        saved_by = %session.user_id(),
        "Service week saved"
    );

    if !saved_week.added.is_empty() {
        let notifier = state.notifier.clone();
        let added = saved_week.added;
        tokio::spawn(async move {
            notifier.service_assignments(&added).await;
        });
    }

    saved(&state, saved_week.week, revision_id).await
}

/// GET /api/service-assignments/mine - From this week onward.
pub async fn my_service_assignments(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Vec<ServiceAssignment>> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    let from = week_start_for(Utc::now().date_naive());
    match state
        .repo
        .list_assignments_for_user(session.user_id(), from)
        .await
    {
        Ok(assignments) => success(assignments, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/service-assignments/:id/response
pub async fn respond_to_assignment(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(request): Json<RespondRequest>,
) -> ApiResult<ServiceAssignment> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    match state
        .repo
        .respond_to_assignment(&id, session.user_id(), request.accept)
        .await
    {
        Ok(assignment) => saved(&state, assignment, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_week_snaps_to_sunday() {
        let week = parse_week("2024-06-12").unwrap();
        assert_eq!(week, NaiveDate::from_ymd_opt(2024, 6, 9).unwrap());
        assert!(parse_week("June 12").is_err());
    }
}
