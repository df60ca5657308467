//! Church directory endpoints: listing requests and the approved directory.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{current_revision, error, require_text, saved, success, ApiResult, AtRevision};
use crate::auth::{Permission, Session};
use crate::errors::AppError;
use crate::models::{
    CreateSubmissionRequest, DirectoryMember, DirectoryQuery, DirectorySubmission, SubmissionQuery,
};
use crate::ports::destroy_url;
use crate::AppState;

/// POST /api/directory/submissions - Ask to be listed.
pub async fn create_submission(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateSubmissionRequest>,
) -> ApiResult<DirectorySubmission> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    require_text(&request.first_name, "First name").at(revision_id)?;
    require_text(&request.last_name, "Last name").at(revision_id)?;

    match state
        .repo
        .create_submission(session.user_id(), &request)
        .await
    {
        Ok(submission) => saved(&state, submission, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/directory/submissions
pub async fn list_submissions(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SubmissionQuery>,
) -> ApiResult<Vec<DirectorySubmission>> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageDirectory).at(revision_id)?;

    match state.repo.list_submissions(query.status).await {
        Ok(submissions) => success(submissions, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/directory/submissions/:id/approve - Returns the new listing.
pub async fn approve_submission(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<DirectoryMember> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageDirectory).at(revision_id)?;

    match state.repo.approve_submission(&id, session.user_id()).await {
        Ok(member) => {
            tracing::info!(submission_id = %id, member_id = %member.id, "Directory submission approved");
            saved(&state, member, revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/directory/submissions/:id/reject
pub async fn reject_submission(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<DirectorySubmission> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageDirectory).at(revision_id)?;

    match state.repo.reject_submission(&id, session.user_id()).await {
        Ok(submission) => saved(&state, submission, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/directory?q= - Sorted by last name, then first name.
pub async fn list_directory(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<DirectoryQuery>,
) -> ApiResult<Vec<DirectoryMember>> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ViewDirectory).at(revision_id)?;

    let search = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    match state.repo.list_directory(search).await {
        Ok(members) => success(members, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/directory/:id - The photo goes first.
pub async fn delete_directory_member(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageDirectory).at(revision_id)?;

    let member = match state.repo.get_directory_member(&id).await {
        Ok(Some(member)) => member,
        Ok(None) => {
            return error(
                AppError::NotFound(format!("Directory member {} not found", id)),
                revision_id,
            )
        }
        Err(e) => return error(e, revision_id),
    };

    if !member.photo_url.is_empty() {
        let store = state.media_store().at(revision_id)?;
        if let Err(e) = destroy_url(store.as_ref(), &member.photo_url).await {
            tracing::warn!(member_id = %id, error = %e, "Directory photo removal failed; listing kept");
            return error(e, revision_id);
        }
    }

    match state.repo.delete_directory_member(&id).await {
        Ok(()) => saved(&state, true, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}
