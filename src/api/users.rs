//! User administration endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{current_revision, error, saved, success, ApiResult, AtRevision};
use crate::auth::{Permission, Session};
use crate::errors::AppError;
use crate::models::{ApprovalRequest, ApprovalStatus, RoleRequest, UserListQuery, UserProfile};
use crate::ports::destroy_url;
use crate::AppState;

/// GET /api/users - List accounts, optionally by approval status.
pub async fn list_users(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Vec<UserProfile>> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageUsers).at(revision_id)?;

    match state.repo.list_users(query.status).await {
        Ok(users) => success(users, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/users/:id/approval - Approve or reject an account.
pub async fn set_user_approval(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(request): Json<ApprovalRequest>,
) -> ApiResult<UserProfile> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageUsers).at(revision_id)?;

    let profile = state
        .repo
        .set_user_status(&id, request.status)
        .await
        .at(revision_id)?;
    tracing::info!(
        user_id = %id,
        status = request.status.as_str(),
        decided_by = %session.user_id(),
        "Account approval decided"
    );

    if request.status == ApprovalStatus::Approved {
        state.notifier.account_approved(&profile).await;
    }

    saved(&state, profile, revision_id).await
}

/// PUT /api/users/:id/role - Change role and admin flag.
pub async fn set_user_role(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(request): Json<RoleRequest>,
) -> ApiResult<UserProfile> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageUsers).at(revision_id)?;

    let existing = match state.repo.get_user(&id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return error(
                AppError::NotFound(format!("User {} not found", id)),
                revision_id,
            )
        }
        Err(e) => return error(e, revision_id),
    };
    let is_admin = request.is_admin.unwrap_or(existing.is_admin);

    match state.repo.set_user_role(&id, request.role, is_admin).await {
        Ok(profile) => saved(&state, profile, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/users/:id - Remove an account and its stored photo.
pub async fn delete_user(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageUsers).at(revision_id)?;

    if id == session.user_id() {
        return error(
            AppError::Forbidden("You cannot delete your own account".to_string()),
            revision_id,
        );
    }

    let user = match state.repo.get_user(&id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return error(
                AppError::NotFound(format!("User {} not found", id)),
                revision_id,
            )
        }
        Err(e) => return error(e, revision_id),
    };

    if let Some(photo_url) = user.photo_url.as_deref().filter(|url| !url.is_empty()) {
        let store = state.media_store().at(revision_id)?;
        if let Err(e) = destroy_url(store.as_ref(), photo_url).await {
            tracing::warn!(user_id = %id, error = %e, "Photo removal failed; user kept");
            return error(e, revision_id);
        }
    }

    match state.repo.delete_user(&id).await {
        Ok(()) => {
            tracing::info!(user_id = %id, deleted_by = %session.user_id(), "User deleted");
            saved(&state, true, revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}
