//! Prayer and praise board endpoints.
//!
//! Moderators see the whole board. Everyone else gets approved active items
//! plus their own submissions, with other people's anonymous items redacted.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{current_revision, error, require_text, saved, success, ApiResult, AtRevision};
use crate::auth::{Permission, Session};
use crate::errors::AppError;
use crate::models::{
    ApprovalRequest, ApprovalStatus, ContentStatus, CreatePrayerRequest, EmailKind, PrayerItem,
    PrayerQuery, PrayerStatusRequest,
};
use crate::notify::templates;
use crate::AppState;

/// GET /api/prayer
pub async fn list_prayer_items(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<PrayerQuery>,
) -> ApiResult<Vec<PrayerItem>> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    if session.can(Permission::ModeratePrayer) {
        return match state.repo.list_prayer_items(query.approval).await {
            Ok(items) => success(items, revision_id),
            Err(e) => error(e, revision_id),
        };
    }

    match state.repo.list_visible_prayer_items(session.user_id()).await {
        Ok(items) => {
            let viewer = session.user_id();
            let items = items
                .into_iter()
                .map(|item| {
                    if item.author_id.as_deref() == Some(viewer) {
                        item
                    } else {
                        item.redacted()
                    }
                })
                .collect();
            success(items, revision_id)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/prayer - Moderator submissions are approved on creation.
pub async fn create_prayer_item(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreatePrayerRequest>,
) -> ApiResult<PrayerItem> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::SubmitPrayer).at(revision_id)?;

    require_text(&request.title, "Title").at(revision_id)?;
    require_text(&request.content, "Content").at(revision_id)?;

    let approval = if session.can(Permission::ModeratePrayer) {
        ApprovalStatus::Approved
    } else {
        ApprovalStatus::Pending
    };

    let item = state
        .repo
        .create_prayer_item(&session.profile, &request, approval)
        .await
        .at(revision_id)?;

    if item.approval == ApprovalStatus::Approved {
        announce(&state, &item);
    }

    saved(&state, item, revision_id).await
}

/// PUT /api/prayer/:id/approval
pub async fn set_prayer_approval(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(request): Json<ApprovalRequest>,
) -> ApiResult<PrayerItem> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ModeratePrayer).at(revision_id)?;

    let previous = state.repo.require_prayer_item(&id).await.at(revision_id)?;
    let item = state
        .repo
        .set_prayer_approval(&id, request.status)
        .await
        .at(revision_id)?;

    if previous.approval != ApprovalStatus::Approved && item.approval == ApprovalStatus::Approved {
        announce(&state, &item);
    }

    saved(&state, item, revision_id).await
}

/// PUT /api/prayer/:id/status - Archive or reactivate.
pub async fn set_prayer_status(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(request): Json<PrayerStatusRequest>,
) -> ApiResult<PrayerItem> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ModeratePrayer).at(revision_id)?;

    match state.repo.set_prayer_status(&id, request.status).await {
        Ok(item) => saved(&state, item, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/prayer/:id - Moderators, or the item's author.
pub async fn delete_prayer_item(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    if !session.can(Permission::ModeratePrayer) {
        let item = state.repo.require_prayer_item(&id).await.at(revision_id)?;
        if item.author_id.as_deref() != Some(session.user_id()) {
            return error(
                AppError::Forbidden("You can only delete your own prayer items".to_string()),
                revision_id,
            );
        }
    }

    match state.repo.delete_prayer_item(&id).await {
        Ok(()) => saved(&state, true, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// Email prayer subscribers about a newly approved active item.
fn announce(state: &AppState, item: &PrayerItem) {
    if item.status != ContentStatus::Active {
        return;
    }
    let message = templates::prayer(&item.clone().redacted());
    state
        .notifier
        .broadcast_in_background(EmailKind::PrayerRequests, message);
}
