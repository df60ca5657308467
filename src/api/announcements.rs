//! Announcement and event category endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{current_revision, error, require_text, saved, success, ApiResult, AtRevision};
use crate::auth::{Permission, Session};
use crate::errors::AppError;
use crate::models::{
    Announcement, AnnouncementQuery, ContentStatus, CreateAnnouncementRequest,
    CreateEventCategoryRequest, EmailKind, EventCategory, UpdateAnnouncementRequest,
};
use crate::notify::templates;
use crate::AppState;

/// GET /api/announcements - Newest first, active unless a status is given.
pub async fn list_announcements(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<AnnouncementQuery>,
) -> ApiResult<Vec<Announcement>> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    let status = query.status.unwrap_or(ContentStatus::Active);
    match state.repo.list_announcements(status).await {
        Ok(items) => success(items, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/announcements/:id
pub async fn get_announcement(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<Announcement> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    match state.repo.get_announcement(&id).await {
        Ok(Some(item)) => success(item, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Announcement {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/announcements - Publish, optionally notifying subscribers.
pub async fn create_announcement(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateAnnouncementRequest>,
) -> ApiResult<Announcement> {
    let revision_id = current_revision(&state).await;
    session
        .require(Permission::ManageAnnouncements)
        .at(revision_id)?;

    require_text(&request.title, "Title").at(revision_id)?;
    require_text(&request.content, "Content").at(revision_id)?;

    let item = state
        .repo
        .create_announcement(&session.profile, &request)
        .await
        .at(revision_id)?;

    if request.notify {
        state
            .notifier
            .broadcast_in_background(EmailKind::Announcements, templates::announcement(&item));
    }

    saved(&state, item, revision_id).await
}

/// PUT /api/announcements/:id
pub async fn update_announcement(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(request): Json<UpdateAnnouncementRequest>,
) -> ApiResult<Announcement> {
    let revision_id = current_revision(&state).await;
    session
        .require(Permission::ManageAnnouncements)
        .at(revision_id)?;

    if let Some(title) = &request.title {
        require_text(title, "Title").at(revision_id)?;
    }

    match state.repo.update_announcement(&id, &request).await {
        Ok(item) => saved(&state, item, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/announcements/:id/archive
pub async fn archive_announcement(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<Announcement> {
    let revision_id = current_revision(&state).await;
    session
        .require(Permission::ManageAnnouncements)
        .at(revision_id)?;

    match state
        .repo
        .set_announcement_status(&id, ContentStatus::Archived)
        .await
    {
        Ok(item) => saved(&state, item, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/announcements/:id
pub async fn delete_announcement(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let revision_id = current_revision(&state).await;
    session
        .require(Permission::ManageAnnouncements)
        .at(revision_id)?;

    match state.repo.delete_announcement(&id).await {
        Ok(()) => saved(&state, true, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/event-categories
pub async fn list_event_categories(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Vec<EventCategory>> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    match state.repo.list_event_categories().await {
        Ok(categories) => success(categories, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/event-categories - Names are unique, ignoring case.
pub async fn create_event_category(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateEventCategoryRequest>,
) -> ApiResult<EventCategory> {
    let revision_id = current_revision(&state).await;
    session
        .require(Permission::ManageAnnouncements)
        .at(revision_id)?;
    require_text(&request.name, "Name").at(revision_id)?;

    match state.repo.create_event_category(&request).await {
        Ok(category) => saved(&state, category, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/event-categories/:id
pub async fn delete_event_category(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let revision_id = current_revision(&state).await;
    session
        .require(Permission::ManageAnnouncements)
        .at(revision_id)?;

    match state.repo.delete_event_category(&id).await {
        Ok(()) => saved(&state, true, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}
