//! Sermon archive endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{current_revision, error, require_text, saved, success, ApiResult, AtRevision};
use crate::auth::{Permission, Session};
use crate::errors::AppError;
use crate::models::{video_id_from_url, CreateSermonRequest, Sermon, SyncReport};
use crate::AppState;

/// GET /api/sermons - Newest first.
pub async fn list_sermons(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Vec<Sermon>> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    match state.repo.list_sermons().await {
        Ok(sermons) => success(sermons, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/sermons
pub async fn create_sermon(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateSermonRequest>,
) -> ApiResult<Sermon> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageSermons).at(revision_id)?;
    require_text(&request.title, "Title").at(revision_id)?;

    if let Some(url) = request.video_url.as_deref().filter(|u| !u.trim().is_empty()) {
        if video_id_from_url(url).is_none() {
            return error(
                AppError::Validation(format!("'{}' is not a YouTube video URL", url)),
                revision_id,
            );
        }
    }

    match state.repo.create_sermon(&request).await {
        Ok(sermon) => saved(&state, sermon, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/sermons/:id
pub async fn delete_sermon(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageSermons).at(revision_id)?;

    match state.repo.delete_sermon(&id).await {
        Ok(()) => saved(&state, true, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/sermons/sync - Pull the church's playlist into the archive.
pub async fn sync_sermons(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<SyncReport> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageSermons).at(revision_id)?;

    let source = state.video_source().at(revision_id)?;
    let videos = match source.list_videos().await {
        Ok(videos) => videos,
        Err(e) => {
            tracing::warn!(error = %e, "Playlist fetch failed");
            return error(e, revision_id);
        }
    };

    match state.repo.sync_sermons(&videos).await {
        Ok(report) => {
            tracing::info!(
                fetched = videos.len(),
                added = report.added,
                updated = report.updated,
                "Sermon sync finished"
            );
            saved(&state, report, revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}
