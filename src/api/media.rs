//! Bulletin endpoints and signed upload parameters.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{current_revision, error, require_text, saved, success, ApiResult, AtRevision};
use crate::auth::{Permission, Session};
use crate::errors::AppError;
use crate::models::{Bulletin, CreateBulletinRequest, MediaSignatureQuery, SignedUpload};
use crate::ports::destroy_url;
use crate::AppState;

/// Upload folders and the permission that may write into each.
const UPLOAD_FOLDERS: &[(&str, Permission)] = &[
    ("bulletins", Permission::ManageBulletins),
    ("families", Permission::ManageLifeGroups),
    ("directory", Permission::ManageDirectory),
];

/// GET /api/bulletins - Newest first.
pub async fn list_bulletins(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Vec<Bulletin>> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    match state.repo.list_bulletins().await {
        Ok(bulletins) => success(bulletins, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/bulletins - Records an already uploaded file.
pub async fn create_bulletin(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateBulletinRequest>,
) -> ApiResult<Bulletin> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageBulletins).at(revision_id)?;

    require_text(&request.title, "Title").at(revision_id)?;
    require_text(&request.file_url, "File URL").at(revision_id)?;

    match state
        .repo
        .create_bulletin(session.user_id(), &request)
        .await
    {
        Ok(bulletin) => saved(&state, bulletin, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/bulletins/:id - The stored file goes first; if that fails the
/// record stays.
pub async fn delete_bulletin(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageBulletins).at(revision_id)?;

    let bulletin = match state.repo.get_bulletin(&id).await {
        Ok(Some(bulletin)) => bulletin,
        Ok(None) => {
            return error(
                AppError::NotFound(format!("Bulletin {} not found", id)),
                revision_id,
            )
        }
        Err(e) => return error(e, revision_id),
    };

    let store = state.media_store().at(revision_id)?;
    if let Err(e) = destroy_url(store.as_ref(), &bulletin.file_url).await {
        tracing::warn!(bulletin_id = %id, error = %e, "Bulletin file removal failed; record kept");
        return error(e, revision_id);
    }

    match state.repo.delete_bulletin(&id).await {
        Ok(()) => saved(&state, true, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/media/signature?folder= - Parameters for a direct browser upload.
pub async fn media_signature(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<MediaSignatureQuery>,
) -> ApiResult<SignedUpload> {
    let revision_id = current_revision(&state).await;
    session
        .require_any(&[
            Permission::ManageBulletins,
            Permission::ManageLifeGroups,
            Permission::ManageDirectory,
        ])
        .at(revision_id)?;

    let folder = query.folder.trim();
    let Some((_, permission)) = UPLOAD_FOLDERS.iter().find(|(name, _)| *name == folder) else {
        return error(
            AppError::Validation(format!("Unknown upload folder '{}'", folder)),
            revision_id,
        );
    };
    session.require(*permission).at(revision_id)?;

    let store = state.media_store().at(revision_id)?;
    success(store.sign_upload(folder), revision_id)
}
