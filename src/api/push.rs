//! Web push subscription endpoints.

use axum::{extract::State, Json};

use super::{current_revision, error, require_text, saved, success, ApiResult, AtRevision};
use crate::auth::{Permission, Session};
use crate::errors::AppError;
use crate::models::{PublicKeyResponse, PushSubscription, SubscribeRequest, UnsubscribeRequest};
use crate::AppState;

/// GET /api/push/public-key - VAPID key the browser subscribes with.
pub async fn push_public_key(State(state): State<AppState>) -> ApiResult<PublicKeyResponse> {
    let revision_id = current_revision(&state).await;
    let sender = state.push_sender().at(revision_id)?;

    success(
        PublicKeyResponse {
            public_key: sender.public_key().to_string(),
        },
        revision_id,
    )
}

/// POST /api/push/subscriptions
pub async fn subscribe_push(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<SubscribeRequest>,
) -> ApiResult<PushSubscription> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    require_text(&request.topic, "Topic").at(revision_id)?;
    require_text(&request.keys.p256dh, "keys.p256dh").at(revision_id)?;
    require_text(&request.keys.auth, "keys.auth").at(revision_id)?;
    if !request.endpoint.trim().starts_with("https://") {
        return error(
            AppError::Validation("Push endpoint must be an https URL".to_string()),
            revision_id,
        );
    }

    match state
        .repo
        .upsert_push_subscription(session.user_id(), &request)
        .await
    {
        Ok(subscription) => saved(&state, subscription, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/push/subscriptions - Returns whether anything was removed.
/// Members only remove their own endpoints; user managers may remove any.
pub async fn unsubscribe_push(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<UnsubscribeRequest>,
) -> ApiResult<bool> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    let owner = (!session.can(Permission::ManageUsers)).then(|| session.user_id());
    match state
        .repo
        .remove_push_subscription(&request.topic, &request.endpoint, owner)
        .await
    {
        Ok(removed) => saved(&state, removed, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}
