//! Change feed endpoints and internal triggers.

use std::time::Duration;

use axum::extract::{Query, State};
use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;

use super::{current_revision, error, success, ApiResult, AtRevision};
use crate::auth::Session;
use crate::models::{ChangesQuery, ChangesResponse, RevisionInfo};
use crate::notify::DeliveryReport;
use crate::AppState;

const DEFAULT_WAIT_SECS: u64 = 25;
const MAX_WAIT_SECS: u64 = 30;

/// GET /api/changes?since=&timeoutSecs= - Long-poll for collections that
/// changed after `since`.
pub async fn poll_changes(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ChangesQuery>,
) -> ApiResult<ChangesResponse> {
    // Subscribe before reading the revision so no commit falls in between.
    let mut events = state.repo.feed().subscribe();
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    if revision_id <= query.since {
        let wait = query
            .timeout_secs
            .unwrap_or(DEFAULT_WAIT_SECS)
            .min(MAX_WAIT_SECS);
        let since = query.since;
        let next_change = async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.revision_id > since => return,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(_)) | Err(RecvError::Closed) => return,
                }
            }
        };
        // Timing out just means nothing changed.
        let _ = tokio::time::timeout(Duration::from_secs(wait), next_change).await;
    }

    let revision_id = current_revision(&state).await;
    match state.repo.collections_changed_since(query.since).await {
        Ok(collections) => success(
            ChangesResponse {
                revision_id,
                collections,
            },
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/revisions - Global and per-collection revisions.
pub async fn get_revisions(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<RevisionInfo> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    match state.repo.get_revision_info().await {
        Ok(info) => success(info, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /internal/digest - Weekly announcement digest, triggered by a scheduler.
pub async fn send_weekly_digest(State(state): State<AppState>) -> ApiResult<DeliveryReport> {
    let revision_id = current_revision(&state).await;

    match state.notifier.send_weekly_digest(Utc::now()).await {
        Ok(report) => success(report, revision_id),
        Err(e) => {
            tracing::error!(error = %e, "Weekly digest failed");
            error(e, revision_id)
        }
    }
}
