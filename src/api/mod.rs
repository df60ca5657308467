//! REST API module.
//!
//! Every response uses the `{success, data | error, revisionId}` envelope. Handlers
//! check the caller's permissions before reading anything from the repository.

mod announcements;
mod auth;
mod changes;
mod directory;
mod life_groups;
mod media;
mod prayer;
mod push;
mod sermons;
mod service;
mod teaching;
mod users;
mod volunteers;

pub use announcements::*;
pub use auth::*;
pub use changes::*;
pub use directory::*;
pub use life_groups::*;
pub use media::*;
pub use prayer::*;
pub use push::*;
pub use sermons::*;
pub use service::*;
pub use teaching::*;
pub use users::*;
pub use volunteers::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::{AppError, AppErrorWithRevision};
use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError, revision_id: i64) -> ApiResult<T> {
    Err(AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// Success response for a write, stamped with the revision it produced.
pub async fn saved<T: Serialize>(state: &AppState, data: T, revision_id: i64) -> ApiResult<T> {
    let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
    success(data, new_revision)
}

/// Revision observed at the start of a request.
pub async fn current_revision(state: &AppState) -> i64 {
    state.repo.get_revision_id().await.unwrap_or(0)
}

/// Attach the request's revision to an error so `?` can be used in handlers.
pub trait AtRevision<T> {
    fn at(self, revision_id: i64) -> Result<T, AppErrorWithRevision>;
}

impl<T> AtRevision<T> for Result<T, AppError> {
    fn at(self, revision_id: i64) -> Result<T, AppErrorWithRevision> {
        self.map_err(|error| AppErrorWithRevision { error, revision_id })
    }
}

/// Reject blank required text fields.
pub(crate) fn require_text(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        Err(AppError::Validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}
