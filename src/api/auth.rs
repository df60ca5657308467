//! Account endpoints: sign-up, sign-in, sign-out and the caller's own profile.

use axum::{extract::State, Json};

use super::{current_revision, error, require_text, saved, success, ApiResult, AtRevision};
use crate::auth::{hash_password, verify_password, Session, MIN_PASSWORD_LEN};
use crate::db::NewUser;
use crate::errors::AppError;
use crate::models::{
    ApprovalStatus, AuthResponse, Role, SignInRequest, SignUpRequest, UpdateProfileRequest,
    UserProfile,
};
use crate::AppState;

/// POST /api/auth/sign-up - Create an account awaiting approval.
pub async fn sign_up(
    State(state): State<AppState>,
    Json(request): Json<SignUpRequest>,
) -> ApiResult<AuthResponse> {
    let revision_id = current_revision(&state).await;

    let email = request.email.trim();
    if !is_plausible_email(email) {
        return error(
            AppError::Validation("A valid email is required".to_string()),
            revision_id,
        );
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return error(
            AppError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )),
            revision_id,
        );
    }
    require_text(&request.display_name, "Display name").at(revision_id)?;

    let bootstrap = state
        .config
        .bootstrap_admin_email
        .as_deref()
        .is_some_and(|admin| admin.trim().eq_ignore_ascii_case(email));

    let password_hash = hash_password(&request.password).at(revision_id)?;
    let new_user = NewUser {
        email,
        display_name: request.display_name.trim(),
        password_hash: &password_hash,
        role: if bootstrap { Role::Admin } else { Role::User },
        is_admin: bootstrap,
        status: if bootstrap {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Pending
        },
    };

    let profile = state.repo.create_user(new_user).await.at(revision_id)?;
    if bootstrap {
        tracing::info!(user_id = %profile.id, "Bootstrap admin account created");
    } else {
        tracing::info!(user_id = %profile.id, "Account created; awaiting approval");
    }

    let token = state.sessions.issue(&profile.id, 0).at(revision_id)?;
    saved(&state, AuthResponse { token, profile }, revision_id).await
}

/// POST /api/auth/sign-in - Exchange credentials for a session token.
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> ApiResult<AuthResponse> {
    let revision_id = current_revision(&state).await;
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let Some(credentials) = state
        .repo
        .find_credentials(&request.email)
        .await
        .at(revision_id)?
    else {
        return error(invalid(), revision_id);
    };

    if !verify_password(&request.password, &credentials.password_hash) {
        tracing::debug!(user_id = %credentials.user_id, "Sign-in with a wrong password");
        return error(invalid(), revision_id);
    }
    if credentials.status == ApprovalStatus::Rejected {
        return error(
            AppError::Forbidden("Your account has been rejected".to_string()),
            revision_id,
        );
    }

    let profile = match state.repo.get_user(&credentials.user_id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => return error(invalid(), revision_id),
        Err(e) => return error(e, revision_id),
    };
    let token = state
        .sessions
        .issue(&profile.id, credentials.session_epoch)
        .at(revision_id)?;

    success(AuthResponse { token, profile }, revision_id)
}

/// POST /api/auth/sign-out - Revoke every token issued to the caller.
pub async fn sign_out(State(state): State<AppState>, session: Session) -> ApiResult<bool> {
    let revision_id = current_revision(&state).await;

    match state.repo.bump_session_epoch(session.user_id()).await {
        Ok(()) => {
            tracing::info!(user_id = %session.user_id(), "Signed out");
            success(true, revision_id)
        }
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/me - The caller's profile. Works while approval is pending.
pub async fn get_me(State(state): State<AppState>, session: Session) -> ApiResult<UserProfile> {
    let revision_id = current_revision(&state).await;
    success(session.profile, revision_id)
}

/// PUT /api/me - Edit the caller's own settings.
pub async fn update_me(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<UpdateProfileRequest>,
) -> ApiResult<UserProfile> {
    let revision_id = current_revision(&state).await;

    if let Some(name) = &request.display_name {
        require_text(name, "Display name").at(revision_id)?;
    }

    match state.repo.update_profile(session.user_id(), &request).await {
        Ok(profile) => saved(&state, profile, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(' '),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plausible_email() {
        assert!(is_plausible_email("jane@example.org"));
        assert!(!is_plausible_email("jane.example.org"));
        assert!(!is_plausible_email("@example.org"));
        assert!(!is_plausible_email("jane@localhost"));
        assert!(!is_plausible_email("ja ne@example.org"));
    }
}
