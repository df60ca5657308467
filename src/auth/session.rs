//! Per-request session resolved from the bearer token.
//!
//! Handlers take a [`Session`] argument and check permissions on it before
//! touching the repository, so restricted data is never loaded for a caller
//! who may not see it.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use super::permissions::{permissions_for, Permission};
use crate::errors::{AppError, AppErrorWithRevision};
use crate::models::{ApprovalStatus, UserProfile};
use crate::AppState;

/// The signed-in user and what they may do.
#[derive(Debug, Clone)]
pub struct Session {
    pub profile: UserProfile,
}

impl Session {
    pub fn new(profile: UserProfile) -> Self {
        Self { profile }
    }

    pub fn user_id(&self) -> &str {
        &self.profile.id
    }

    pub fn display_name(&self) -> &str {
        &self.profile.display_name
    }

    pub fn is_approved(&self) -> bool {
        self.profile.status == ApprovalStatus::Approved
    }

    /// Only approved accounts hold permissions.
    pub fn can(&self, permission: Permission) -> bool {
        self.is_approved()
            && permissions_for(self.profile.role, self.profile.is_admin).contains(&permission)
    }

    pub fn require_approved(&self) -> Result<(), AppError> {
        match self.profile.status {
            ApprovalStatus::Approved => Ok(()),
            ApprovalStatus::Pending => Err(AppError::Forbidden(
                "Your account is pending approval".to_string(),
            )),
            ApprovalStatus::Rejected => Err(AppError::Forbidden(
                "Your account has been rejected".to_string(),
            )),
        }
    }

    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        self.require_approved()?;
        if self.can(permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "You do not have permission to {}",
                permission.describe()
            )))
        }
    }

    /// Passes when any one of the permissions is held.
    pub fn require_any(&self, permissions: &[Permission]) -> Result<(), AppError> {
        self.require_approved()?;
        match permissions.iter().find(|p| self.can(**p)) {
            Some(_) => Ok(()),
            None => Err(AppError::Forbidden(format!(
                "You do not have permission to {}",
                permissions
                    .first()
                    .map(|p| p.describe())
                    .unwrap_or("do this")
            ))),
        }
    }
}

impl FromRequestParts<AppState> for Session {
    type Rejection = AppErrorWithRevision;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Sign-in required".to_string()))?;

        let verified = state.sessions.verify(token)?;

        let (profile, epoch) = state
            .repo
            .get_user_for_session(&verified.user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Session is no longer valid".to_string()))?;

        if epoch != verified.epoch {
            return Err(AppError::Unauthorized("Session has been signed out".to_string()).into());
        }

        Ok(Session::new(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmailSubscriptions, Role};

    fn profile(role: Role, is_admin: bool, status: ApprovalStatus) -> UserProfile {
        UserProfile {
            id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            display_name: "U One".to_string(),
            role,
            is_admin,
            status,
            notifications_enabled: false,
            email_subscriptions: EmailSubscriptions::default(),
            photo_url: None,
            created_at: String::new(),
            updated_at: String::new(),
            version: 1,
        }
    }

    #[test]
    fn test_pending_admin_has_no_permissions() {
        let session = Session::new(profile(Role::Admin, true, ApprovalStatus::Pending));
        assert!(!session.can(Permission::ManageUsers));
        assert!(matches!(
            session.require(Permission::SubmitPrayer),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_require_any() {
        let session = Session::new(profile(Role::LifeGroupLeader, false, ApprovalStatus::Approved));
        assert!(session
            .require_any(&[Permission::ManageLifeGroups, Permission::LeadLifeGroup])
            .is_ok());
        assert!(session
            .require_any(&[Permission::ManageBulletins, Permission::ManageDirectory])
            .is_err());
    }
}
