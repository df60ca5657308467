//! Signed session tokens.

use std::collections::HashSet;

use jwt_simple::algorithms::MACLike;
use jwt_simple::prelude::{Claims, Duration as JwtDuration, HS256Key, VerificationOptions};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Custom claim carried next to the subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionClaims {
    /// Sign-out bumps the stored epoch, invalidating older tokens
    epoch: i64,
}

/// Verified contents of a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub user_id: String,
    pub epoch: i64,
}

/// Issues and verifies HS256 session tokens.
pub struct SessionKeys {
    key: HS256Key,
    issuer: String,
    ttl_hours: u64,
}

impl SessionKeys {
    pub fn new(secret: Option<&str>, issuer: &str, ttl_hours: u64) -> Self {
        let key = match secret {
            Some(secret) => HS256Key::from_bytes(secret.as_bytes()),
            None => {
                tracing::warn!(
                    "No auth secret configured (CHURCH_AUTH_SECRET); sessions will not survive a restart"
                );
                HS256Key::generate()
            }
        };

        Self {
            key,
            issuer: issuer.to_string(),
            ttl_hours: ttl_hours.max(1),
        }
    }

    pub fn issue(&self, user_id: &str, epoch: i64) -> Result<String, AppError> {
        let claims = Claims::with_custom_claims(
            SessionClaims { epoch },
            JwtDuration::from_hours(self.ttl_hours),
        )
        .with_subject(user_id)
        .with_issuer(&self.issuer);

        self.key
            .authenticate(claims)
            .map_err(|e| AppError::Internal(format!("Failed to issue session token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedToken, AppError> {
        let mut issuers = HashSet::new();
        issuers.insert(self.issuer.clone());
        let options = VerificationOptions {
            allowed_issuers: Some(issuers),
            ..Default::default()
        };

        let claims = self
            .key
            .verify_token::<SessionClaims>(token, Some(options))
            .map_err(|_| AppError::Unauthorized("Invalid or expired session".to_string()))?;

        if claims.expires_at.is_none() {
            return Err(AppError::Unauthorized("Session token has no expiry".to_string()));
        }

        let user_id = claims
            .subject
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::Unauthorized("Session token has no subject".to_string()))?;

        Ok(VerifiedToken {
            user_id,
            epoch: claims.custom.epoch,
        })
    }
}
