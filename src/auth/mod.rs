//! Authentication module.
//!
//! User sessions use signed bearer tokens over argon2-checked passwords. The
//! internal trigger routes use a pre-shared key compared in constant time.

mod password;
mod permissions;
mod session;
mod tokens;

pub use password::{hash_password, verify_password, MIN_PASSWORD_LEN};
pub use permissions::Permission;
pub use session::Session;
pub use tokens::SessionKeys;

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::AppError;

/// Header name for the internal API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// PSK authentication layer for internal routes.
///
/// With no key configured the internal routes are closed rather than open.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    match check_api_key(request.headers(), expected_psk.as_deref()) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!(path = %request.uri().path(), error = %e, "Internal request refused");
            e.into_response()
        }
    }
}

fn check_api_key(headers: &HeaderMap, expected: Option<&str>) -> Result<(), AppError> {
    let expected =
        expected.ok_or_else(|| AppError::Unauthorized("Internal routes are disabled".to_string()))?;

    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| bearer_key(headers))
        .ok_or_else(|| AppError::Unauthorized("Missing API key".to_string()))?;

    if constant_time_compare(provided.trim(), expected) {
        Ok(())
    } else {
        Err(AppError::Unauthorized("Invalid API key".to_string()))
    }
}

/// Key sent as `Authorization: Bearer <key>` by schedulers that cannot set
/// custom headers.
fn bearer_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(key: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(key) = key {
            headers.insert(API_KEY_HEADER, HeaderValue::from_static(key));
        }
        headers
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("digest-key-123", "digest-key-123"));
        assert!(!constant_time_compare("digest-key-123", "digest-key-124"));
        assert!(!constant_time_compare("short", "much-longer-key"));
    }

    #[test]
    fn test_api_key_checked_against_configured_key() {
        assert!(check_api_key(&headers(Some("digest-key")), Some("digest-key")).is_ok());
        assert!(matches!(
            check_api_key(&headers(Some("guess")), Some("digest-key")),
            Err(AppError::Unauthorized(_))
        ));
        assert!(check_api_key(&headers(None), Some("digest-key")).is_err());
    }

    #[test]
    fn test_bearer_key_accepted_without_api_key_header() {
        let mut bearer = HeaderMap::new();
        bearer.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer digest-key"),
        );
        assert!(check_api_key(&bearer, Some("digest-key")).is_ok());

        bearer.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer guess"));
        assert!(check_api_key(&bearer, Some("digest-key")).is_err());

        // The dedicated header wins over the bearer token
        bearer.insert(API_KEY_HEADER, HeaderValue::from_static("digest-key"));
        assert!(check_api_key(&bearer, Some("digest-key")).is_ok());

        let mut basic = HeaderMap::new();
        basic.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic digest-key"));
        assert!(check_api_key(&basic, Some("digest-key")).is_err());
    }

    #[test]
    fn test_routes_closed_without_configured_key() {
        assert!(check_api_key(&headers(Some("anything")), None).is_err());
    }
}
