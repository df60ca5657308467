//! Configuration module for the church hub backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.
//! External integrations are optional: a missing group leaves that feature disabled.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::AppError;

/// Cloudinary credentials for the media store.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// SMTP relay settings for outbound email.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// VAPID key material for web push.
#[derive(Debug, Clone)]
pub struct VapidConfig {
    pub private_key: String,
    pub public_key: String,
    pub subject: String,
}

/// YouTube playlist used as the sermon video list.
#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    pub api_key: String,
    pub playlist_id: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Secret for signing session tokens; generated per process when unset
    pub auth_secret: Option<String>,
    /// Session token lifetime in hours
    pub token_ttl_hours: u64,
    /// Email that becomes an approved admin on sign-up
    pub bootstrap_admin_email: Option<String>,
    /// Pre-shared key guarding the internal trigger routes
    pub internal_psk: Option<String>,
    pub cloudinary: Option<CloudinaryConfig>,
    pub smtp: Option<SmtpConfig>,
    pub vapid: Option<VapidConfig>,
    pub youtube: Option<YouTubeConfig>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let db_path = env::var("CHURCH_DB_PATH")
            .unwrap_or_else(|_| "./data/church.sqlite".to_string())
            .into();

        let bind_addr = env::var("CHURCH_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| AppError::Configuration(format!("Invalid CHURCH_BIND_ADDR: {}", e)))?;

        let log_level = env::var("CHURCH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let token_ttl_hours = match env::var("CHURCH_TOKEN_TTL_HOURS") {
            Ok(raw) => raw.parse().map_err(|e| {
                AppError::Configuration(format!("Invalid CHURCH_TOKEN_TTL_HOURS: {}", e))
            })?,
            Err(_) => 168,
        };

        let smtp_port = match env::var("SMTP_PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| AppError::Configuration(format!("Invalid SMTP_PORT: {}", e)))?,
            Err(_) => 465,
        };

        let cloudinary = group("Cloudinary", [
            "CLOUDINARY_CLOUD_NAME",
            "CLOUDINARY_API_KEY",
            "CLOUDINARY_API_SECRET",
        ])
        .map(|[cloud_name, api_key, api_secret]| CloudinaryConfig {
            cloud_name,
            api_key,
            api_secret,
        });

        let smtp = group("SMTP", ["SMTP_HOST", "SMTP_USERNAME", "SMTP_PASSWORD", "EMAIL_FROM"])
            .map(|[host, username, password, from]| SmtpConfig {
                host,
                port: smtp_port,
                username,
                password,
                from,
            });

        let vapid = group("VAPID", [
            "VAPID_PRIVATE_KEY",
            "VAPID_PUBLIC_KEY",
            "VAPID_SUBJECT",
        ])
        .map(|[private_key, public_key, subject]| VapidConfig {
            private_key,
            public_key,
            subject,
        });

        let youtube = group("YouTube", ["YOUTUBE_API_KEY", "YOUTUBE_PLAYLIST_ID"])
            .map(|[api_key, playlist_id]| YouTubeConfig {
                api_key,
                playlist_id,
            });

        Ok(Self {
            db_path,
            bind_addr,
            log_level,
            auth_secret: non_empty_var("CHURCH_AUTH_SECRET"),
            token_ttl_hours,
            bootstrap_admin_email: non_empty_var("CHURCH_BOOTSTRAP_ADMIN_EMAIL"),
            internal_psk: non_empty_var("CHURCH_INTERNAL_PSK"),
            cloudinary,
            smtp,
            vapid,
            youtube,
        })
    }

    /// Configuration for tests and local tooling: no integrations, ephemeral database path.
    #[cfg(test)]
    pub fn for_tests(db_path: PathBuf) -> Self {
        Self {
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            auth_secret: Some("test-secret".to_string()),
            token_ttl_hours: 1,
            bootstrap_admin_email: None,
            internal_psk: None,
            cloudinary: None,
            smtp: None,
            vapid: None,
            youtube: None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a group of variables that only make sense together.
fn group<const N: usize>(label: &str, names: [&str; N]) -> Option<[String; N]> {
    let values = names.map(non_empty_var);
    let present = values.iter().filter(|v| v.is_some()).count();

    if present == N {
        Some(values.map(|v| v.unwrap_or_default()))
    } else {
        if present > 0 {
            tracing::warn!("{} configuration is incomplete; integration disabled", label);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        for name in [
            "CHURCH_DB_PATH",
            "CHURCH_BIND_ADDR",
            "CHURCH_LOG_LEVEL",
            "CHURCH_AUTH_SECRET",
            "CHURCH_TOKEN_TTL_HOURS",
            "CLOUDINARY_CLOUD_NAME",
            "CLOUDINARY_API_KEY",
            "CLOUDINARY_API_SECRET",
        ] {
            env::remove_var(name);
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.db_path, PathBuf::from("./data/church.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.token_ttl_hours, 168);
        assert!(config.cloudinary.is_none());
    }

    #[test]
    fn test_partial_group_is_disabled() {
        env::set_var("YOUTUBE_API_KEY", "key-only");
        env::remove_var("YOUTUBE_PLAYLIST_ID");

        let youtube = group("YouTube", ["YOUTUBE_API_KEY", "YOUTUBE_PLAYLIST_ID"]);
        assert!(youtube.is_none());

        env::remove_var("YOUTUBE_API_KEY");
    }
}
