//! Weekly bulletin model and media upload parameters.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A published bulletin PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bulletin {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    pub file_url: String,
    pub created_by: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBulletinRequest {
    pub title: String,
    pub date: NaiveDate,
    pub file_url: String,
}

/// Parameters a client needs for a signed direct upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUpload {
    pub cloud_name: String,
    pub api_key: String,
    pub folder: String,
    pub timestamp: i64,
    pub signature: String,
    pub signature_algorithm: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSignatureQuery {
    pub folder: String,
}
