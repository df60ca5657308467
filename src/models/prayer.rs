//! Prayer and praise board model.

use serde::{Deserialize, Serialize};

use super::{ApprovalStatus, ContentStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PrayerKind {
    Prayer,
    Praise,
}

impl PrayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerKind::Prayer => "prayer",
            PrayerKind::Praise => "praise",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "prayer" => Some(PrayerKind::Prayer),
            "praise" => Some(PrayerKind::Praise),
            _ => None,
        }
    }
}

/// A prayer request or praise report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrayerItem {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: PrayerKind,
    /// Hidden from other members when the item is anonymous
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    pub author_name: String,
    pub anonymous: bool,
    pub status: ContentStatus,
    pub approval: ApprovalStatus,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub version: i64,
}

impl PrayerItem {
    /// Strip the author identity of an anonymous item.
    pub fn redacted(mut self) -> Self {
        if self.anonymous {
            self.author_id = None;
            self.author_name = "Anonymous".to_string();
        }
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrayerRequest {
    pub title: String,
    pub content: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: PrayerKind,
    #[serde(default)]
    pub anonymous: bool,
}

fn default_kind() -> PrayerKind {
    PrayerKind::Prayer
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrayerStatusRequest {
    pub status: ContentStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrayerQuery {
    #[serde(default)]
    pub approval: Option<ApprovalStatus>,
}
