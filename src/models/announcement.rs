//! Announcement and event category models.

use serde::{Deserialize, Serialize};

/// Lifecycle state for announcements and prayer items.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Active,
    Archived,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Active => "active",
            ContentStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ContentStatus::Active),
            "archived" => Some(ContentStatus::Archived),
            _ => None,
        }
    }
}

/// A church-wide announcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub title: String,
    /// Rich-text (HTML) body
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub author_id: String,
    pub author_name: String,
    pub status: ContentStatus,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub version: i64,
}

/// Request body for creating an announcement.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnouncementRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Email subscribers and push to the `announcements` topic
    #[serde(default)]
    pub notify: bool,
}

/// Request body for editing an announcement.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAnnouncementRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Query parameters for the announcement list.
#[derive(Debug, Clone, Deserialize)]
pub struct AnnouncementQuery {
    #[serde(default)]
    pub status: Option<ContentStatus>,
}

/// Category used to label announcements and events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCategory {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}
