//! Revision tracking and change notifications for list invalidation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Collection names used in revision tracking and change events.
pub mod collections {
    pub const USERS: &str = "users";
    pub const ANNOUNCEMENTS: &str = "announcements";
    pub const EVENT_CATEGORIES: &str = "eventCategories";
    pub const PRAYER: &str = "prayerPraise";
    pub const LIFE_GROUPS: &str = "lifeGroups";
    pub const FAMILIES: &str = "families";
    pub const TEACHERS: &str = "teachers";
    pub const TEACHING: &str = "teachingSchedules";
    pub const SERVICE_ROLES: &str = "serviceRoles";
    pub const SERVICE_ASSIGNMENTS: &str = "serviceAssignments";
    pub const VOLUNTEERS: &str = "volunteerOpportunities";
    pub const BULLETINS: &str = "bulletins";
    pub const DIRECTORY_SUBMISSIONS: &str = "directorySubmissions";
    pub const DIRECTORY: &str = "members";
    pub const SERMONS: &str = "sermons";
    pub const PUSH_SUBSCRIPTIONS: &str = "pushSubscriptions";
}

/// Revision information for change detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInfo {
    pub revision_id: i64,
    pub generated_at: String,
    /// Global revision at which each collection last changed
    pub collections: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    /// Many rows under one key were rewritten (a service week, a roster)
    Replaced,
}

/// Broadcast after every committed write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub collection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub kind: ChangeKind,
    pub revision_id: i64,
}

/// Query parameters for the long-poll endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesQuery {
    #[serde(default)]
    pub since: i64,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Collections that changed after the caller's revision.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesResponse {
    pub revision_id: i64,
    pub collections: Vec<String>,
}
