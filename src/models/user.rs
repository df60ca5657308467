//! User profile model layered on top of email/password credentials.

use serde::{Deserialize, Serialize};

/// Role string stored on the profile; permissions are derived from it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    User,
    Member,
    Organizer,
    Admin,
    LifeGroupLeader,
    LifeGroupOrganizer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Member => "member",
            Role::Organizer => "organizer",
            Role::Admin => "admin",
            Role::LifeGroupLeader => "lifeGroupLeader",
            Role::LifeGroupOrganizer => "lifeGroupOrganizer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "member" => Some(Role::Member),
            "organizer" => Some(Role::Organizer),
            "admin" => Some(Role::Admin),
            "lifeGroupLeader" => Some(Role::LifeGroupLeader),
            "lifeGroupOrganizer" => Some(Role::LifeGroupOrganizer),
            _ => None,
        }
    }
}

/// Moderation state shared by profiles, prayer items and directory submissions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ApprovalStatus::Pending),
            "approved" => Some(ApprovalStatus::Approved),
            "rejected" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }
}

/// Kinds of outbound email a user can opt in or out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Announcements,
    PrayerRequests,
    VolunteerOpportunities,
    ServiceReminders,
}

impl EmailKind {
    /// Column on `users` holding the per-type flag.
    pub fn column(&self) -> &'static str {
        match self {
            EmailKind::Announcements => "email_announcements",
            EmailKind::PrayerRequests => "email_prayer_requests",
            EmailKind::VolunteerOpportunities => "email_volunteer_opportunities",
            EmailKind::ServiceReminders => "email_service_reminders",
        }
    }
}

/// Per-type email subscription flags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmailSubscriptions {
    pub announcements: bool,
    pub prayer_requests: bool,
    pub volunteer_opportunities: bool,
    pub service_reminders: bool,
}

impl Default for EmailSubscriptions {
    fn default() -> Self {
        Self {
            announcements: true,
            prayer_requests: false,
            volunteer_opportunities: false,
            service_reminders: true,
        }
    }
}

impl EmailSubscriptions {
    pub fn allows(&self, kind: EmailKind) -> bool {
        match kind {
            EmailKind::Announcements => self.announcements,
            EmailKind::PrayerRequests => self.prayer_requests,
            EmailKind::VolunteerOpportunities => self.volunteer_opportunities,
            EmailKind::ServiceReminders => self.service_reminders,
        }
    }
}

/// A signed-up user and their community profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub is_admin: bool,
    pub status: ApprovalStatus,
    pub notifications_enabled: bool,
    pub email_subscriptions: EmailSubscriptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

/// Request body for creating an account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

/// Request body for signing in.
#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Token plus the profile it was issued for.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub profile: UserProfile,
}

/// Request body for a user editing their own settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub notifications_enabled: Option<bool>,
    #[serde(default)]
    pub email_subscriptions: Option<EmailSubscriptions>,
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for an admin approval decision.
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalRequest {
    pub status: ApprovalStatus,
}

/// Request body for an admin role change.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRequest {
    pub role: Role,
    #[serde(default)]
    pub is_admin: Option<bool>,
}

/// Query parameters for the admin user list.
#[derive(Debug, Clone, Deserialize)]
pub struct UserListQuery {
    #[serde(default)]
    pub status: Option<ApprovalStatus>,
}
