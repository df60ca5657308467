//! Volunteer opportunity model.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityStatus {
    /// Proposed, awaiting approval
    Pending,
    Open,
    Closed,
    Cancelled,
}

impl OpportunityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityStatus::Pending => "pending",
            OpportunityStatus::Open => "open",
            OpportunityStatus::Closed => "closed",
            OpportunityStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OpportunityStatus::Pending),
            "open" => Some(OpportunityStatus::Open),
            "closed" => Some(OpportunityStatus::Closed),
            "cancelled" => Some(OpportunityStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolunteerOpportunity {
    pub id: String,
    pub title: String,
    pub description: String,
    /// RFC 3339 start time
    pub starts_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_volunteers: Option<i64>,
    pub status: OpportunityStatus,
    pub created_by: String,
    pub volunteers: Vec<VolunteerSignup>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolunteerSignup {
    pub user_id: String,
    pub name: String,
    pub signed_up_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOpportunityRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub starts_at: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub max_volunteers: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOpportunityRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub starts_at: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub max_volunteers: Option<i64>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpportunityStatusRequest {
    pub status: OpportunityStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpportunityQuery {
    #[serde(default)]
    pub status: Option<OpportunityStatus>,
}
