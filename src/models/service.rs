//! Weekly service-role scheduling model.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    AwaitingConfirmation,
    Accepted,
    Declined,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::AwaitingConfirmation => "awaiting_confirmation",
            AssignmentStatus::Accepted => "accepted",
            AssignmentStatus::Declined => "declined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AssignmentStatus::Pending),
            "awaiting_confirmation" => Some(AssignmentStatus::AwaitingConfirmation),
            "accepted" => Some(AssignmentStatus::Accepted),
            "declined" => Some(AssignmentStatus::Declined),
            _ => None,
        }
    }
}

/// The Sunday on or before `date`; weeks are keyed by it.
pub fn week_start_for(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_sunday();
    date.checked_sub_days(Days::new(u64::from(offset)))
        .unwrap_or(date)
}

/// A named role that can be filled each week (worship leader, sound, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRole {
    pub id: String,
    pub name: String,
    pub sort_order: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRoleRequest {
    pub name: String,
    #[serde(default)]
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAssignment {
    pub id: String,
    pub week_start: NaiveDate,
    pub role: String,
    pub user_id: String,
    pub user_name: String,
    pub status: AssignmentStatus,
    pub assigned_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<String>,
    pub updated_at: String,
}

/// All assignments for one week plus the week's version.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceWeek {
    pub week_start: NaiveDate,
    pub version: i64,
    pub assignments: Vec<ServiceAssignment>,
}

/// The edit map for a week: role name to assigned user, `None` clears the role.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveWeekRequest {
    pub assignments: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RespondRequest {
    pub accept: bool,
}

/// Difference between the stored week and the edit map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekPlan {
    /// Assignment ids whose (role, user) pair is no longer wanted
    pub remove: Vec<String>,
    /// (role, user) pairs to create
    pub add: Vec<(String, String)>,
}

impl WeekPlan {
    /// Compare stored assignments with the edit map. After applying the plan the
    /// week holds exactly the non-empty entries of `pending`; unchanged pairs are
    /// left alone so their status survives.
    pub fn diff(existing: &[ServiceAssignment], pending: &BTreeMap<String, Option<String>>) -> Self {
        let wanted: BTreeSet<(String, String)> = pending
            .iter()
            .filter_map(|(role, user)| {
                user.as_ref()
                    .map(|u| u.trim())
                    .filter(|u| !u.is_empty())
                    .map(|u| (role.clone(), u.to_string()))
            })
            .collect();

        let mut kept = BTreeSet::new();
        let mut remove = Vec::new();
        for assignment in existing {
            let pair = (assignment.role.clone(), assignment.user_id.clone());
            if wanted.contains(&pair) && !kept.contains(&pair) {
                kept.insert(pair);
            } else {
                remove.push(assignment.id.clone());
            }
        }

        let add = wanted.difference(&kept).cloned().collect();

        Self { remove, add }
    }

    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}
