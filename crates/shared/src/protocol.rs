use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Category, Grievance, GrievanceId, Status};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitGrievanceRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub category: Category,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub anonymous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitGrievanceResponse {
    pub id: GrievanceId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrievancePayload {
    pub id: GrievanceId,
    pub name: String,
    pub email: String,
    pub category: Category,
    pub description: String,
    pub status: Status,
    pub anonymous: bool,
    pub submitted_at: DateTime<Utc>,
}

impl From<Grievance> for GrievancePayload {
    fn from(grievance: Grievance) -> Self {
        Self {
            id: grievance.id,
            name: grievance.name,
            email: grievance.email,
            category: grievance.category,
            description: grievance.description,
            status: grievance.status,
            anonymous: grievance.anonymous,
            submitted_at: grievance.submitted_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: Status,
}

/// How the advisory email fared after a committed status change. `Failed`
/// never turns into a request failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum NotificationOutcome {
    Sent,
    Skipped,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateResponse {
    pub grievance: GrievancePayload,
    pub notification: NotificationOutcome,
}

/// Per-status tallies keyed by the original wire names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    #[serde(rename = "Pending")]
    pub pending: u64,
    #[serde(rename = "In Progress")]
    pub in_progress: u64,
    #[serde(rename = "Resolved")]
    pub resolved: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportPayload {
    pub total_grievances: u64,
    pub status_count: StatusCount,
    pub category_count: BTreeMap<String, u64>,
}
