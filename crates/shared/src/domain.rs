use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name recorded on a grievance when the submitter asked to stay anonymous.
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// Opaque document id assigned by the backing store on creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrievanceId(pub String);

impl GrievanceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GrievanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for GrievanceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Default for GrievanceId {
    fn default() -> Self {
        Self(String::new())
    }
}

/// Lifecycle status. No ordering is enforced between the three values;
/// any status may move to any other, including reopening a resolved record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::InProgress => "In Progress",
            Status::Resolved => "Resolved",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed category set. Must stay in sync with the options any front end
/// offers on the submission form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Academics,
    Facilities,
    Administration,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Academics => "Academics",
            Category::Facilities => "Facilities",
            Category::Administration => "Administration",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A grievance as persisted in the store. The store owns the record;
/// callers never hold a long-lived copy across mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grievance {
    #[serde(skip)]
    pub id: GrievanceId,
    pub name: String,
    pub email: String,
    pub category: Category,
    pub description: String,
    pub status: Status,
    pub anonymous: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Fields of a grievance prior to persistence. The store assigns the id,
/// the adapter forces status to Pending and stamps the submission time.
#[derive(Debug, Clone)]
pub struct NewGrievance {
    pub name: String,
    pub email: String,
    pub category: Category,
    pub description: String,
    pub anonymous: bool,
}
