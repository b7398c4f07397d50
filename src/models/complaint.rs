//! Complaint records and their routing status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Routing status of a complaint.
///
/// Persisted and compared as the exact strings `Opened`, `Forwarded` and
/// `Closed`; no other values exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplaintStatus {
    Opened,
    Forwarded,
    Closed,
}

impl ComplaintStatus {
    /// Status every complaint is filed with
    pub const INITIAL: ComplaintStatus = ComplaintStatus::Opened;

    pub const fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Opened => "Opened",
            ComplaintStatus::Forwarded => "Forwarded",
            ComplaintStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Opened" => Ok(ComplaintStatus::Opened),
            "Forwarded" => Ok(ComplaintStatus::Forwarded),
            "Closed" => Ok(ComplaintStatus::Closed),
            other => Err(format!("Unknown complaint status: {}", other)),
        }
    }
}

/// A complaint filed by a user against a department and a person
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub complainant_id: i32,
    /// Department currently owning the complaint
    pub targeted_department_id: i32,
    pub targeted_personnel_id: i32,
    pub status: ComplaintStatus,
    pub attachment_ids: Vec<i32>,
    pub date_added: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

/// A filing ready to be inserted. There is no status field: stores always
/// write [`ComplaintStatus::INITIAL`].
#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub title: String,
    pub description: String,
    pub complainant_id: i32,
    pub targeted_department_id: i32,
    pub targeted_personnel_id: i32,
    pub attachment_ids: Vec<i32>,
}

/// Fields of an existing complaint a save may overwrite. `None` keeps the
/// stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplaintChange {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<ComplaintStatus>,
    pub targeted_department_id: Option<i32>,
    pub targeted_personnel_id: Option<i32>,
}

impl ComplaintChange {
    pub fn is_empty(&self) -> bool {
        *self == ComplaintChange::default()
    }
}

/// Audit row written whenever a complaint's status changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentHistory {
    pub id: i32,
    pub complaint_id: i32,
    pub department_id: i32,
    pub status: ComplaintStatus,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDepartmentHistory {
    pub complaint_id: i32,
    pub department_id: i32,
    pub status: ComplaintStatus,
}

/// Which complaints a list query returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplaintFilter {
    All,
    /// Complaints currently owned by the department
    Department(i32),
    /// Complaints the user filed, is targeted by, or is targeted by through a remark
    Involving(i32),
    Nothing,
}

impl ComplaintFilter {
    /// Row-level predicate equivalent to the SQL used by the postgres store.
    /// `remark_targets` are the personnel ids targeted by the complaint's remarks.
    pub fn matches(&self, complaint: &Complaint, remark_targets: &[i32]) -> bool {
        match *self {
            ComplaintFilter::All => true,
            ComplaintFilter::Department(id) => complaint.targeted_department_id == id,
            ComplaintFilter::Involving(user_id) => {
                complaint.complainant_id == user_id
                    || complaint.targeted_personnel_id == user_id
                    || remark_targets.contains(&user_id)
            }
            ComplaintFilter::Nothing => false,
        }
    }
}
