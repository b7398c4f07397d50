//! Remark records: the actions taken against a complaint

use crate::models::ComplaintStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a remark does to its complaint. A remark can never re-open a
/// complaint, so there is no `Opened` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemarkAction {
    Forwarded,
    Closed,
}

impl RemarkAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RemarkAction::Forwarded => "Forwarded",
            RemarkAction::Closed => "Closed",
        }
    }

    pub const fn status(&self) -> ComplaintStatus {
        match self {
            RemarkAction::Forwarded => ComplaintStatus::Forwarded,
            RemarkAction::Closed => ComplaintStatus::Closed,
        }
    }
}

impl TryFrom<ComplaintStatus> for RemarkAction {
    type Error = ComplaintStatus;

    fn try_from(status: ComplaintStatus) -> Result<Self, Self::Error> {
        match status {
            ComplaintStatus::Forwarded => Ok(RemarkAction::Forwarded),
            ComplaintStatus::Closed => Ok(RemarkAction::Closed),
            ComplaintStatus::Opened => Err(status),
        }
    }
}

impl fmt::Display for RemarkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledger entry against a complaint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remark {
    pub id: i32,
    pub complaint_id: i32,
    pub respondent_id: i32,
    pub content: String,
    pub status: RemarkAction,
    pub targeted_department_id: i32,
    pub targeted_personnel_id: i32,
    pub attachment_ids: Vec<i32>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRemark {
    pub complaint_id: i32,
    pub respondent_id: i32,
    pub content: String,
    pub status: RemarkAction,
    pub targeted_department_id: i32,
    pub targeted_personnel_id: i32,
    pub attachment_ids: Vec<i32>,
}

/// Editable parts of an accepted remark
#[derive(Debug, Clone, Default)]
pub struct RemarkEdit {
    pub content: Option<String>,
    pub attachment_ids: Option<Vec<i32>>,
}
