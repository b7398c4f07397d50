//! User records and group membership

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Group a user can be a member of. Persisted by its upper-case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Group {
    #[serde(rename = "CEO")]
    Ceo,
    #[serde(rename = "HOD")]
    Hod,
    #[serde(rename = "EMPLOYEE", alias = "Employee")]
    Employee,
}

impl Group {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Group::Ceo => "CEO",
            Group::Hod => "HOD",
            Group::Employee => "EMPLOYEE",
        }
    }

    /// Position in user listings: CEO first, then HOD, then employees
    pub const fn rank(&self) -> u8 {
        match self {
            Group::Ceo => 1,
            Group::Hod => 2,
            Group::Employee => 3,
        }
    }

    /// Staff accounts are the ones that may register other users
    pub const fn is_staff(&self) -> bool {
        matches!(self, Group::Ceo | Group::Hod)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Group {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CEO" => Ok(Group::Ceo),
            "HOD" => Ok(Group::Hod),
            "EMPLOYEE" => Ok(Group::Employee),
            other => Err(format!("Unknown group: {}", other)),
        }
    }
}

/// Rank given to users outside every known group
pub const UNGROUPED_RANK: u8 = 4;

/// User model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_superuser: bool,
    pub is_staff: bool,
    /// Group memberships in the order they were granted
    pub groups: Vec<Group>,
    /// Department affiliations; the first one is the primary department
    pub department_ids: Vec<i32>,
    pub phone_number: Option<String>,
    pub region: Option<String>,
    pub district: Option<String>,
    pub profile_picture: Option<String>,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn primary_department(&self) -> Option<i32> {
        self.department_ids.first().copied()
    }

    pub fn in_group(&self, group: Group) -> bool {
        self.groups.contains(&group)
    }

    pub fn shares_department(&self, department_id: i32) -> bool {
        self.department_ids.contains(&department_id)
    }

    /// Listing rank of the highest group the user belongs to
    pub fn rank(&self) -> u8 {
        self.groups
            .iter()
            .map(Group::rank)
            .min()
            .unwrap_or(UNGROUPED_RANK)
    }

    /// Case-insensitive substring match over the searchable fields
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [&self.username, &self.email, &self.first_name, &self.last_name]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// Everything needed to insert a user row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub groups: Vec<Group>,
    pub department_ids: Vec<i32>,
    pub profile_picture: Option<String>,
}

/// Profile fields a user may change on their own account
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub region: Option<String>,
    pub district: Option<String>,
    pub profile_picture: Option<String>,
}

fn blank_to_none(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl ProfileUpdate {
    /// Overwrite the fields that are present. A blank optional attribute
    /// clears it.
    pub fn apply_to(self, user: &mut User) {
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
        if let Some(username) = self.username {
            user.username = username;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(phone) = self.phone_number {
            user.phone_number = blank_to_none(phone);
        }
        if let Some(region) = self.region {
            user.region = blank_to_none(region);
        }
        if let Some(district) = self.district {
            user.district = blank_to_none(district);
        }
        if let Some(picture) = self.profile_picture {
            user.profile_picture = blank_to_none(picture);
        }
    }
}
