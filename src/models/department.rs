//! Department directory records

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A department complaints can be filed against and users belong to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: i32,
    pub name: String,
    pub description: String,
}

/// Request to create a department
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewDepartment {
    #[validate(length(min = 1, max = 100, message = "Department name must be between 1 and 100 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}
