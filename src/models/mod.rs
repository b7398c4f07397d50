//! Data models and DTOs (Data Transfer Objects)
//!
//! Domain records shared by the stores, the routing engine and the API.

pub mod attachment;
pub mod complaint;
pub mod department;
pub mod remark;
pub mod user;

// Re-export commonly used types
pub use attachment::*;
pub use complaint::*;
pub use department::*;
pub use remark::*;
pub use user::*;

use serde::Serialize;

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Message-only response (no data)
#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
