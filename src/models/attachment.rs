//! Uploaded files bound to complaints and remarks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Picture,
    Video,
    Voice,
    File,
}

impl AttachmentKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Picture => "picture",
            AttachmentKind::Video => "video",
            AttachmentKind::Voice => "voice",
            AttachmentKind::File => "file",
        }
    }

    /// Blob directory the kind is stored under
    pub const fn directory(&self) -> &'static str {
        match self {
            AttachmentKind::Picture => "complaint_pictures",
            AttachmentKind::Video => "complaint_videos",
            AttachmentKind::Voice => "complaint_voices",
            AttachmentKind::File => "complaint_files",
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttachmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "picture" => Ok(AttachmentKind::Picture),
            "video" => Ok(AttachmentKind::Video),
            "voice" => Ok(AttachmentKind::Voice),
            "file" => Ok(AttachmentKind::File),
            other => Err(format!("Unknown attachment kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: i32,
    pub kind: AttachmentKind,
    /// Public URL of the stored blob
    pub url: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub sha256: String,
    pub uploaded_by: i32,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub kind: AttachmentKind,
    pub url: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub sha256: String,
    pub uploaded_by: i32,
}
