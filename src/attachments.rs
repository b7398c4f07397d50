//! Attachment store
//!
//! Uploaded files are written to a blob store first and recorded afterwards.
//! Linking to a complaint or remark happens when that owner is saved, so a
//! failed owner save leaves an unlinked attachment behind.

use crate::auth::Principal;
use crate::config::MediaConfig;
use crate::db::Store;
use crate::error::{validation_error, ApiResult, AppError};
use crate::models::{Attachment, AttachmentKind, NewAttachment};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

static UNSAFE_FILE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

/// Where uploaded bytes end up
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` as `directory/name` and return the public URL
    async fn put(&self, directory: &str, name: &str, bytes: &[u8]) -> ApiResult<String>;
}

/// Blobs on the local filesystem, served back under the media URL prefix
pub struct LocalBlobStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalBlobStore {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            root: config.root.clone(),
            url_prefix: config.url_prefix.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, directory: &str, name: &str, bytes: &[u8]) -> ApiResult<String> {
        let dir = self.root.join(directory);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create {}: {}", dir.display(), e)))?;

        let path = dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write {}: {}", path.display(), e)))?;

        Ok(format!("{}/{}/{}", self.url_prefix, directory, name))
    }
}

/// Reduce a client-supplied file name to a safe single path component
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = UNSAFE_FILE_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.chars().take(100).collect()
    }
}

fn extension(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Whether a file of `content_type` named `file_name` may be stored as `kind`.
/// The extension is consulted when the client sent no useful content type.
pub fn accepts(kind: AttachmentKind, content_type: &str, file_name: &str) -> bool {
    let (prefix, extensions): (&str, &[&str]) = match kind {
        AttachmentKind::File => return true,
        AttachmentKind::Picture => ("image/", &["jpg", "jpeg", "png", "gif", "webp", "bmp"]),
        AttachmentKind::Video => ("video/", &["mp4", "webm", "mov", "mkv", "avi", "3gp"]),
        AttachmentKind::Voice => ("audio/", &["mp3", "wav", "ogg", "m4a", "aac", "amr", "opus"]),
    };
    let content_type = content_type.to_ascii_lowercase();
    if content_type.starts_with(prefix) {
        return true;
    }
    let untyped = content_type.is_empty() || content_type == "application/octet-stream";
    untyped && extensions.contains(&extension(file_name).as_str())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// One uploaded file, as received from the client
#[derive(Debug, Clone)]
pub struct Upload {
    pub kind: AttachmentKind,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct AttachmentStore {
    store: Arc<dyn Store>,
    blobs: Arc<dyn BlobStore>,
    max_bytes: usize,
}

impl AttachmentStore {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>, max_bytes: usize) -> Self {
        Self {
            store,
            blobs,
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn upload(&self, uploader: &Principal, upload: Upload) -> ApiResult<Attachment> {
        if upload.bytes.is_empty() {
            return Err(validation_error("file", "The uploaded file is empty"));
        }
        let too_big = || validation_error("file", format!("The uploaded file exceeds {} bytes", self.max_bytes));
        if upload.bytes.len() > self.max_bytes {
            return Err(too_big());
        }
        let size_bytes = i64::try_from(upload.bytes.len()).map_err(|_| too_big())?;
        if !accepts(upload.kind, &upload.content_type, &upload.file_name) {
            return Err(validation_error(
                "file",
                format!("{} is not a valid {} upload", upload.content_type, upload.kind),
            ));
        }

        let file_name = sanitize_file_name(&upload.file_name);
        let blob_name = format!("{}-{}", Uuid::new_v4(), file_name);
        let url = self
            .blobs
            .put(upload.kind.directory(), &blob_name, &upload.bytes)
            .await?;

        let attachment = self
            .store
            .insert_attachment(NewAttachment {
                kind: upload.kind,
                url,
                file_name,
                content_type: upload.content_type,
                size_bytes,
                sha256: sha256_hex(&upload.bytes),
                uploaded_by: uploader.id(),
            })
            .await?;

        info!(
            "Stored {} attachment {} ({} bytes) for {}",
            attachment.kind, attachment.id, attachment.size_bytes, uploader.user.username
        );
        Ok(attachment)
    }
}
