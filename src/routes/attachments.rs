//! Attachment upload handler

use crate::attachments::Upload;
use crate::auth::Principal;
use crate::error::{validation_error, ApiResult, AppError};
use crate::models::{Attachment, AttachmentKind, SuccessResponse};
use crate::state::SharedState;
use axum::{
    extract::{Extension, Multipart, State},
    http::StatusCode,
    Json,
};

/// POST /api/attachments
///
/// Multipart form with a `kind` text field (picture, video, voice or file)
/// and a `file` field. The returned id is what complaints and remarks link.
pub async fn upload_attachment(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Attachment>>)> {
    let mut kind: Option<AttachmentKind> = None;
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "kind" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                kind = Some(text.trim().parse().map_err(|e: String| validation_error("kind", e))?);
            }
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file = Some((file_name, content_type, data.to_vec()));
            }
            _ => {}
        }
    }

    let kind = kind.ok_or_else(|| validation_error("kind", "kind is required"))?;
    let (file_name, content_type, bytes) = file.ok_or_else(|| validation_error("file", "file is required"))?;

    let attachment = state
        .attachments
        .upload(
            &principal,
            Upload {
                kind,
                file_name,
                content_type,
                bytes,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("File uploaded successfully.", attachment)),
    ))
}
