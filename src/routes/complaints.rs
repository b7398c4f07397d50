//! Complaint route handlers
//!
//! Listing goes through the caller's visibility scope; detail, history and
//! remark reads answer 404 for complaints the caller may not view.

use crate::auth::Principal;
use crate::error::ApiResult;
use crate::models::{
    Attachment, Complaint, ComplaintStatus, DepartmentHistory, MessageResponse, Remark, SuccessResponse,
};
use crate::remarks::{latest_status, RemarkRequest};
use crate::routing::{ComplaintEdit, Filing};
use crate::state::SharedState;
use crate::visibility::{complaint_scope, personal_scope};
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

/// Complaint with its remark ledger and resolved attachments
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintDetail {
    #[serde(flatten)]
    pub complaint: Complaint,
    pub latest_status: ComplaintStatus,
    pub remarks: Vec<Remark>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemarkAdded {
    pub remark: Remark,
    pub complaint: Complaint,
}

/// GET /api/complaints
///
/// Everything for CEO and superuser, the department's complaints for an HOD,
/// nothing for anyone else.
pub async fn list_complaints(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<SuccessResponse<Vec<Complaint>>>> {
    let complaints = state.store.list_complaints(complaint_scope(&principal)).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("{} complaints", complaints.len()),
        complaints,
    )))
}

/// GET /api/complaints/mine
///
/// Complaints the caller filed, is targeted by, or was targeted by a remark.
pub async fn my_complaints(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<SuccessResponse<Vec<Complaint>>>> {
    let complaints = state.store.list_complaints(personal_scope(&principal)).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("{} complaints", complaints.len()),
        complaints,
    )))
}

/// POST /api/complaints
pub async fn create_complaint(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Json(filing): Json<Filing>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Complaint>>)> {
    let complaint = state.routing.file(&principal, filing).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Complaint filed successfully.", complaint)),
    ))
}

/// GET /api/complaints/{id}
pub async fn get_complaint(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> ApiResult<Json<SuccessResponse<ComplaintDetail>>> {
    let (complaint, remarks) = state.remarks.list(&principal, id).await?;

    let mut ids: Vec<i32> = complaint
        .attachment_ids
        .iter()
        .chain(remarks.iter().flat_map(|r| r.attachment_ids.iter()))
        .copied()
        .collect();
    ids.sort_unstable();
    ids.dedup();
    let attachments = state.store.get_attachments(&ids).await?;

    let detail = ComplaintDetail {
        latest_status: latest_status(&complaint, &remarks),
        complaint,
        remarks,
        attachments,
    };
    Ok(Json(SuccessResponse::with_data("Complaint retrieved.", detail)))
}

/// PUT /api/complaints/{id}
pub async fn update_complaint(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    Json(edit): Json<ComplaintEdit>,
) -> ApiResult<Json<SuccessResponse<Complaint>>> {
    let complaint = state.routing.edit(&principal, id, edit).await?;
    Ok(Json(SuccessResponse::with_data("Complaint updated successfully.", complaint)))
}

/// DELETE /api/complaints/{id}
pub async fn delete_complaint(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> ApiResult<Json<MessageResponse>> {
    state.routing.delete(&principal, id).await?;
    Ok(Json(MessageResponse::new("Complaint deleted successfully.")))
}

/// GET /api/complaints/{id}/history
pub async fn complaint_history(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> ApiResult<Json<SuccessResponse<Vec<DepartmentHistory>>>> {
    let history = state.routing.history(&principal, id).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("{} history entries", history.len()),
        history,
    )))
}

/// GET /api/complaints/{id}/remarks
pub async fn list_remarks(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> ApiResult<Json<SuccessResponse<Vec<Remark>>>> {
    let (_, remarks) = state.remarks.list(&principal, id).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("{} remarks", remarks.len()),
        remarks,
    )))
}

/// POST /api/complaints/{id}/remarks
///
/// Forwarding moves the complaint to the remark's department; closing leaves
/// the complaint record as it is.
pub async fn add_remark(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    Json(request): Json<RemarkRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<RemarkAdded>>)> {
    let (remark, complaint) = state.remarks.add(&principal, id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(
            "Remark added successfully.",
            RemarkAdded { remark, complaint },
        )),
    ))
}
