//! Remark route handlers

use crate::auth::Principal;
use crate::error::ApiResult;
use crate::models::{Remark, SuccessResponse};
use crate::remarks::RemarkUpdate;
use crate::state::SharedState;
use axum::{
    extract::{Extension, Path, State},
    Json,
};

/// PUT /api/remarks/{id}
///
/// Only the respondent may change the text or the attached files.
pub async fn update_remark(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    Json(update): Json<RemarkUpdate>,
) -> ApiResult<Json<SuccessResponse<Remark>>> {
    let remark = state.remarks.update(&principal, id, update).await?;
    Ok(Json(SuccessResponse::with_data("Remark updated successfully.", remark)))
}
