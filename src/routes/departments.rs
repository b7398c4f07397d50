//! Department directory route handlers

use crate::auth::Principal;
use crate::error::{ApiResult, AppError};
use crate::models::{Department, NewDepartment, SuccessResponse};
use crate::state::SharedState;
use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use validator::Validate;

/// GET /api/departments
pub async fn list_departments(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<Vec<Department>>>> {
    let departments = state.store.list_departments().await?;
    Ok(Json(SuccessResponse::with_data(
        format!("{} departments", departments.len()),
        departments,
    )))
}

/// POST /api/departments
pub async fn create_department(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<NewDepartment>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Department>>)> {
    if !principal.role.is_unrestricted() {
        return Err(AppError::Forbidden(
            "Only a CEO or superuser can create departments".to_string(),
        ));
    }
    payload.validate()?;

    let department = state
        .store
        .create_department(NewDepartment {
            name: payload.name.trim().to_string(),
            description: payload.description,
        })
        .await?;
    info!("Department {} created by {}", department.name, principal.user.username);

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Department created successfully.", department)),
    ))
}
