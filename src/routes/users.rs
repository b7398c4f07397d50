//! User directory route handlers

use crate::auth::Principal;
use crate::error::ApiResult;
use crate::models::{MessageResponse, SuccessResponse, User};
use crate::state::SharedState;
use crate::users::ProfileRequest;
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
}

/// GET /api/users?search=
pub async fn list_users(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<SuccessResponse<Vec<User>>>> {
    debug!("Listing users for {} (search: {:?})", principal.user.username, query.search);
    let users = state.users.list(&principal, query.search.as_deref()).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("{} users", users.len()),
        users,
    )))
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> ApiResult<Json<SuccessResponse<User>>> {
    let user = state.users.get(&principal, id).await?;
    Ok(Json(SuccessResponse::with_data("User retrieved.", user)))
}

/// PUT /api/users/{id}/profile
pub async fn update_profile(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    Json(req): Json<ProfileRequest>,
) -> ApiResult<Json<SuccessResponse<User>>> {
    let user = state.users.update_profile(&principal, id, req).await?;
    Ok(Json(SuccessResponse::with_data("Profile updated successfully.", user)))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> ApiResult<Json<MessageResponse>> {
    state.users.delete(&principal, id).await?;
    Ok(Json(MessageResponse::new("User deleted successfully.")))
}
