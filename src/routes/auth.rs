//! Authentication route handlers
//!
//! Login, token refresh, the current user, registration and password change.

use crate::auth::{create_tokens, refresh_tokens, Principal, Role, TokenPair};
use crate::error::ApiResult;
use crate::models::{MessageResponse, User};
use crate::registration::{self, RegistrationRequest};
use crate::state::SharedState;
use crate::users::PasswordChange;
use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

// ============================================
// Request/Response Types
// ============================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user: User,
    pub role: Role,
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub success: bool,
    pub user: User,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct RegisteredResponse {
    pub success: bool,
    pub message: String,
    pub user: User,
}

// ============================================
// Route Handlers
// ============================================

/// POST /api/auth/login
pub async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = state.users.authenticate(&req.username, &req.password).await?;
    let tokens = create_tokens(&state.settings.auth, user.id, &user.username)?;
    let principal = Principal::new(user);

    info!("{} logged in as {}", principal.user.username, principal.role);

    Ok(Json(AuthResponse {
        success: true,
        role: principal.role,
        user: principal.user,
        tokens,
    }))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<SharedState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let tokens = refresh_tokens(&state.settings.auth, &req.refresh_token)?;
    Ok(Json(TokenResponse {
        success: true,
        tokens,
    }))
}

/// GET /api/auth/me
pub async fn me(Extension(principal): Extension<Principal>) -> Json<MeResponse> {
    Json(MeResponse {
        success: true,
        role: principal.role,
        user: principal.user,
    })
}

/// POST /api/auth/register
///
/// Register an account on behalf of the caller; placement depends on the
/// caller's role.
pub async fn register(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<RegistrationRequest>,
) -> ApiResult<(StatusCode, Json<RegisteredResponse>)> {
    let user = registration::register(&state, &principal, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisteredResponse {
            success: true,
            message: "User registered successfully.".to_string(),
            user,
        }),
    ))
}

/// POST /api/auth/password
pub async fn change_password(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<PasswordChange>,
) -> ApiResult<Json<MessageResponse>> {
    state.users.change_password(&principal, req).await?;
    Ok(Json(MessageResponse::new("Password changed successfully.")))
}
