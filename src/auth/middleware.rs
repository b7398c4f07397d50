//! Authentication middleware
//!
//! Validates the bearer token, loads the user and resolves the role once;
//! handlers receive the result as an `Extension<Principal>`.

use crate::auth::{decode_token, Principal, TokenType};
use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use tracing::debug;

pub async fn auth_middleware(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Authorization(bearer) = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    let claims = decode_token(&state.settings.auth, bearer.token())?;
    if claims.token_type != TokenType::Access {
        return Err(AppError::Unauthorized("Refresh tokens cannot be used here".to_string()));
    }

    let user = state
        .store
        .get_user(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;

    let principal = Principal::new(user);
    debug!("Authenticated {} as {}", principal.user.username, principal.role);

    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}
