//! JWT token management
//!
//! Handles creation, validation, and refresh of JWT tokens.

use crate::config::AuthConfig;
use crate::error::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims. The role is deliberately absent: it is resolved from the
/// store on every request so group changes apply immediately.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: i32,
    pub username: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Token type (access or refresh)
    pub token_type: TokenType,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Token pair response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

fn sign(config: &AuthConfig, claims: &Claims) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

/// Create access and refresh tokens for a user
pub fn create_tokens(config: &AuthConfig, user_id: i32, username: &str) -> Result<TokenPair, AppError> {
    let now = Utc::now();

    let access_claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (now + Duration::minutes(config.access_token_minutes)).timestamp(),
        iat: now.timestamp(),
        token_type: TokenType::Access,
    };

    let refresh_claims = Claims {
        exp: (now + Duration::days(config.refresh_token_days)).timestamp(),
        token_type: TokenType::Refresh,
        ..access_claims.clone()
    };

    Ok(TokenPair {
        access_token: sign(config, &access_claims)?,
        refresh_token: sign(config, &refresh_claims)?,
        token_type: "Bearer".to_string(),
        expires_in: config.access_token_minutes * 60,
    })
}

/// Decode and validate a JWT token
pub fn decode_token(config: &AuthConfig, token: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Token expired".to_string())
        }
        jsonwebtoken::errors::ErrorKind::InvalidToken => {
            AppError::Unauthorized("Invalid token".to_string())
        }
        _ => AppError::Unauthorized(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

/// Refresh tokens using a valid refresh token
pub fn refresh_tokens(config: &AuthConfig, refresh_token: &str) -> Result<TokenPair, AppError> {
    let claims = decode_token(config, refresh_token)?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized("Invalid token type for refresh".to_string()));
    }

    create_tokens(config, claims.sub, &claims.username)
}
