/**
 * Authorization Gate
 * Bearer-token decoding, role guards and password hashing
 */
use axum::{extract::FromRequestParts, http::request::Parts};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::models::{Role, User};
use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUser {
    pub id: Uuid,
    pub role: Role,
}

/// JWT payload: `{ user: { id, role }, iat, exp }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user: TokenUser,
    pub iat: i64,
    pub exp: i64,
}

pub fn create_token(user: &User, config: &AuthConfig) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        user: TokenUser {
            id: user.id,
            role: user.role,
        },
        iat: now.timestamp(),
        exp: (now + config.token_ttl).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, config: &AuthConfig) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

// ============================================================================
// Extractor
// ============================================================================

/// The caller identified by a valid bearer token
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Author => Err(ApiError::Forbidden(
                "Access denied. Admin role required.".to_string(),
            )),
        }
    }

    /// Admins and authors may write blog content.
    pub fn require_author(&self) -> Result<(), ApiError> {
        match self.role {
            Role::Admin | Role::Author => Ok(()),
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized - No token provided".to_string()))?;

        let claims = verify_token(token, &state.config.auth).map_err(|e| {
            tracing::warn!("Rejected bearer token: {}", e);
            ApiError::Unauthorized("Unauthorized - Invalid token".to_string())
        })?;

        Ok(AuthUser {
            id: claims.user.id,
            role: claims.user.role,
        })
    }
}

/// Admin-only routes take this instead of [`AuthUser`].
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.require_admin()?;
        Ok(AdminUser(user))
    }
}

// ============================================================================
// Passwords
// ============================================================================

/// bcrypt is CPU-bound; keep it off the async workers.
pub async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash(password, DEFAULT_COST))
        .await
        .map_err(|e| ApiError::Internal(format!("password hashing task failed: {e}")))?
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {e}")))
}

pub async fn verify_password(password: String, password_hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify(password, &password_hash))
        .await
        .map_err(|e| ApiError::Internal(format!("password verification task failed: {e}")))?
        .map_err(|e| ApiError::Internal(format!("failed to verify password: {e}")))
}
