/**
 * Authentication Routes
 * Registration, login and the admin dashboard probe
 */
use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::{create_token, hash_password, verify_password, AdminUser};
use crate::db::models::{Role, User};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::StoreError;

const MIN_PASSWORD_LEN: usize = 6;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// User info returned to frontend
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserInfo {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user: UserInfo,
    pub redirect_to: String,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

/// Collect every failed rule so the client can show them all at once.
fn validate_registration(payload: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    if payload.name.trim().is_empty() {
        errors.push(json!({ "field": "name", "message": "Name is required" }));
    }
    if !is_plausible_email(payload.email.trim()) {
        errors.push(json!({ "field": "email", "message": "Please enter a valid email" }));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(json!({
            "field": "password",
            "message": "Password must be at least 6 characters long"
        }));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation("Validation failed", errors.into()))
    }
}

fn session(user: &User, state: &AppState) -> Result<AuthResponse, ApiError> {
    let token = create_token(user, &state.config.auth).map_err(|e| {
        ApiError::Internal(format!("failed to sign token for {}: {e}", user.id))
    })?;
    Ok(AuthResponse {
        token,
        user: UserInfo::from(user),
        redirect_to: "/dashboard".to_string(),
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/register
/// The first account becomes the admin; later accounts are authors.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_registration(&payload)?;

    let email = payload.email.trim().to_lowercase();
    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }

    let role = if state.store.count_users().await? == 0 {
        Role::Admin
    } else {
        Role::Author
    };

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        email,
        password_hash: hash_password(payload.password).await?,
        role,
        created_at: now,
        updated_at: now,
    };

    let user = match state.store.insert_user(&user).await {
        Ok(user) => user,
        // Lost a race with a concurrent registration for the same address.
        Err(StoreError::Duplicate(_)) => {
            return Err(ApiError::Conflict("User already exists".to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!("Registered user {} with role {}", user.id, user.role);
    Ok(Json(session(&user, &state)?))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let user = state
        .store
        .find_user_by_email(payload.email.trim())
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid credentials"))?;

    if !verify_password(payload.password, user.password_hash.clone()).await? {
        tracing::warn!("Failed login attempt for user {}", user.id);
        return Err(ApiError::bad_request("Invalid credentials"));
    }

    tracing::info!("User {} logged in", user.id);
    Ok(Json(session(&user, &state)?))
}

/// GET /api/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    AdminUser(caller): AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .store
        .get_user(caller.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(json!({
        "message": "Welcome to the Admin Dashboard",
        "user": UserInfo::from(&user),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_plausibility() {
        assert!(is_plausible_email("ada@example.com"));
        assert!(!is_plausible_email("ada.example.com"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("ada@localhost"));
    }

    #[test]
    fn test_registration_reports_every_failed_rule() {
        let payload = RegisterRequest {
            name: " ".to_string(),
            email: "nope".to_string(),
            password: "123".to_string(),
        };
        match validate_registration(&payload) {
            Err(ApiError::Validation { details: Some(details), .. }) => {
                assert_eq!(details.as_array().map(Vec::len), Some(3));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_auth_response_uses_camel_case_redirect() {
        let response = AuthResponse {
            token: "t".to_string(),
            user: UserInfo {
                id: Uuid::nil(),
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                role: Role::Admin,
            },
            redirect_to: "/dashboard".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["redirectTo"], "/dashboard");
        assert_eq!(json["user"]["role"], "admin");
    }
}
