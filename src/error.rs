use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::media::MediaError;
use crate::store::StoreError;

/// Errors surfaced at the HTTP boundary. Every variant renders as
/// `{"message": ..., "details"?: ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    /// A JSON-encoded form field that did not decode to the expected shape.
    #[error("{message}: {details}")]
    MalformedField { message: String, details: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>, details: Value) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn malformed(message: impl Into<String>, details: impl Into<String>) -> Self {
        ApiError::MalformedField {
            message: message.into(),
            details: details.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. }
            | ApiError::MalformedField { .. }
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Store(e) => match e {
                StoreError::Duplicate(_) => StatusCode::CONFLICT,
                StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                StoreError::Referenced(_) | StoreError::MissingReference(_) => {
                    StatusCode::BAD_REQUEST
                }
                StoreError::Corrupt(_) | StoreError::Database(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Media(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Media(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        let (message, details) = match self {
            ApiError::Validation { message, details } => (message.clone(), details.clone()),
            ApiError::MalformedField { message, details } => {
                (message.clone(), Some(Value::String(details.clone())))
            }
            ApiError::Store(StoreError::Duplicate(field)) => {
                (format!("A record with this {field} already exists"), None)
            }
            ApiError::Store(StoreError::Referenced(kind)) => (
                format!("Cannot delete {}: it is still referenced", kind.to_lowercase()),
                None,
            ),
            ApiError::Store(StoreError::MissingReference(field)) => {
                (format!("Invalid {field} ID"), None)
            }
            ApiError::Store(e @ StoreError::NotFound { .. }) => (e.to_string(), None),
            ApiError::Media(e) if e.is_client_error() => (e.to_string(), None),
            ApiError::Media(_) => ("Error uploading image".to_string(), None),
            ApiError::Store(_) | ApiError::Internal(_) => {
                ("Internal server error".to_string(), None)
            }
            other => (other.to_string(), None),
        };

        match details {
            Some(details) => json!({ "message": message, "details": details }),
            None => json!({ "message": message }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }
        (status, Json(self.body())).into_response()
    }
}
