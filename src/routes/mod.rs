/**
 * Routes Module
 * API route handlers
 */

pub mod auth;
pub mod blog;
pub mod categories;
pub mod contact;
pub mod health;
pub mod project_categories;
pub mod projects;
pub mod sections;
pub mod upload;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;
use crate::slug::is_valid_slug;

/// Envelope used by the project and contact resources
#[derive(Debug, Serialize)]
pub struct ListResponse<T: Serialize> {
    pub success: bool,
    pub count: usize,
    pub data: Vec<T>,
}

impl<T: Serialize> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemResponse<T: Serialize> {
    pub success: bool,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ItemResponse<T> {
    pub fn new(message: &'static str, data: T) -> Self {
        Self {
            success: true,
            message,
            data: Some(data),
        }
    }
}

impl ItemResponse<()> {
    pub fn message(message: &'static str) -> Self {
        Self {
            success: true,
            message,
            data: None,
        }
    }
}

/// Identifier taken from the request path. A malformed id is a client error,
/// never a lookup miss.
pub fn path_id(raw: &str, kind: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::bad_request(format!("Invalid {kind} ID format")))
}

/// Slug taken from the request path. Anything `slugify` could not have
/// produced is rejected before it reaches the store.
pub fn path_slug(raw: &str) -> Result<&str, ApiError> {
    if !is_valid_slug(raw) {
        return Err(ApiError::bad_request(
            "Slug must contain only lowercase letters, numbers, and hyphens",
        ));
    }
    Ok(raw)
}

/// `?page=&limit=` with the lenient parsing clients rely on: anything
/// unparseable or below 1 falls back to the default, and `limit` is capped
/// at [`PageParams::MAX_LIMIT`].
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageParams {
    pub const DEFAULT_LIMIT: i64 = 10;
    pub const MAX_LIMIT: i64 = 100;

    pub fn page(&self) -> i64 {
        positive(self.page.as_deref()).unwrap_or(1)
    }

    pub fn limit(&self) -> i64 {
        positive(self.limit.as_deref())
            .unwrap_or(Self::DEFAULT_LIMIT)
            .min(Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }

    pub fn pagination(&self, total: i64) -> Value {
        let limit = self.limit();
        serde_json::json!({
            "total": total,
            "page": self.page(),
            "pages": total.saturating_add(limit - 1) / limit,
            "limit": limit,
        })
    }
}

fn positive(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok()).filter(|n| *n > 0)
}

/// Trimmed, non-empty string from an optional JSON field.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_fall_back_to_defaults() {
        let params = PageParams {
            page: Some("abc".to_string()),
            limit: Some("-4".to_string()),
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 10);
        assert_eq!(params.offset(), 0);

        let params = PageParams {
            page: Some("3".to_string()),
            limit: Some("5".to_string()),
        };
        assert_eq!(params.offset(), 10);
        assert_eq!(params.pagination(11)["pages"], 3);
    }

    #[test]
    fn test_page_params_clamp_huge_values() {
        let params = PageParams {
            page: Some(i64::MAX.to_string()),
            limit: Some(i64::MAX.to_string()),
        };
        assert_eq!(params.limit(), PageParams::MAX_LIMIT);
        assert_eq!(params.offset(), i64::MAX);
        assert_eq!(params.pagination(i64::MAX)["pages"], i64::MAX / 100);
    }

    #[test]
    fn test_path_id_rejects_malformed_ids() {
        assert!(path_id(&Uuid::new_v4().to_string(), "category").is_ok());
        let err = path_id("42", "category").unwrap_err();
        assert_eq!(err.to_string(), "Invalid category ID format");
    }

    #[test]
    fn test_path_slug_accepts_generated_slugs_only() {
        assert_eq!(path_slug("hello-world").unwrap(), "hello-world");
        assert!(path_slug("Hello World").is_err());
        assert!(path_slug("../etc").is_err());
    }
}
