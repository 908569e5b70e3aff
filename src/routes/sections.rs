/**
 * Section Routes
 * Homepage sections, each resolving its own list of published blogs
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{non_blank, path_id};
use crate::auth::AdminUser;
use crate::db::models::{Blog, BlogQuery, CustomQuery, DisplayStyle, Section, SectionType};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{EntityStore, OrderedKind};
use crate::workflow::reorder::apply as apply_reorder;

const DEFAULT_LIMIT: i32 = 6;
const MAX_LIMIT: i64 = 20;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub section_type: Option<String>,
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub order: Option<i32>,
    pub is_active: Option<bool>,
    pub display_style: Option<String>,
    pub custom_query: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct SectionWithBlogs {
    #[serde(flatten)]
    pub section: Section,
    pub blogs: Vec<Blog>,
}

// ============================================================================
// Field validation
// ============================================================================

fn parse_type(raw: Option<String>) -> Result<Option<SectionType>, ApiError> {
    non_blank(raw)
        .map(|s| {
            s.parse().map_err(|_| {
                ApiError::bad_request("Type must be one of featured, latest, category or custom")
            })
        })
        .transpose()
}

fn parse_style(raw: Option<String>) -> Result<Option<DisplayStyle>, ApiError> {
    non_blank(raw)
        .map(|s| {
            s.parse().map_err(|_| {
                ApiError::bad_request("Display style must be one of grid, list or carousel")
            })
        })
        .transpose()
}

fn check_limit(limit: i64) -> Result<i32, ApiError> {
    if (1..=MAX_LIMIT).contains(&limit) {
        Ok(limit as i32)
    } else {
        Err(ApiError::bad_request("Limit must be between 1 and 20"))
    }
}

fn parse_custom_query(raw: Value) -> Result<CustomQuery, ApiError> {
    serde_json::from_value(raw).map_err(|_| ApiError::bad_request("Invalid custom query"))
}

async fn resolve_category(store: &dyn EntityStore, raw: &str) -> Result<Uuid, ApiError> {
    let invalid = || ApiError::bad_request("Invalid category ID");
    let id = Uuid::parse_str(raw).map_err(|_| invalid())?;
    store.get_category(id).await?.ok_or_else(invalid)?;
    Ok(id)
}

/// The category a section of `kind` points at. Only `category` sections
/// keep one, and for them it is mandatory.
async fn category_for(
    store: &dyn EntityStore,
    kind: SectionType,
    submitted: Option<String>,
    current: Option<Uuid>,
) -> Result<Option<Uuid>, ApiError> {
    if kind != SectionType::Category {
        return Ok(None);
    }
    match non_blank(submitted) {
        Some(raw) => Ok(Some(resolve_category(store, &raw).await?)),
        None => current.map(Some).ok_or_else(|| {
            ApiError::bad_request("Category is required for category type sections")
        }),
    }
}

/// Blog filter for a section, or `None` when it can match nothing.
pub fn blog_query(section: &Section) -> Option<BlogQuery> {
    let mut query = BlogQuery {
        limit: Some(i64::from(section.limit)),
        ..BlogQuery::published()
    };
    match section.section_type {
        SectionType::Latest => {}
        SectionType::Featured => query.featured = Some(true),
        SectionType::Category => query.category = Some(section.category?),
        SectionType::Custom => {
            let custom = &section.custom_query;
            query.featured = custom.featured;
            query.category = custom.category;
            query.tag = custom.tag.clone();
        }
    }
    Some(query)
}

async fn with_blogs(store: &dyn EntityStore, section: Section) -> Result<SectionWithBlogs, ApiError> {
    let blogs = match blog_query(&section) {
        Some(query) => store.list_blogs(&query).await?,
        None => Vec::new(),
    };
    Ok(SectionWithBlogs { section, blogs })
}

async fn find(store: &dyn EntityStore, raw: &str) -> Result<Section, ApiError> {
    let id = path_id(raw, "section")?;
    store
        .get_section(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Section not found"))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/sections
pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let sections = store.list_sections(true).await?;
    let sections = try_join_all(sections.into_iter().map(|s| with_blogs(store, s))).await?;
    Ok(Json(sections))
}

/// GET /api/sections/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(find(state.store.as_ref(), &id).await?))
}

/// POST /api/sections
pub async fn create(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<SectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let title = non_blank(payload.title);
    let kind = parse_type(payload.section_type)?;

    let (title, kind) = match (title, kind) {
        (Some(title), Some(kind)) => (title, kind),
        (title, kind) => {
            return Err(ApiError::validation(
                "Missing required fields",
                json!({
                    "title": title.is_none().then_some("Title is required"),
                    "type": kind.is_none().then_some("Type is required"),
                }),
            ))
        }
    };

    let limit = payload.limit.map(check_limit).transpose()?.unwrap_or(DEFAULT_LIMIT);
    let display_style = parse_style(payload.display_style)?.unwrap_or_default();
    let custom_query = match (kind, payload.custom_query) {
        (SectionType::Custom, Some(raw)) => parse_custom_query(raw)?,
        _ => CustomQuery::default(),
    };
    let category = category_for(store, kind, payload.category, None).await?;

    let now = Utc::now();
    let section = store
        .insert_section(&Section {
            id: Uuid::new_v4(),
            title,
            description: non_blank(payload.description),
            section_type: kind,
            category,
            limit,
            order: payload.order.unwrap_or(0),
            is_active: payload.is_active.unwrap_or(true),
            display_style,
            custom_query,
            created_at: now,
            updated_at: now,
        })
        .await?;

    tracing::info!("Section created: {} ({})", section.title, section.id);
    Ok((StatusCode::CREATED, Json(section)))
}

/// PUT /api/sections/{id}
pub async fn update(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<SectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let current = find(store, &id).await?;

    let kind = parse_type(payload.section_type)?.unwrap_or(current.section_type);
    let limit = payload.limit.map(check_limit).transpose()?.unwrap_or(current.limit);
    let display_style = parse_style(payload.display_style)?.unwrap_or(current.display_style);
    let custom_query = match (kind, payload.custom_query) {
        (SectionType::Custom, Some(raw)) => parse_custom_query(raw)?,
        (SectionType::Custom, None) => current.custom_query.clone(),
        _ => CustomQuery::default(),
    };
    let category = category_for(store, kind, payload.category, current.category).await?;

    let section = store
        .update_section(&Section {
            title: non_blank(payload.title).unwrap_or_else(|| current.title.clone()),
            description: non_blank(payload.description).or(current.description.clone()),
            section_type: kind,
            category,
            limit,
            order: payload.order.unwrap_or(current.order),
            is_active: payload.is_active.unwrap_or(current.is_active),
            display_style,
            custom_query,
            updated_at: Utc::now(),
            ..current
        })
        .await?;

    tracing::info!("Section updated: {} ({})", section.title, section.id);
    Ok(Json(section))
}

/// DELETE /api/sections/{id}
pub async fn delete(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let section = find(store, &id).await?;
    store.delete_section(section.id).await?;
    tracing::info!("Section deleted: {} ({})", section.title, section.id);
    Ok(Json(json!({ "message": "Section deleted successfully" })))
}

/// PATCH /api/sections/{id}/toggle
pub async fn toggle(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let current = find(store, &id).await?;
    let section = store
        .update_section(&Section {
            is_active: !current.is_active,
            updated_at: Utc::now(),
            ..current
        })
        .await?;

    let verb = if section.is_active { "activated" } else { "deactivated" };
    Ok(Json(json!({
        "message": format!("Section {verb} successfully"),
        "section": section,
    })))
}

/// POST|PUT /api/sections/reorder
pub async fn reorder(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    apply_reorder(store, OrderedKind::Section, &body).await?;
    Ok(Json(store.list_sections(false).await?))
}
