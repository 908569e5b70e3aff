/**
 * Category Routes
 * Public listing plus admin create, update, delete and reorder
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{non_blank, path_id, path_slug};
use crate::auth::AdminUser;
use crate::db::models::{BlogQuery, Category, Status};
use crate::error::ApiError;
use crate::slug::slugify;
use crate::state::AppState;
use crate::store::{EntityStore, OrderedKind};
use crate::workflow::reorder::apply as apply_reorder;

#[derive(Debug, Default, Deserialize)]
pub struct CategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub order: Option<i32>,
}

fn parse_status(raw: Option<String>) -> Result<Option<Status>, ApiError> {
    non_blank(raw)
        .map(|s| {
            s.parse()
                .map_err(|_| ApiError::bad_request("Status must be either draft or published"))
        })
        .transpose()
}

/// Reject a name another category already uses, ignoring case.
async fn ensure_name_free(
    store: &dyn EntityStore,
    name: &str,
    except: Option<Uuid>,
) -> Result<(), ApiError> {
    match store.find_category_by_name(name).await? {
        Some(existing) if Some(existing.id) != except => Err(ApiError::Conflict(
            "Category with this name already exists".to_string(),
        )),
        _ => Ok(()),
    }
}

fn slug_for(name: &str) -> Result<String, ApiError> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(ApiError::bad_request(
            "Category name must contain at least one letter or digit",
        ));
    }
    Ok(slug)
}

async fn find(store: &dyn EntityStore, id: Uuid) -> Result<Category, ApiError> {
    store
        .get_category(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))
}

/// GET /api/categories
pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let categories = state.store.list_categories(Some(Status::Published)).await?;
    Ok(Json(categories))
}

/// GET /api/categories/{idOrSlug}
/// `blogCount` here counts published posts only.
pub async fn get(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let category = match Uuid::parse_str(&key) {
        Ok(id) => store.get_category(id).await?,
        Err(_) => store.find_category_by_slug(path_slug(&key)?).await?,
    };
    let mut category = category.ok_or_else(|| ApiError::not_found("Category not found"))?;

    category.blog_count = store
        .count_blogs(&BlogQuery {
            category: Some(category.id),
            ..BlogQuery::published()
        })
        .await?;
    Ok(Json(category))
}

/// POST /api/categories
pub async fn create(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<CategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let name = non_blank(payload.name)
        .ok_or_else(|| ApiError::bad_request("Category name is required"))?;
    let status = parse_status(payload.status)?.unwrap_or_default();
    let slug = slug_for(&name)?;
    ensure_name_free(store, &name, None).await?;

    let now = Utc::now();
    let category = store
        .insert_category(&Category {
            id: Uuid::new_v4(),
            name,
            slug,
            description: non_blank(payload.description),
            blog_count: 0,
            status,
            order: payload.order.unwrap_or(0),
            created_at: now,
            updated_at: now,
        })
        .await?;

    tracing::info!("Category created: {} ({})", category.slug, category.id);
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/categories/{id}
pub async fn update(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<CategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let id = path_id(&id, "category")?;
    let current = find(store, id).await?;
    let status = parse_status(payload.status)?;

    let (name, slug) = match non_blank(payload.name) {
        Some(name) if name != current.name => {
            ensure_name_free(store, &name, Some(id)).await?;
            let slug = slug_for(&name)?;
            (name, slug)
        }
        _ => (current.name.clone(), current.slug.clone()),
    };

    let category = store
        .update_category(&Category {
            name,
            slug,
            description: non_blank(payload.description).or(current.description.clone()),
            status: status.unwrap_or(current.status),
            order: payload.order.unwrap_or(current.order),
            updated_at: Utc::now(),
            ..current
        })
        .await?;

    tracing::info!("Category updated: {} ({})", category.slug, category.id);
    Ok(Json(category))
}

/// DELETE /api/categories/{id}
pub async fn delete(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let id = path_id(&id, "category")?;
    let category = find(store, id).await?;

    if category.blog_count > 0 {
        return Err(ApiError::bad_request(
            "Cannot delete category with existing blog posts",
        ));
    }

    store.delete_category(id).await?;
    tracing::info!("Category deleted: {} ({})", category.slug, category.id);
    Ok(Json(json!({ "message": "Category deleted successfully" })))
}

/// POST|PUT /api/categories/reorder
pub async fn reorder(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    apply_reorder(store, OrderedKind::Category, &body).await?;
    Ok(Json(store.list_categories(None).await?))
}
