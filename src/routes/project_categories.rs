/**
 * Project Category Routes
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::{non_blank, path_id, ItemResponse, ListResponse};
use crate::auth::AdminUser;
use crate::db::models::ProjectCategory;
use crate::error::ApiError;
use crate::slug::slugify;
use crate::state::AppState;
use crate::store::EntityStore;

#[derive(Debug, Default, Deserialize)]
pub struct ProjectCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

async fn ensure_name_free(
    store: &dyn EntityStore,
    name: &str,
    except: Option<Uuid>,
) -> Result<(), ApiError> {
    match store.find_project_category_by_name(name).await? {
        Some(existing) if Some(existing.id) != except => Err(ApiError::Conflict(
            "Project category with this name already exists".to_string(),
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

async fn find(store: &dyn EntityStore, raw: &str) -> Result<ProjectCategory, ApiError> {
    let id = path_id(raw, "category")?;
    store
        .get_project_category(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))
}

/// GET /api/project-categories
pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let categories = state.store.list_project_categories().await?;
    Ok(Json(ListResponse::new(categories)))
}

/// POST /api/project-categories
pub async fn create(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<ProjectCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let name = non_blank(payload.name)
        .ok_or_else(|| ApiError::bad_request("Category name is required"))?;
    let slug = slug_for(&name)?;
    ensure_name_free(store, &name, None).await?;

    let now = Utc::now();
    let category = store
        .insert_project_category(&ProjectCategory {
            id: Uuid::new_v4(),
            name,
            slug,
            description: non_blank(payload.description),
            created_at: now,
            updated_at: now,
        })
        .await?;

    tracing::info!("Project category created: {} ({})", category.slug, category.id);
    Ok((
        StatusCode::CREATED,
        Json(ItemResponse::new("Category created successfully", category)),
    ))
}

/// PUT /api/project-categories/{id}
pub async fn update(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<ProjectCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let current = find(store, &id).await?;

    let (name, slug) = match non_blank(payload.name) {
        Some(name) if name != current.name => {
            ensure_name_free(store, &name, Some(current.id)).await?;
            let slug = slug_for(&name)?;
            (name, slug)
        }
        _ => (current.name.clone(), current.slug.clone()),
    };

    let category = store
        .update_project_category(&ProjectCategory {
            name,
            slug,
            description: non_blank(payload.description).or(current.description.clone()),
            updated_at: Utc::now(),
            ..current
        })
        .await?;

    Ok(Json(ItemResponse::new("Category updated successfully", category)))
}

/// DELETE /api/project-categories/{id}
/// Refused by the store while projects still use the category.
pub async fn delete(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let category = find(store, &id).await?;
    store.delete_project_category(category.id).await?;
    tracing::info!("Project category deleted: {} ({})", category.slug, category.id);
    Ok(Json(ItemResponse::message("Category deleted successfully")))
}
