/**
 * Project Routes
 * Portfolio projects with a main image and a growing image gallery
 */
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::{path_id, ItemResponse, ListResponse};
use crate::auth::AdminUser;
use crate::db::models::Project;
use crate::error::ApiError;
use crate::state::AppState;
use crate::workflow::{project as workflow, MultipartForm};

async fn find(state: &AppState, raw: &str) -> Result<Project, ApiError> {
    let id = path_id(raw, "project")?;
    state
        .store
        .get_project(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))
}

/// GET /api/projects
pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let projects = state.store.list_projects(None).await?;
    Ok(Json(ListResponse::new(projects)))
}

/// GET /api/projects/category/{id}
pub async fn by_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(&id, "category")?;
    let projects = state.store.list_projects(Some(id)).await?;
    Ok(Json(ListResponse::new(projects)))
}

/// POST /api/projects
pub async fn create(
    State(state): State<AppState>,
    _admin: AdminUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = MultipartForm::read(multipart).await?;
    let project = workflow::create(&state, form).await?;
    Ok((
        StatusCode::CREATED,
        Json(ItemResponse::new("Project created successfully", project)),
    ))
}

/// PUT /api/projects/{id}
pub async fn update(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let current = find(&state, &id).await?;
    let form = MultipartForm::read(multipart).await?;
    let project = workflow::update(&state, current, form).await?;
    Ok(Json(ItemResponse::new("Project updated successfully", project)))
}

/// DELETE /api/projects/{id}
pub async fn delete(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let project = find(&state, &id).await?;
    workflow::delete(&state, project).await?;
    Ok(Json(ItemResponse::message("Project deleted successfully")))
}
