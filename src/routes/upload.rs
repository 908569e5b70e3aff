/**
 * Upload Routes
 * Standalone image upload for the blog editor
 */
use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::media::{check_object_path, upload_all, MediaPrefix};
use crate::state::AppState;
use crate::workflow::MultipartForm;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub url: String,
    pub filename: String,
    pub content_type: &'static str,
    pub size: usize,
}

/// Object name without its prefix folder.
fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// POST /api/upload
pub async fn upload_image(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    user.require_author()?;
    let form = MultipartForm::read(multipart).await?;
    let part = form
        .file("image")
        .ok_or_else(|| ApiError::bad_request("No image file provided"))?;
    let upload = part.validate(&state.config.upload)?;
    let (content_type, size) = (upload.content_type, upload.size());

    let stored = upload_all(
        state.media.as_ref(),
        &state.cleanup,
        vec![(MediaPrefix::BlogImages, upload)],
    )
    .await?
    .into_iter()
    .next()
    .ok_or_else(|| ApiError::Internal("upload returned no object".to_string()))?;

    tracing::info!("Image uploaded: {} ({} bytes)", stored.path, size);
    Ok(Json(UploadResponse {
        filename: file_name_of(&stored.path).to_string(),
        url: stored.url,
        content_type,
        size,
    }))
}

/// DELETE /api/upload/{filename}
pub async fn delete_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_author()?;
    if filename.contains('/') {
        return Err(ApiError::bad_request("Invalid filename"));
    }
    let path = format!("{}/{}", MediaPrefix::BlogImages.as_str(), filename);
    check_object_path(&path)?;

    if !state.media.exists(&path).await? {
        return Err(ApiError::not_found("Image not found"));
    }
    state.media.remove(&path).await?;

    tracing::info!("Image deleted: {}", path);
    Ok(Json(json!({ "message": "Image deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_of_strips_prefix_folders() {
        assert_eq!(file_name_of("blog_images/2024__a.png"), "2024__a.png");
        assert_eq!(file_name_of("projects/main/x.png"), "x.png");
        assert_eq!(file_name_of("plain.png"), "plain.png");
    }
}
