//! Project authoring. Same shape as the blog workflow: validate, upload,
//! then write, with cleanup on either side of the store call.

use chrono::Utc;
use uuid::Uuid;

use super::form::MultipartForm;
use crate::db::models::Project;
use crate::error::ApiError;
use crate::media::{upload_all, MediaPrefix, Upload};
use crate::state::AppState;
use crate::store::EntityStore;

async fn resolve_category(store: &dyn EntityStore, raw: &str) -> Result<Uuid, ApiError> {
    let invalid = || ApiError::bad_request("Invalid category ID");
    let id = Uuid::parse_str(raw.trim()).map_err(|_| invalid())?;
    store.get_project_category(id).await?.ok_or_else(invalid)?;
    Ok(id)
}

fn image_urls(project: &Project) -> Vec<String> {
    std::iter::once(&project.main_image)
        .chain(project.additional_images.iter())
        .filter(|url| !url.is_empty())
        .cloned()
        .collect()
}

struct Uploaded {
    main: Option<String>,
    additional: Vec<String>,
}

impl Uploaded {
    fn urls(&self) -> Vec<String> {
        self.main.iter().chain(self.additional.iter()).cloned().collect()
    }
}

fn collect(state: &AppState, form: &MultipartForm) -> Result<(Option<Upload>, Vec<Upload>), ApiError> {
    let config = &state.config.upload;
    let main = form
        .file("mainImage")
        .map(|part| part.validate(config))
        .transpose()?;
    let additional = form
        .files("additionalImages")
        .into_iter()
        .map(|part| part.validate(config))
        .collect::<Result<Vec<_>, ApiError>>()?;
    Ok((main, additional))
}

async fn upload(
    state: &AppState,
    main: Option<Upload>,
    additional: Vec<Upload>,
) -> Result<Uploaded, ApiError> {
    let has_main = main.is_some();
    let batch: Vec<_> = main
        .into_iter()
        .map(|u| (MediaPrefix::ProjectMain, u))
        .chain(additional.into_iter().map(|u| (MediaPrefix::ProjectAdditional, u)))
        .collect();
    if batch.is_empty() {
        return Ok(Uploaded {
            main: None,
            additional: Vec::new(),
        });
    }

    let mut urls = upload_all(state.media.as_ref(), &state.cleanup, batch)
        .await?
        .into_iter()
        .map(|o| o.url);
    let main = if has_main { urls.next() } else { None };
    Ok(Uploaded {
        main,
        additional: urls.collect(),
    })
}

pub async fn create(state: &AppState, form: MultipartForm) -> Result<Project, ApiError> {
    let store = state.store.as_ref();
    let (Some(title), Some(description), Some(category)) = (
        form.text("title"),
        form.text("description"),
        form.text("category"),
    ) else {
        return Err(ApiError::bad_request(
            "Title, description, and category are required",
        ));
    };

    let category = resolve_category(store, category).await?;
    let (main, additional) = collect(state, &form)?;
    let Some(main) = main else {
        return Err(ApiError::bad_request("Main image is required"));
    };
    let uploaded = upload(state, Some(main), additional).await?;

    let now = Utc::now();
    let project = Project {
        id: Uuid::new_v4(),
        title: title.trim().to_string(),
        main_image: uploaded.main.clone().unwrap_or_default(),
        additional_images: uploaded.additional.clone(),
        category,
        description: ammonia::clean(description),
        created_at: now,
        updated_at: now,
    };

    match store.insert_project(&project).await {
        Ok(project) => {
            tracing::info!("Project created: {} ({})", project.title, project.id);
            Ok(project)
        }
        Err(e) => {
            state.cleanup.schedule_all(uploaded.urls());
            Err(e.into())
        }
    }
}

/// Partial update. A new main image replaces the old one; additional images
/// are appended to the existing list.
pub async fn update(state: &AppState, current: Project, form: MultipartForm) -> Result<Project, ApiError> {
    let store = state.store.as_ref();
    let category = match form.text("category") {
        Some(raw) => resolve_category(store, raw).await?,
        None => current.category,
    };
    let (main, additional) = collect(state, &form)?;
    let uploaded = upload(state, main, additional).await?;

    let mut additional_images = current.additional_images.clone();
    additional_images.extend(uploaded.additional.iter().cloned());

    let project = Project {
        title: form
            .text("title")
            .map(|t| t.trim().to_string())
            .unwrap_or_else(|| current.title.clone()),
        description: form
            .text("description")
            .map(ammonia::clean)
            .unwrap_or_else(|| current.description.clone()),
        main_image: uploaded
            .main
            .clone()
            .unwrap_or_else(|| current.main_image.clone()),
        additional_images,
        category,
        updated_at: Utc::now(),
        ..current.clone()
    };

    match store.update_project(&project).await {
        Ok(updated) => {
            if updated.main_image != current.main_image {
                state.cleanup.schedule(current.main_image.clone());
            }
            tracing::info!("Project updated: {} ({})", updated.title, updated.id);
            Ok(updated)
        }
        Err(e) => {
            state.cleanup.schedule_all(uploaded.urls());
            Err(e.into())
        }
    }
}

pub async fn delete(state: &AppState, project: Project) -> Result<(), ApiError> {
    state.store.delete_project(project.id).await?;
    state.cleanup.schedule_all(image_urls(&project));
    tracing::info!("Project deleted: {} ({})", project.title, project.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_urls_lists_main_then_additional() {
        let project = Project {
            id: Uuid::new_v4(),
            title: "Bridge".to_string(),
            main_image: "https://cdn/main.png".to_string(),
            additional_images: vec!["https://cdn/a.png".to_string(), String::new()],
            category: Uuid::new_v4(),
            description: "d".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(
            image_urls(&project),
            vec!["https://cdn/main.png", "https://cdn/a.png"]
        );
    }
}
