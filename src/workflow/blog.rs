//! Blog authoring: validated create, partial update and delete.
//!
//! Every decode and lookup runs before any media is uploaded, and the store
//! write is the last step, so a rejected request leaves nothing behind.

use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

use super::form::MultipartForm;
use super::json_field::{decode_meta, decode_sections, decode_tags, merge_meta, SectionInput};
use crate::db::models::{Blog, BlogSection, Status};
use crate::error::ApiError;
use crate::media::{upload_all, MediaPrefix, Upload};
use crate::slug::slugify;
use crate::state::AppState;
use crate::store::EntityStore;

const REQUIRED_FIELDS: [(&str, &str); 5] = [
    ("title", "Title is required"),
    ("description", "Description is required"),
    ("category", "Category is required"),
    ("meta", "Meta information is required"),
    ("section", "Section is required"),
];

/// A field already checked by the required-fields pass.
fn required<'a>(form: &'a MultipartForm, name: &str) -> &'a str {
    form.text(name).unwrap_or_default()
}

async fn resolve_category(store: &dyn EntityStore, raw: &str) -> Result<Uuid, ApiError> {
    let invalid = || ApiError::bad_request("Invalid category ID");
    let id = Uuid::parse_str(raw.trim()).map_err(|_| invalid())?;
    store.get_category(id).await?.ok_or_else(invalid)?;
    Ok(id)
}

async fn resolve_section(store: &dyn EntityStore, raw: &str) -> Result<Uuid, ApiError> {
    let invalid = || ApiError::bad_request("Invalid section ID");
    let id = Uuid::parse_str(raw.trim()).map_err(|_| invalid())?;
    store.get_section(id).await?.ok_or_else(invalid)?;
    Ok(id)
}

fn parse_status(raw: &str) -> Result<Status, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::bad_request("Status must be either draft or published"))
}

fn slug_for(title: &str) -> Result<String, ApiError> {
    let slug = slugify(title);
    if slug.is_empty() {
        return Err(ApiError::bad_request(
            "Title must contain at least one letter or digit",
        ));
    }
    Ok(slug)
}

/// Images staged for one write: the optional main image and section images
/// keyed by the position of the section they belong to.
struct StagedImages {
    main: Option<Upload>,
    sections: Vec<(usize, Upload)>,
}

impl StagedImages {
    fn collect(state: &AppState, form: &MultipartForm, section_count: usize) -> Result<Self, ApiError> {
        let config = &state.config.upload;
        let main = form
            .file("mainImage")
            .map(|part| part.validate(config))
            .transpose()?;
        let sections = form
            .files("section_images")
            .into_iter()
            .take(section_count)
            .enumerate()
            .map(|(i, part)| part.validate(config).map(|upload| (i, upload)))
            .collect::<Result<Vec<_>, ApiError>>()?;
        Ok(Self { main, sections })
    }

    async fn upload(self, state: &AppState) -> Result<UploadedImages, ApiError> {
        let has_main = self.main.is_some();
        let positions: Vec<usize> = self.sections.iter().map(|(i, _)| *i).collect();

        let batch = self
            .main
            .into_iter()
            .map(|u| (MediaPrefix::BlogImages, u))
            .chain(self.sections.into_iter().map(|(_, u)| (MediaPrefix::BlogImages, u)))
            .collect::<Vec<_>>();
        if batch.is_empty() {
            return Ok(UploadedImages::default());
        }

        let mut stored = upload_all(state.media.as_ref(), &state.cleanup, batch)
            .await?
            .into_iter()
            .map(|o| o.url);
        let main = if has_main { stored.next() } else { None };
        let sections = positions.into_iter().zip(stored).collect();
        Ok(UploadedImages { main, sections })
    }
}

#[derive(Default)]
struct UploadedImages {
    main: Option<String>,
    sections: HashMap<usize, String>,
}

impl UploadedImages {
    fn urls(&self) -> Vec<String> {
        self.main
            .iter()
            .chain(self.sections.values())
            .cloned()
            .collect()
    }
}

/// Positions are reassigned `0..n`; an uploaded file replaces the submitted URL.
fn build_sections(inputs: Vec<SectionInput>, uploaded: &HashMap<usize, String>) -> Vec<BlogSection> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| BlogSection {
            section_img: uploaded
                .get(&i)
                .cloned()
                .or(input.section_img.filter(|url| !url.trim().is_empty())),
            section_title: input.section_title,
            section_description: ammonia::clean(&input.section_description.unwrap_or_default()),
            section_list: input.section_list.unwrap_or_default(),
            order: i as i32,
        })
        .collect()
}

pub async fn create(state: &AppState, author: Uuid, form: MultipartForm) -> Result<Blog, ApiError> {
    let store = state.store.as_ref();

    let missing: Vec<_> = REQUIRED_FIELDS
        .iter()
        .filter(|(field, _)| form.text(field).is_none())
        .collect();
    if !missing.is_empty() {
        let details: serde_json::Map<_, _> = REQUIRED_FIELDS
            .iter()
            .map(|(field, message)| {
                let value = if form.text(field).is_none() {
                    json!(message)
                } else {
                    serde_json::Value::Null
                };
                (field.to_string(), value)
            })
            .collect();
        return Err(ApiError::validation("Missing required fields", details.into()));
    }

    let meta = decode_meta(required(&form, "meta"))?;
    let category = resolve_category(store, required(&form, "category")).await?;
    let section = resolve_section(store, required(&form, "section")).await?;
    let sections = form.text("sections").map(decode_sections).transpose()?.unwrap_or_default();
    let tags = form.text("tags").map(decode_tags).transpose()?.unwrap_or_default();
    let status = form.text("status").map(parse_status).transpose()?.unwrap_or(Status::Draft);
    let title = required(&form, "title").trim().to_string();
    let slug = slug_for(&title)?;

    let staged = StagedImages::collect(state, &form, sections.len())?;
    let uploaded = staged.upload(state).await?;

    let now = Utc::now();
    let blog = Blog {
        id: Uuid::new_v4(),
        title,
        slug,
        description: ammonia::clean(required(&form, "description")),
        main_image: uploaded.main.clone().unwrap_or_default(),
        tags,
        category,
        section,
        featured: form.text("featured") == Some("true"),
        status,
        sections: build_sections(sections, &uploaded.sections),
        meta,
        author,
        created_at: now,
        updated_at: now,
    };

    match store.insert_blog(&blog).await {
        Ok(blog) => {
            tracing::info!("Blog created: {} ({})", blog.slug, blog.id);
            Ok(blog)
        }
        Err(e) => {
            state.cleanup.schedule_all(uploaded.urls());
            Err(e.into())
        }
    }
}

pub async fn update(state: &AppState, current: Blog, form: MultipartForm) -> Result<Blog, ApiError> {
    let store = state.store.as_ref();

    let category = match form.text("category") {
        Some(raw) => resolve_category(store, raw).await?,
        None => current.category,
    };
    let section = match form.text("section") {
        Some(raw) => resolve_section(store, raw).await?,
        None => current.section,
    };
    let sections = form.text("sections").map(decode_sections).transpose()?;
    let tags = form.text("tags").map(decode_tags).transpose()?;
    let meta = form
        .text("meta")
        .map(|raw| merge_meta(raw, &current.meta))
        .transpose()?;
    let status = form.text("status").map(parse_status).transpose()?;

    let (title, slug) = match form.text("title").map(str::trim) {
        Some(title) if title != current.title => (title.to_string(), slug_for(title)?),
        _ => (current.title.clone(), current.slug.clone()),
    };

    let staged = StagedImages::collect(
        state,
        &form,
        sections.as_ref().map(Vec::len).unwrap_or(0),
    )?;
    let uploaded = staged.upload(state).await?;

    let blog = Blog {
        title,
        slug,
        description: form
            .text("description")
            .map(ammonia::clean)
            .unwrap_or_else(|| current.description.clone()),
        main_image: uploaded
            .main
            .clone()
            .unwrap_or_else(|| current.main_image.clone()),
        tags: tags.unwrap_or_else(|| current.tags.clone()),
        category,
        section,
        featured: form
            .text("featured")
            .map(|v| v == "true")
            .unwrap_or(current.featured),
        status: status.unwrap_or(current.status),
        sections: match sections {
            Some(inputs) => build_sections(inputs, &uploaded.sections),
            None => current.sections.clone(),
        },
        meta: meta.unwrap_or_else(|| current.meta.clone()),
        updated_at: Utc::now(),
        ..current.clone()
    };

    match store.update_blog(&blog).await {
        Ok(updated) => {
            let kept = updated.image_urls();
            state
                .cleanup
                .schedule_all(current.image_urls().into_iter().filter(|url| !kept.contains(url)));
            tracing::info!("Blog updated: {} ({})", updated.slug, updated.id);
            Ok(updated)
        }
        Err(e) => {
            state.cleanup.schedule_all(uploaded.urls());
            Err(e.into())
        }
    }
}

pub async fn delete(state: &AppState, blog: Blog) -> Result<(), ApiError> {
    state.store.delete_blog(blog.id).await?;
    state.cleanup.schedule_all(blog.image_urls());
    tracing::info!("Blog deleted: {} ({})", blog.slug, blog.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_sections_assigns_positions_and_prefers_uploads() {
        let inputs = vec![
            SectionInput {
                section_img: Some("https://old/a.png".to_string()),
                ..SectionInput::default()
            },
            SectionInput {
                section_img: Some("https://old/b.png".to_string()),
                section_description: Some("<script>x</script><b>ok</b>".to_string()),
                ..SectionInput::default()
            },
            SectionInput::default(),
        ];
        let uploaded = HashMap::from([(1, "memory://new.png".to_string())]);
        let sections = build_sections(inputs, &uploaded);

        let orders: Vec<i32> = sections.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(sections[0].section_img.as_deref(), Some("https://old/a.png"));
        assert_eq!(sections[1].section_img.as_deref(), Some("memory://new.png"));
        assert_eq!(sections[1].section_description, "<b>ok</b>");
        assert_eq!(sections[2].section_img, None);
    }

    #[test]
    fn test_slug_for_rejects_symbol_only_titles() {
        assert_eq!(slug_for("Hello, World").unwrap(), "hello-world");
        assert!(slug_for("!!!").is_err());
    }
}
