/**
 * Blog Routes
 * Public reads plus authoring endpoints for blog posts
 */
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use super::{path_id, path_slug, PageParams};
use crate::auth::AuthUser;
use crate::db::models::{Blog, BlogMeta, BlogQuery, BlogSection, Category, Status, User};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::EntityStore;
use crate::workflow::{blog as workflow, MultipartForm};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Minimal category reference embedded in grouped listings
#[derive(Debug, Serialize)]
pub struct CategorySummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

impl From<&Category> for CategorySummary {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            slug: category.slug.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: CategorySummary,
    pub blog_count: i64,
}

#[derive(Debug, Serialize)]
pub struct CategoryBlogs {
    pub category: CategorySummary,
    pub blogs: Vec<Blog>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryIdsRequest {
    #[serde(default)]
    pub category_ids: Option<Vec<Value>>,
}

#[derive(Debug, Serialize)]
pub struct AuthorSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Blog as returned by the public reads: category and author resolved,
/// `null` when the referenced record is gone.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedBlog {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub main_image: String,
    pub tags: Vec<String>,
    pub category: Option<CategorySummary>,
    pub section: Uuid,
    pub featured: bool,
    pub status: Status,
    pub sections: Vec<BlogSection>,
    pub meta: BlogMeta,
    pub author: Option<AuthorSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PopulatedBlog {
    fn new(blog: Blog, category: Option<&Category>, author: Option<&User>) -> Self {
        Self {
            id: blog.id,
            title: blog.title,
            slug: blog.slug,
            description: blog.description,
            main_image: blog.main_image,
            tags: blog.tags,
            category: category.map(CategorySummary::from),
            section: blog.section,
            featured: blog.featured,
            status: blog.status,
            sections: blog.sections,
            meta: blog.meta,
            author: author.map(AuthorSummary::from),
            created_at: blog.created_at,
            updated_at: blog.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BlogResponse<B: Serialize = Blog> {
    pub message: &'static str,
    pub blog: B,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn not_found() -> ApiError {
    ApiError::not_found("Blog post not found")
}

async fn find_by_id(store: &dyn EntityStore, raw: &str) -> Result<Blog, ApiError> {
    let id = path_id(raw, "blog")?;
    store.get_blog(id).await?.ok_or_else(not_found)
}

async fn find_by_slug(store: &dyn EntityStore, slug: &str) -> Result<Blog, ApiError> {
    store
        .find_blog_by_slug(path_slug(slug)?)
        .await?
        .ok_or_else(not_found)
}

/// Resolve category and author of every blog: one category listing plus one
/// user lookup per distinct author.
async fn populate(store: &dyn EntityStore, blogs: Vec<Blog>) -> Result<Vec<PopulatedBlog>, ApiError> {
    let categories: HashMap<Uuid, Category> = store
        .list_categories(None)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let mut author_ids: Vec<Uuid> = Vec::new();
    for blog in &blogs {
        if !author_ids.contains(&blog.author) {
            author_ids.push(blog.author);
        }
    }
    let lookups = author_ids.into_iter().map(|id| store.get_user(id));
    let authors: HashMap<Uuid, User> = try_join_all(lookups)
        .await?
        .into_iter()
        .flatten()
        .map(|u| (u.id, u))
        .collect();

    Ok(blogs
        .into_iter()
        .map(|blog| {
            let category = categories.get(&blog.category);
            let author = authors.get(&blog.author);
            PopulatedBlog::new(blog, category, author)
        })
        .collect())
}

/// Published posts of one category, one page at a time.
async fn category_page(
    store: &dyn EntityStore,
    category: Uuid,
    params: &PageParams,
) -> Result<(Vec<Blog>, i64), ApiError> {
    let query = BlogQuery {
        category: Some(category),
        ..BlogQuery::published()
    };
    let total = store.count_blogs(&query).await?;
    let blogs = store
        .list_blogs(&BlogQuery {
            limit: Some(params.limit()),
            offset: params.offset(),
            ..query
        })
        .await?;
    Ok((blogs, total))
}

// ============================================================================
// Public handlers
// ============================================================================

/// GET /api/blog
pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let blogs = store.list_blogs(&BlogQuery::default()).await?;
    Ok(Json(populate(store, blogs).await?))
}

/// GET /api/blog/slug/{slug}
pub async fn get_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let blog = find_by_slug(store, &slug).await?;
    let blog = populate(store, vec![blog])
        .await?
        .pop()
        .ok_or_else(not_found)?;
    Ok(Json(BlogResponse {
        message: "Blog post retrieved successfully",
        blog,
    }))
}

/// GET /api/blog/category/{slug}
pub async fn by_category_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let category = store
        .find_category_by_slug(path_slug(&slug)?)
        .await?
        .filter(|c| c.status == Status::Published)
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    let (blogs, total) = category_page(store, category.id, &params).await?;
    Ok(Json(json!({
        "blogs": blogs,
        "pagination": params.pagination(total),
        "category": {
            "name": category.name,
            "slug": category.slug,
            "description": category.description,
            "blogCount": total,
        },
    })))
}

/// GET /api/blog/category/id/{id}
pub async fn by_category_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let id = path_id(&id, "category")?;
    let category = store
        .get_category(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    let (blogs, total) = category_page(store, category.id, &params).await?;
    Ok(Json(json!({
        "blogs": blogs,
        "pagination": params.pagination(total),
        "category": {
            "name": category.name,
            "slug": category.slug,
            "description": category.description,
        },
    })))
}

/// GET /api/blog/section/{id}
pub async fn by_section(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let id = path_id(&id, "section")?;
    let section = store
        .get_section(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Section not found"))?;

    let blogs = store
        .list_blogs(&BlogQuery {
            section: Some(section.id),
            ..BlogQuery::published()
        })
        .await?;
    Ok(Json(json!({
        "section": { "_id": section.id, "title": section.title, "order": section.order },
        "blogs": blogs,
    })))
}

/// GET /api/blog/category-counts
pub async fn category_counts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let categories = store
        .list_categories(Some(Status::Published))
        .await?;

    let counts = try_join_all(categories.iter().map(|category| async move {
        let blog_count = store
            .count_blogs(&BlogQuery {
                category: Some(category.id),
                ..BlogQuery::published()
            })
            .await?;
        Ok::<_, ApiError>(CategoryCount {
            category: category.into(),
            blog_count,
        })
    }))
    .await?;
    Ok(Json(counts))
}

/// POST /api/blog/categories
/// Published posts grouped by each requested category. Ids that are not
/// UUIDs are ignored; unknown categories are left out.
pub async fn by_categories(
    State(state): State<AppState>,
    Json(payload): Json<CategoryIdsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let requested = payload
        .category_ids
        .filter(|ids| !ids.is_empty())
        .ok_or_else(|| ApiError::bad_request("Please provide an array of category IDs"))?;

    let mut ids: Vec<Uuid> = Vec::new();
    for id in requested.iter().filter_map(Value::as_str) {
        match Uuid::parse_str(id) {
            Ok(id) if !ids.contains(&id) => ids.push(id),
            _ => {}
        }
    }
    if ids.is_empty() {
        return Err(ApiError::bad_request("No valid category IDs provided"));
    }

    let blogs = store
        .list_blogs(&BlogQuery {
            categories: Some(ids.clone()),
            ..BlogQuery::published()
        })
        .await?;

    let mut groups = Vec::new();
    for id in ids {
        if let Some(category) = store.get_category(id).await? {
            groups.push(CategoryBlogs {
                category: (&category).into(),
                blogs: blogs.iter().filter(|b| b.category == id).cloned().collect(),
            });
        }
    }
    Ok(Json(groups))
}

// ============================================================================
// Authoring handlers
// ============================================================================

/// POST /api/blog
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    user.require_author()?;
    let form = MultipartForm::read(multipart).await?;
    let blog = workflow::create(&state, user.id, form).await?;
    Ok((
        StatusCode::CREATED,
        Json(BlogResponse {
            message: "Blog post created successfully",
            blog,
        }),
    ))
}

/// PUT /api/blog/{id}
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    user.require_author()?;
    let current = find_by_id(state.store.as_ref(), &id).await?;
    let form = MultipartForm::read(multipart).await?;
    let blog = workflow::update(&state, current, form).await?;
    Ok(Json(BlogResponse {
        message: "Blog post updated successfully",
        blog,
    }))
}

/// PUT /api/blog/slug/{slug}
pub async fn update_by_slug(
    State(state): State<AppState>,
    user: AuthUser,
    Path(slug): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    user.require_author()?;
    let current = find_by_slug(state.store.as_ref(), &slug).await?;
    let form = MultipartForm::read(multipart).await?;
    let blog = workflow::update(&state, current, form).await?;
    Ok(Json(BlogResponse {
        message: "Blog post updated successfully",
        blog,
    }))
}

/// DELETE /api/blog/{id}
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_author()?;
    let blog = find_by_id(state.store.as_ref(), &id).await?;
    workflow::delete(&state, blog).await?;
    Ok(Json(json!({ "message": "Blog post deleted successfully" })))
}

/// DELETE /api/blog/slug/{slug}
pub async fn delete_by_slug(
    State(state): State<AppState>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_author()?;
    let blog = find_by_slug(state.store.as_ref(), &slug).await?;
    workflow::delete(&state, blog).await?;
    Ok(Json(json!({ "message": "Blog post deleted successfully" })))
}
