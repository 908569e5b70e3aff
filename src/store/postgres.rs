//! PostgreSQL-backed [`EntityStore`].
//!
//! Rows are read into flat `*Row` structs and converted into the API models;
//! enum columns are stored as their lowercase names and blog sub-documents as
//! JSONB.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool, Postgres, QueryBuilder};
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::{EntityStore, OrderUpdate, OrderedKind, StoreError};
use crate::db::models::{
    Blog, BlogMeta, BlogQuery, BlogSection, Category, Contact, CustomQuery, Project,
    ProjectCategory, Section, Status, User,
};

// ============================================================================
// Row types
// ============================================================================

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse().map_err(StoreError::Corrupt)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    slug: String,
    description: Option<String>,
    blog_count: i64,
    status: String,
    display_order: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CategoryRow> for Category {
    type Error = StoreError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        Ok(Category {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            blog_count: row.blog_count,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            order: row.display_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct SectionRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    section_type: String,
    category_id: Option<Uuid>,
    item_limit: i32,
    display_order: i32,
    is_active: bool,
    display_style: String,
    custom_query: Json<CustomQuery>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SectionRow> for Section {
    type Error = StoreError;

    fn try_from(row: SectionRow) -> Result<Self, Self::Error> {
        Ok(Section {
            id: row.id,
            title: row.title,
            description: row.description,
            section_type: row.section_type.parse().map_err(StoreError::Corrupt)?,
            category: row.category_id,
            limit: row.item_limit,
            order: row.display_order,
            is_active: row.is_active,
            display_style: row.display_style.parse().map_err(StoreError::Corrupt)?,
            custom_query: row.custom_query.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct BlogRow {
    id: Uuid,
    title: String,
    slug: String,
    description: String,
    main_image: String,
    tags: Vec<String>,
    category_id: Uuid,
    section_id: Uuid,
    featured: bool,
    status: String,
    sections: Json<Vec<BlogSection>>,
    meta: Json<BlogMeta>,
    author_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BlogRow> for Blog {
    type Error = StoreError;

    fn try_from(row: BlogRow) -> Result<Self, Self::Error> {
        Ok(Blog {
            id: row.id,
            title: row.title,
            slug: row.slug,
            description: row.description,
            main_image: row.main_image,
            tags: row.tags,
            category: row.category_id,
            section: row.section_id,
            featured: row.featured,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            sections: row.sections.0,
            meta: row.meta.0,
            author: row.author_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ProjectCategoryRow {
    id: Uuid,
    name: String,
    slug: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProjectCategoryRow> for ProjectCategory {
    fn from(row: ProjectCategoryRow) -> Self {
        ProjectCategory {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ProjectRow {
    id: Uuid,
    title: String,
    main_image: String,
    additional_images: Vec<String>,
    category_id: Uuid,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: row.id,
            title: row.title,
            main_image: row.main_image,
            additional_images: row.additional_images,
            category: row.category_id,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ContactRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    phone_number: String,
    email: String,
    address: String,
    message: String,
    created_at: DateTime<Utc>,
}

impl From<ContactRow> for Contact {
    fn from(row: ContactRow) -> Self {
        Contact {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            phone_number: row.phone_number,
            email: row.email,
            address: row.address,
            message: row.message,
            created_at: row.created_at,
        }
    }
}

// ============================================================================
// Error mapping
// ============================================================================

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// `uq_categories_name` -> `name`
fn unique_field(constraint: &str) -> String {
    constraint
        .rsplit('_')
        .next()
        .unwrap_or(constraint)
        .to_string()
}

/// `blogs_category_id_fkey` -> `category`
fn foreign_key_field(table: &str, constraint: &str) -> String {
    constraint
        .strip_prefix(table)
        .and_then(|s| s.strip_prefix('_'))
        .unwrap_or(constraint)
        .trim_end_matches("_fkey")
        .trim_end_matches("_id")
        .to_string()
}

fn map_write_error(table: &str, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        let constraint = db.constraint().unwrap_or_default();
        match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => return StoreError::Duplicate(unique_field(constraint)),
            Some(FOREIGN_KEY_VIOLATION) => {
                return StoreError::MissingReference(foreign_key_field(table, constraint))
            }
            _ => {}
        }
    }
    StoreError::Database(e)
}

fn map_delete_error(kind: &'static str, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) {
            return StoreError::Referenced(kind);
        }
    }
    StoreError::Database(e)
}

fn expect_one(rows_affected: u64, kind: &'static str, id: Uuid) -> Result<(), StoreError> {
    if rows_affected == 0 {
        return Err(StoreError::NotFound { kind, id });
    }
    Ok(())
}

// ============================================================================
// Store
// ============================================================================

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";

const CATEGORY_SELECT: &str = r#"
    SELECT c.id, c.name, c.slug, c.description, c.status, c.display_order,
           c.created_at, c.updated_at,
           (SELECT COUNT(*) FROM blogs b WHERE b.category_id = c.id) AS blog_count
    FROM categories c
"#;

const SECTION_COLUMNS: &str = "id, title, description, section_type, category_id, item_limit, \
    display_order, is_active, display_style, custom_query, created_at, updated_at";

const BLOG_COLUMNS: &str = "id, title, slug, description, main_image, tags, category_id, \
    section_id, featured, status, sections, meta, author_id, created_at, updated_at";

const PROJECT_COLUMNS: &str =
    "id, title, main_image, additional_images, category_id, description, created_at, updated_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_blog_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &BlogQuery) {
        qb.push(" WHERE TRUE");
        if let Some(category) = query.category {
            qb.push(" AND category_id = ").push_bind(category);
        }
        if let Some(categories) = &query.categories {
            qb.push(" AND category_id = ANY(")
                .push_bind(categories.clone())
                .push(")");
        }
        if let Some(section) = query.section {
            qb.push(" AND section_id = ").push_bind(section);
        }
        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(featured) = query.featured {
            qb.push(" AND featured = ").push_bind(featured);
        }
        if let Some(tag) = &query.tag {
            qb.push(" AND ").push_bind(tag.clone()).push(" = ANY(tags)");
        }
    }

    async fn fetch_category(&self, id: Uuid) -> Result<Category, StoreError> {
        self.get_category(id)
            .await?
            .ok_or(StoreError::NotFound { kind: "Category", id })
    }
}

#[async_trait]
impl EntityStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(start.elapsed())
    }

    // --- users ---

    async fn count_users(&self) -> Result<i64, StoreError> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(total.0)
    }

    async fn insert_user(&self, user: &User) -> Result<User, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("users", e))?;
        Ok(user.clone())
    }

    async fn update_user(&self, user: &User) -> Result<User, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = $2, email = $3, password_hash = $4, role = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("users", e))?;
        expect_one(result.rows_affected(), "User", user.id)?;
        Ok(user.clone())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    // --- categories ---

    async fn list_categories(&self, status: Option<Status>) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "{CATEGORY_SELECT} WHERE ($1::TEXT IS NULL OR c.status = $1) \
             ORDER BY c.display_order, c.created_at"
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Category::try_from).collect()
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        sqlx::query_as::<_, CategoryRow>(&format!("{CATEGORY_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Category::try_from)
            .transpose()
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError> {
        sqlx::query_as::<_, CategoryRow>(&format!("{CATEGORY_SELECT} WHERE c.slug = $1"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .map(Category::try_from)
            .transpose()
    }

    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, StoreError> {
        sqlx::query_as::<_, CategoryRow>(&format!(
            "{CATEGORY_SELECT} WHERE LOWER(c.name) = LOWER($1)"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .map(Category::try_from)
        .transpose()
    }

    async fn insert_category(&self, category: &Category) -> Result<Category, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO categories
                (id, name, slug, description, status, display_order, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.status.as_str())
        .bind(category.order)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("categories", e))?;
        self.fetch_category(category.id).await
    }

    async fn update_category(&self, category: &Category) -> Result<Category, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE categories
            SET name = $2, slug = $3, description = $4, status = $5,
                display_order = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.status.as_str())
        .bind(category.order)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("categories", e))?;
        expect_one(result.rows_affected(), "Category", category.id)?;
        self.fetch_category(category.id).await
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_delete_error("Category", e))?;
        expect_one(result.rows_affected(), "Category", id)
    }

    // --- sections ---

    async fn list_sections(&self, active_only: bool) -> Result<Vec<Section>, StoreError> {
        let rows = sqlx::query_as::<_, SectionRow>(&format!(
            "SELECT {SECTION_COLUMNS} FROM sections WHERE ($1 = FALSE OR is_active) \
             ORDER BY display_order, created_at"
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Section::try_from).collect()
    }

    async fn get_section(&self, id: Uuid) -> Result<Option<Section>, StoreError> {
        sqlx::query_as::<_, SectionRow>(&format!(
            "SELECT {SECTION_COLUMNS} FROM sections WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Section::try_from)
        .transpose()
    }

    async fn insert_section(&self, section: &Section) -> Result<Section, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sections
                (id, title, description, section_type, category_id, item_limit, display_order,
                 is_active, display_style, custom_query, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(section.id)
        .bind(&section.title)
        .bind(&section.description)
        .bind(section.section_type.as_str())
        .bind(section.category)
        .bind(section.limit)
        .bind(section.order)
        .bind(section.is_active)
        .bind(section.display_style.as_str())
        .bind(Json(&section.custom_query))
        .bind(section.created_at)
        .bind(section.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("sections", e))?;
        Ok(section.clone())
    }

    async fn update_section(&self, section: &Section) -> Result<Section, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sections
            SET title = $2, description = $3, section_type = $4, category_id = $5,
                item_limit = $6, display_order = $7, is_active = $8, display_style = $9,
                custom_query = $10, updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(section.id)
        .bind(&section.title)
        .bind(&section.description)
        .bind(section.section_type.as_str())
        .bind(section.category)
        .bind(section.limit)
        .bind(section.order)
        .bind(section.is_active)
        .bind(section.display_style.as_str())
        .bind(Json(&section.custom_query))
        .bind(section.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("sections", e))?;
        expect_one(result.rows_affected(), "Section", section.id)?;
        Ok(section.clone())
    }

    async fn delete_section(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM sections WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_delete_error("Section", e))?;
        expect_one(result.rows_affected(), "Section", id)
    }

    async fn reorder(&self, kind: OrderedKind, updates: &[OrderUpdate]) -> Result<(), StoreError> {
        let sql = match kind {
            OrderedKind::Category => {
                "UPDATE categories SET display_order = $1, updated_at = now() WHERE id = $2"
            }
            OrderedKind::Section => {
                "UPDATE sections SET display_order = $1, updated_at = now() WHERE id = $2"
            }
        };

        let mut tx = self.pool.begin().await?;
        for update in updates {
            let result = sqlx::query(sql)
                .bind(update.order)
                .bind(update.id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(StoreError::NotFound {
                    kind: kind.label(),
                    id: update.id,
                });
            }
        }
        tx.commit().await?;
        Ok(())
    }

    // --- blogs ---

    async fn list_blogs(&self, query: &BlogQuery) -> Result<Vec<Blog>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {BLOG_COLUMNS} FROM blogs"));
        Self::push_blog_filters(&mut qb, query);
        qb.push(" ORDER BY created_at DESC");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }
        qb.push(" OFFSET ").push_bind(query.offset.max(0));

        let rows = qb.build_query_as::<BlogRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(Blog::try_from).collect()
    }

    async fn count_blogs(&self, query: &BlogQuery) -> Result<i64, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM blogs");
        Self::push_blog_filters(&mut qb, query);
        let total: (i64,) = qb.build_query_as().fetch_one(&self.pool).await?;
        Ok(total.0)
    }

    async fn get_blog(&self, id: Uuid) -> Result<Option<Blog>, StoreError> {
        sqlx::query_as::<_, BlogRow>(&format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Blog::try_from)
            .transpose()
    }

    async fn find_blog_by_slug(&self, slug: &str) -> Result<Option<Blog>, StoreError> {
        sqlx::query_as::<_, BlogRow>(&format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .map(Blog::try_from)
            .transpose()
    }

    async fn insert_blog(&self, blog: &Blog) -> Result<Blog, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO blogs
                (id, title, slug, description, main_image, tags, category_id, section_id,
                 featured, status, sections, meta, author_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(blog.id)
        .bind(&blog.title)
        .bind(&blog.slug)
        .bind(&blog.description)
        .bind(&blog.main_image)
        .bind(&blog.tags)
        .bind(blog.category)
        .bind(blog.section)
        .bind(blog.featured)
        .bind(blog.status.as_str())
        .bind(Json(&blog.sections))
        .bind(Json(&blog.meta))
        .bind(blog.author)
        .bind(blog.created_at)
        .bind(blog.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("blogs", e))?;
        Ok(blog.clone())
    }

    async fn update_blog(&self, blog: &Blog) -> Result<Blog, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE blogs
            SET title = $2, slug = $3, description = $4, main_image = $5, tags = $6,
                category_id = $7, section_id = $8, featured = $9, status = $10,
                sections = $11, meta = $12, updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(blog.id)
        .bind(&blog.title)
        .bind(&blog.slug)
        .bind(&blog.description)
        .bind(&blog.main_image)
        .bind(&blog.tags)
        .bind(blog.category)
        .bind(blog.section)
        .bind(blog.featured)
        .bind(blog.status.as_str())
        .bind(Json(&blog.sections))
        .bind(Json(&blog.meta))
        .bind(blog.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("blogs", e))?;
        expect_one(result.rows_affected(), "Blog", blog.id)?;
        Ok(blog.clone())
    }

    async fn delete_blog(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM blogs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected(), "Blog", id)
    }

    // --- project categories ---

    async fn list_project_categories(&self) -> Result<Vec<ProjectCategory>, StoreError> {
        let rows = sqlx::query_as::<_, ProjectCategoryRow>(
            "SELECT id, name, slug, description, created_at, updated_at \
             FROM project_categories ORDER BY LOWER(name)",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ProjectCategory::from).collect())
    }

    async fn get_project_category(&self, id: Uuid) -> Result<Option<ProjectCategory>, StoreError> {
        let row = sqlx::query_as::<_, ProjectCategoryRow>(
            "SELECT id, name, slug, description, created_at, updated_at \
             FROM project_categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ProjectCategory::from))
    }

    async fn find_project_category_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ProjectCategory>, StoreError> {
        let row = sqlx::query_as::<_, ProjectCategoryRow>(
            "SELECT id, name, slug, description, created_at, updated_at \
             FROM project_categories WHERE LOWER(name) = LOWER($1)",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ProjectCategory::from))
    }

    async fn insert_project_category(
        &self,
        category: &ProjectCategory,
    ) -> Result<ProjectCategory, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO project_categories (id, name, slug, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("project_categories", e))?;
        Ok(category.clone())
    }

    async fn update_project_category(
        &self,
        category: &ProjectCategory,
    ) -> Result<ProjectCategory, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE project_categories
            SET name = $2, slug = $3, description = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("project_categories", e))?;
        expect_one(result.rows_affected(), "Project category", category.id)?;
        Ok(category.clone())
    }

    async fn delete_project_category(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM project_categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_delete_error("Project category", e))?;
        expect_one(result.rows_affected(), "Project category", id)
    }

    // --- projects ---

    async fn list_projects(&self, category: Option<Uuid>) -> Result<Vec<Project>, StoreError> {
        let rows = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects \
             WHERE ($1::UUID IS NULL OR category_id = $1) ORDER BY created_at DESC"
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Project::from).collect())
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, StoreError> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Project::from))
    }

    async fn insert_project(&self, project: &Project) -> Result<Project, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO projects
                (id, title, main_image, additional_images, category_id, description,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(project.id)
        .bind(&project.title)
        .bind(&project.main_image)
        .bind(&project.additional_images)
        .bind(project.category)
        .bind(&project.description)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("projects", e))?;
        Ok(project.clone())
    }

    async fn update_project(&self, project: &Project) -> Result<Project, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET title = $2, main_image = $3, additional_images = $4, category_id = $5,
                description = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(project.id)
        .bind(&project.title)
        .bind(&project.main_image)
        .bind(&project.additional_images)
        .bind(project.category)
        .bind(&project.description)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("projects", e))?;
        expect_one(result.rows_affected(), "Project", project.id)?;
        Ok(project.clone())
    }

    async fn delete_project(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected(), "Project", id)
    }

    // --- contacts ---

    async fn list_contacts(&self) -> Result<Vec<Contact>, StoreError> {
        let rows = sqlx::query_as::<_, ContactRow>(
            "SELECT id, first_name, last_name, phone_number, email, address, message, created_at \
             FROM contacts ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Contact::from).collect())
    }

    async fn insert_contact(&self, contact: &Contact) -> Result<Contact, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO contacts
                (id, first_name, last_name, phone_number, email, address, message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(contact.id)
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.phone_number)
        .bind(&contact.email)
        .bind(&contact.address)
        .bind(&contact.message)
        .bind(contact.created_at)
        .execute(&self.pool)
        .await?;
        Ok(contact.clone())
    }

    async fn delete_contact(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected(), "Contact", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_field_from_index_name() {
        assert_eq!(unique_field("uq_categories_name"), "name");
        assert_eq!(unique_field("uq_project_categories_slug"), "slug");
        assert_eq!(unique_field("uq_users_email"), "email");
    }

    #[test]
    fn test_foreign_key_field_from_constraint_name() {
        assert_eq!(foreign_key_field("blogs", "blogs_category_id_fkey"), "category");
        assert_eq!(foreign_key_field("blogs", "blogs_author_id_fkey"), "author");
        assert_eq!(
            foreign_key_field("projects", "projects_category_id_fkey"),
            "category"
        );
    }

    #[test]
    fn test_corrupt_enum_column_is_reported() {
        let row = UserRow {
            id: Uuid::new_v4(),
            name: "x".to_string(),
            email: "x@example.com".to_string(),
            password_hash: "h".to_string(),
            role: "superuser".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(User::try_from(row), Err(StoreError::Corrupt(_))));
    }
}
