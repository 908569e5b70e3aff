//! Entity Store - persistence seam between handlers and the database.
//!
//! Handlers only talk to [`EntityStore`]. [`PgStore`] backs it with
//! PostgreSQL; [`MemoryStore`] keeps everything in process and enforces the
//! same uniqueness and reference constraints as the SQL schema.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::{
    Blog, BlogQuery, Category, Contact, Project, ProjectCategory, Section, Status, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write; carries the offending field.
    #[error("duplicate value for {0}")]
    Duplicate(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    /// Delete refused because other records still point at the row.
    #[error("{0} is still referenced")]
    Referenced(&'static str),

    /// Write refused because a referenced row does not exist.
    #[error("referenced {0} does not exist")]
    MissingReference(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Collections whose rows carry a display `order`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderedKind {
    Category,
    Section,
}

impl OrderedKind {
    pub fn label(&self) -> &'static str {
        match self {
            OrderedKind::Category => "Category",
            OrderedKind::Section => "Section",
        }
    }
}

/// One validated entry of a reorder batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderUpdate {
    pub id: Uuid,
    pub order: i32,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<Duration, StoreError>;

    // --- users ---
    async fn count_users(&self) -> Result<i64, StoreError>;
    async fn insert_user(&self, user: &User) -> Result<User, StoreError>;
    async fn update_user(&self, user: &User) -> Result<User, StoreError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// Case-insensitive lookup.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    // --- categories ---
    /// Sorted by `order`, then creation time.
    async fn list_categories(&self, status: Option<Status>) -> Result<Vec<Category>, StoreError>;
    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, StoreError>;
    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError>;
    /// Case-insensitive lookup.
    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, StoreError>;
    async fn insert_category(&self, category: &Category) -> Result<Category, StoreError>;
    async fn update_category(&self, category: &Category) -> Result<Category, StoreError>;
    async fn delete_category(&self, id: Uuid) -> Result<(), StoreError>;

    // --- sections ---
    /// Sorted by `order`, then creation time.
    async fn list_sections(&self, active_only: bool) -> Result<Vec<Section>, StoreError>;
    async fn get_section(&self, id: Uuid) -> Result<Option<Section>, StoreError>;
    async fn insert_section(&self, section: &Section) -> Result<Section, StoreError>;
    async fn update_section(&self, section: &Section) -> Result<Section, StoreError>;
    async fn delete_section(&self, id: Uuid) -> Result<(), StoreError>;

    /// Apply a reorder batch atomically: either every row gets its new
    /// `order` or none does. A missing id fails the whole batch with
    /// [`StoreError::NotFound`].
    async fn reorder(&self, kind: OrderedKind, updates: &[OrderUpdate]) -> Result<(), StoreError>;

    // --- blogs ---
    async fn list_blogs(&self, query: &BlogQuery) -> Result<Vec<Blog>, StoreError>;
    async fn count_blogs(&self, query: &BlogQuery) -> Result<i64, StoreError>;
    async fn get_blog(&self, id: Uuid) -> Result<Option<Blog>, StoreError>;
    async fn find_blog_by_slug(&self, slug: &str) -> Result<Option<Blog>, StoreError>;
    async fn insert_blog(&self, blog: &Blog) -> Result<Blog, StoreError>;
    async fn update_blog(&self, blog: &Blog) -> Result<Blog, StoreError>;
    async fn delete_blog(&self, id: Uuid) -> Result<(), StoreError>;

    // --- project categories ---
    async fn list_project_categories(&self) -> Result<Vec<ProjectCategory>, StoreError>;
    async fn get_project_category(&self, id: Uuid) -> Result<Option<ProjectCategory>, StoreError>;
    async fn find_project_category_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ProjectCategory>, StoreError>;
    async fn insert_project_category(
        &self,
        category: &ProjectCategory,
    ) -> Result<ProjectCategory, StoreError>;
    async fn update_project_category(
        &self,
        category: &ProjectCategory,
    ) -> Result<ProjectCategory, StoreError>;
    async fn delete_project_category(&self, id: Uuid) -> Result<(), StoreError>;

    // --- projects ---
    /// Newest first.
    async fn list_projects(&self, category: Option<Uuid>) -> Result<Vec<Project>, StoreError>;
    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, StoreError>;
    async fn insert_project(&self, project: &Project) -> Result<Project, StoreError>;
    async fn update_project(&self, project: &Project) -> Result<Project, StoreError>;
    async fn delete_project(&self, id: Uuid) -> Result<(), StoreError>;

    // --- contacts ---
    /// Newest first.
    async fn list_contacts(&self) -> Result<Vec<Contact>, StoreError>;
    async fn insert_contact(&self, contact: &Contact) -> Result<Contact, StoreError>;
    async fn delete_contact(&self, id: Uuid) -> Result<(), StoreError>;
}
