//! In-process store used when no `DATABASE_URL` is configured, and by tests.
//!
//! Rows live in insertion-ordered vectors behind one lock, so every write
//! checks its constraints and commits atomically, like a single SQL statement.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EntityStore, OrderUpdate, OrderedKind, StoreError};
use crate::db::models::{
    Blog, BlogQuery, Category, Contact, Project, ProjectCategory, Section, Status, User,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    categories: Vec<Category>,
    sections: Vec<Section>,
    blogs: Vec<Blog>,
    project_categories: Vec<ProjectCategory>,
    projects: Vec<Project>,
    contacts: Vec<Contact>,
}

impl Tables {
    fn with_blog_count(&self, mut category: Category) -> Category {
        category.blog_count = self.blogs.iter().filter(|b| b.category == category.id).count() as i64;
        category
    }

    fn check_category_unique(&self, category: &Category) -> Result<(), StoreError> {
        let name = category.name.to_lowercase();
        for other in self.categories.iter().filter(|c| c.id != category.id) {
            if other.name.to_lowercase() == name {
                return Err(StoreError::Duplicate("name".into()));
            }
            if other.slug == category.slug {
                return Err(StoreError::Duplicate("slug".into()));
            }
        }
        Ok(())
    }

    fn check_section_refs(&self, section: &Section) -> Result<(), StoreError> {
        match section.category {
            Some(id) if !self.categories.iter().any(|c| c.id == id) => {
                Err(StoreError::MissingReference("category".into()))
            }
            _ => Ok(()),
        }
    }

    fn check_blog(&self, blog: &Blog) -> Result<(), StoreError> {
        if self.blogs.iter().any(|b| b.id != blog.id && b.slug == blog.slug) {
            return Err(StoreError::Duplicate("slug".into()));
        }
        if !self.categories.iter().any(|c| c.id == blog.category) {
            return Err(StoreError::MissingReference("category".into()));
        }
        if !self.sections.iter().any(|s| s.id == blog.section) {
            return Err(StoreError::MissingReference("section".into()));
        }
        if !self.users.iter().any(|u| u.id == blog.author) {
            return Err(StoreError::MissingReference("author".into()));
        }
        Ok(())
    }

    fn check_project_category_unique(&self, category: &ProjectCategory) -> Result<(), StoreError> {
        let name = category.name.to_lowercase();
        for other in self.project_categories.iter().filter(|c| c.id != category.id) {
            if other.name.to_lowercase() == name {
                return Err(StoreError::Duplicate("name".into()));
            }
            if other.slug == category.slug {
                return Err(StoreError::Duplicate("slug".into()));
            }
        }
        Ok(())
    }

    fn check_project_refs(&self, project: &Project) -> Result<(), StoreError> {
        if !self.project_categories.iter().any(|c| c.id == project.category) {
            return Err(StoreError::MissingReference("category".into()));
        }
        Ok(())
    }
}

/// Replace the row with the same id, or report it missing.
fn replace<T: Clone>(
    rows: &mut [T],
    id_of: impl Fn(&T) -> Uuid,
    row: &T,
    kind: &'static str,
) -> Result<T, StoreError> {
    let id = id_of(row);
    let slot = rows
        .iter_mut()
        .find(|r| id_of(r) == id)
        .ok_or(StoreError::NotFound { kind, id })?;
    *slot = row.clone();
    Ok(row.clone())
}

fn remove<T>(
    rows: &mut Vec<T>,
    id_of: impl Fn(&T) -> Uuid,
    id: Uuid,
    kind: &'static str,
) -> Result<(), StoreError> {
    let before = rows.len();
    rows.retain(|r| id_of(r) != id);
    if rows.len() == before {
        return Err(StoreError::NotFound { kind, id });
    }
    Ok(())
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        let _tables = self.tables.read().await;
        Ok(start.elapsed())
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        Ok(self.tables.read().await.users.len() as i64)
    }

    async fn insert_user(&self, user: &User) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        let email = user.email.to_lowercase();
        if tables.users.iter().any(|u| u.email.to_lowercase() == email) {
            return Err(StoreError::Duplicate("email".into()));
        }
        tables.users.push(user.clone());
        Ok(user.clone())
    }

    async fn update_user(&self, user: &User) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        let email = user.email.to_lowercase();
        if tables
            .users
            .iter()
            .any(|u| u.id != user.id && u.email.to_lowercase() == email)
        {
            return Err(StoreError::Duplicate("email".into()));
        }
        replace(&mut tables.users, |u| u.id, user, "User")
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.to_lowercase();
        Ok(self
            .tables
            .read()
            .await
            .users
            .iter()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn list_categories(&self, status: Option<Status>) -> Result<Vec<Category>, StoreError> {
        let tables = self.tables.read().await;
        let mut categories: Vec<Category> = tables
            .categories
            .iter()
            .filter(|c| status.is_none_or(|s| c.status == s))
            .map(|c| tables.with_blog_count(c.clone()))
            .collect();
        categories.sort_by_key(|c| c.order);
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| tables.with_blog_count(c.clone())))
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .categories
            .iter()
            .find(|c| c.slug == slug)
            .map(|c| tables.with_blog_count(c.clone())))
    }

    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, StoreError> {
        let tables = self.tables.read().await;
        let name = name.to_lowercase();
        Ok(tables
            .categories
            .iter()
            .find(|c| c.name.to_lowercase() == name)
            .map(|c| tables.with_blog_count(c.clone())))
    }

    async fn insert_category(&self, category: &Category) -> Result<Category, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_category_unique(category)?;
        tables.categories.push(category.clone());
        Ok(tables.with_blog_count(category.clone()))
    }

    async fn update_category(&self, category: &Category) -> Result<Category, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_category_unique(category)?;
        let updated = replace(&mut tables.categories, |c| c.id, category, "Category")?;
        Ok(tables.with_blog_count(updated))
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.blogs.iter().any(|b| b.category == id)
            || tables.sections.iter().any(|s| s.category == Some(id))
        {
            return Err(StoreError::Referenced("Category"));
        }
        remove(&mut tables.categories, |c| c.id, id, "Category")
    }

    async fn list_sections(&self, active_only: bool) -> Result<Vec<Section>, StoreError> {
        let tables = self.tables.read().await;
        let mut sections: Vec<Section> = tables
            .sections
            .iter()
            .filter(|s| !active_only || s.is_active)
            .cloned()
            .collect();
        sections.sort_by_key(|s| s.order);
        Ok(sections)
    }

    async fn get_section(&self, id: Uuid) -> Result<Option<Section>, StoreError> {
        Ok(self.tables.read().await.sections.iter().find(|s| s.id == id).cloned())
    }

    async fn insert_section(&self, section: &Section) -> Result<Section, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_section_refs(section)?;
        tables.sections.push(section.clone());
        Ok(section.clone())
    }

    async fn update_section(&self, section: &Section) -> Result<Section, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_section_refs(section)?;
        replace(&mut tables.sections, |s| s.id, section, "Section")
    }

    async fn delete_section(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.blogs.iter().any(|b| b.section == id) {
            return Err(StoreError::Referenced("Section"));
        }
        remove(&mut tables.sections, |s| s.id, id, "Section")
    }

    async fn reorder(&self, kind: OrderedKind, updates: &[OrderUpdate]) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let now = chrono::Utc::now();

        // Resolve every id before touching any row.
        match kind {
            OrderedKind::Category => {
                let positions = updates
                    .iter()
                    .map(|u| {
                        tables
                            .categories
                            .iter()
                            .position(|c| c.id == u.id)
                            .ok_or(StoreError::NotFound { kind: kind.label(), id: u.id })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                for (pos, update) in positions.into_iter().zip(updates) {
                    tables.categories[pos].order = update.order;
                    tables.categories[pos].updated_at = now;
                }
            }
            OrderedKind::Section => {
                let positions = updates
                    .iter()
                    .map(|u| {
                        tables
                            .sections
                            .iter()
                            .position(|s| s.id == u.id)
                            .ok_or(StoreError::NotFound { kind: kind.label(), id: u.id })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                for (pos, update) in positions.into_iter().zip(updates) {
                    tables.sections[pos].order = update.order;
                    tables.sections[pos].updated_at = now;
                }
            }
        }
        Ok(())
    }

    async fn list_blogs(&self, query: &BlogQuery) -> Result<Vec<Blog>, StoreError> {
        let tables = self.tables.read().await;
        let mut blogs: Vec<Blog> = tables
            .blogs
            .iter()
            .filter(|b| query.matches(b))
            .cloned()
            .collect();
        blogs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let offset = query.offset.max(0) as usize;
        let limit = query.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        Ok(blogs.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_blogs(&self, query: &BlogQuery) -> Result<i64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.blogs.iter().filter(|b| query.matches(b)).count() as i64)
    }

    async fn get_blog(&self, id: Uuid) -> Result<Option<Blog>, StoreError> {
        Ok(self.tables.read().await.blogs.iter().find(|b| b.id == id).cloned())
    }

    async fn find_blog_by_slug(&self, slug: &str) -> Result<Option<Blog>, StoreError> {
        Ok(self.tables.read().await.blogs.iter().find(|b| b.slug == slug).cloned())
    }

    async fn insert_blog(&self, blog: &Blog) -> Result<Blog, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_blog(blog)?;
        tables.blogs.push(blog.clone());
        Ok(blog.clone())
    }

    async fn update_blog(&self, blog: &Blog) -> Result<Blog, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_blog(blog)?;
        replace(&mut tables.blogs, |b| b.id, blog, "Blog")
    }

    async fn delete_blog(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        remove(&mut tables.blogs, |b| b.id, id, "Blog")
    }

    async fn list_project_categories(&self) -> Result<Vec<ProjectCategory>, StoreError> {
        let mut categories = self.tables.read().await.project_categories.clone();
        categories.sort_by_key(|c| c.name.to_lowercase());
        Ok(categories)
    }

    async fn get_project_category(&self, id: Uuid) -> Result<Option<ProjectCategory>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .project_categories
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn find_project_category_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ProjectCategory>, StoreError> {
        let name = name.to_lowercase();
        Ok(self
            .tables
            .read()
            .await
            .project_categories
            .iter()
            .find(|c| c.name.to_lowercase() == name)
            .cloned())
    }

    async fn insert_project_category(
        &self,
        category: &ProjectCategory,
    ) -> Result<ProjectCategory, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_project_category_unique(category)?;
        tables.project_categories.push(category.clone());
        Ok(category.clone())
    }

    async fn update_project_category(
        &self,
        category: &ProjectCategory,
    ) -> Result<ProjectCategory, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_project_category_unique(category)?;
        replace(&mut tables.project_categories, |c| c.id, category, "Project category")
    }

    async fn delete_project_category(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.projects.iter().any(|p| p.category == id) {
            return Err(StoreError::Referenced("Project category"));
        }
        remove(&mut tables.project_categories, |c| c.id, id, "Project category")
    }

    async fn list_projects(&self, category: Option<Uuid>) -> Result<Vec<Project>, StoreError> {
        let tables = self.tables.read().await;
        let mut projects: Vec<Project> = tables
            .projects
            .iter()
            .filter(|p| category.is_none_or(|c| p.category == c))
            .cloned()
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, StoreError> {
        Ok(self.tables.read().await.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_project(&self, project: &Project) -> Result<Project, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_project_refs(project)?;
        tables.projects.push(project.clone());
        Ok(project.clone())
    }

    async fn update_project(&self, project: &Project) -> Result<Project, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_project_refs(project)?;
        replace(&mut tables.projects, |p| p.id, project, "Project")
    }

    async fn delete_project(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        remove(&mut tables.projects, |p| p.id, id, "Project")
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, StoreError> {
        let mut contacts = self.tables.read().await.contacts.clone();
        contacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(contacts)
    }

    async fn insert_contact(&self, contact: &Contact) -> Result<Contact, StoreError> {
        self.tables.write().await.contacts.push(contact.clone());
        Ok(contact.clone())
    }

    async fn delete_contact(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        remove(&mut tables.contacts, |c| c.id, id, "Contact")
    }
}
