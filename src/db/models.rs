//! Database Models - the persisted entities shared by the store and the HTTP layer.
//!
//! Identifiers serialise as `_id` and field names as camelCase so existing
//! clients keep working; blog sub-documents keep their snake_case keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

// ============================================================================
// Enumerations
// ============================================================================

/// Publication state shared by categories and blogs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Draft,
    #[default]
    Published,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Draft => "draft",
            Status::Published => "published",
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Status::Draft),
            "published" => Ok(Status::Published),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// User role carried in the access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Author,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Author => "author",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "author" => Ok(Role::Author),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a homepage section picks its blogs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Featured,
    Latest,
    Category,
    Custom,
}

impl SectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::Featured => "featured",
            SectionType::Latest => "latest",
            SectionType::Category => "category",
            SectionType::Custom => "custom",
        }
    }
}

impl FromStr for SectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "featured" => Ok(SectionType::Featured),
            "latest" => Ok(SectionType::Latest),
            "category" => Ok(SectionType::Category),
            "custom" => Ok(SectionType::Custom),
            other => Err(format!("unknown section type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStyle {
    #[default]
    Grid,
    List,
    Carousel,
}

impl DisplayStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayStyle::Grid => "grid",
            DisplayStyle::List => "list",
            DisplayStyle::Carousel => "carousel",
        }
    }
}

impl FromStr for DisplayStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grid" => Ok(DisplayStyle::Grid),
            "list" => Ok(DisplayStyle::List),
            "carousel" => Ok(DisplayStyle::Carousel),
            other => Err(format!("unknown display style '{other}'")),
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// User model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Blog category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    /// Number of blogs referencing this category, filled in on read.
    #[serde(default)]
    pub blog_count: i64,
    pub status: Status,
    #[serde(default)]
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Extra filters applied by a `custom` section on top of "published"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Homepage section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub section_type: SectionType,
    pub category: Option<Uuid>,
    pub limit: i32,
    pub order: i32,
    pub is_active: bool,
    pub display_style: DisplayStyle,
    #[serde(default)]
    pub custom_query: CustomQuery,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One content block inside a blog post
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlogSection {
    #[serde(default)]
    pub section_img: Option<String>,
    #[serde(default)]
    pub section_title: Option<String>,
    #[serde(default)]
    pub section_description: String,
    #[serde(default)]
    pub section_list: Vec<String>,
    #[serde(default)]
    pub order: i32,
}

/// SEO metadata attached to a blog post
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlogMeta {
    pub meta_title: String,
    pub meta_description: String,
    #[serde(default)]
    pub meta_keywords: Vec<String>,
}

/// Blog post model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub main_image: String,
    pub tags: Vec<String>,
    pub category: Uuid,
    pub section: Uuid,
    pub featured: bool,
    pub status: Status,
    pub sections: Vec<BlogSection>,
    pub meta: BlogMeta,
    pub author: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Blog {
    /// Every media URL this post references.
    pub fn image_urls(&self) -> Vec<String> {
        std::iter::once(self.main_image.as_str())
            .chain(self.sections.iter().filter_map(|s| s.section_img.as_deref()))
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCategory {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub main_image: String,
    pub additional_images: Vec<String>,
    pub category: Uuid,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Contact form submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: String,
    pub address: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Queries
// ============================================================================

/// Filter for blog listings. Results are always newest first.
#[derive(Debug, Clone, Default)]
pub struct BlogQuery {
    pub category: Option<Uuid>,
    pub categories: Option<Vec<Uuid>>,
    pub section: Option<Uuid>,
    pub status: Option<Status>,
    pub featured: Option<bool>,
    pub tag: Option<String>,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl BlogQuery {
    pub fn published() -> Self {
        Self {
            status: Some(Status::Published),
            ..Self::default()
        }
    }

    pub fn matches(&self, blog: &Blog) -> bool {
        self.category.is_none_or(|c| blog.category == c)
            && self
                .categories
                .as_ref()
                .is_none_or(|ids| ids.contains(&blog.category))
            && self.section.is_none_or(|s| blog.section == s)
            && self.status.is_none_or(|s| blog.status == s)
            && self.featured.is_none_or(|f| blog.featured == f)
            && self
                .tag
                .as_ref()
                .is_none_or(|t| blog.tags.iter().any(|bt| bt == t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_blog() -> Blog {
        Blog {
            id: Uuid::new_v4(),
            title: "Hello".to_string(),
            slug: "hello".to_string(),
            description: "d".to_string(),
            main_image: "https://cdn/main.png".to_string(),
            tags: vec!["rust".to_string()],
            category: Uuid::new_v4(),
            section: Uuid::new_v4(),
            featured: true,
            status: Status::Published,
            sections: vec![
                BlogSection {
                    section_img: Some("https://cdn/a.png".to_string()),
                    ..BlogSection::default()
                },
                BlogSection::default(),
            ],
            meta: BlogMeta::default(),
            author: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_password_hash_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            role: Role::Author,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(!json.to_string().contains("secret"));
        assert_eq!(json["role"], "author");
        assert!(json.get("_id").is_some());
    }

    #[test]
    fn test_section_serializes_type_key() {
        let json = serde_json::to_value(SectionType::Category).unwrap();
        assert_eq!(json, "category");
        assert_eq!("carousel".parse::<DisplayStyle>(), Ok(DisplayStyle::Carousel));
        assert!("weekly".parse::<SectionType>().is_err());
    }

    #[test]
    fn test_blog_image_urls_skips_empty() {
        let mut blog = sample_blog();
        assert_eq!(blog.image_urls(), vec!["https://cdn/main.png", "https://cdn/a.png"]);
        blog.main_image.clear();
        assert_eq!(blog.image_urls(), vec!["https://cdn/a.png"]);
    }

    #[test]
    fn test_blog_query_matches() {
        let blog = sample_blog();
        assert!(BlogQuery::published().matches(&blog));
        let by_tag = BlogQuery {
            tag: Some("go".to_string()),
            ..BlogQuery::default()
        };
        assert!(!by_tag.matches(&blog));
        let by_categories = BlogQuery {
            categories: Some(vec![blog.category]),
            featured: Some(true),
            ..BlogQuery::default()
        };
        assert!(by_categories.matches(&blog));
    }
}
