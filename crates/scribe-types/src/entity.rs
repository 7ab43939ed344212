//! System-of-record entities.
//!
//! Posts, categories, tags and users are owned by the surrounding blog
//! system. The indexing subsystem only reads them and never mutates them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScribeError;

/// Identifier of a system-of-record row.
pub type EntityId = u64;

/// Kind of indexable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Post,
    Category,
    Tag,
    User,
}

impl EntityType {
    /// All entity types, in rebuild order.
    pub const ALL: [EntityType; 4] = [
        EntityType::Post,
        EntityType::Category,
        EntityType::Tag,
        EntityType::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Post => "post",
            EntityType::Category => "category",
            EntityType::Tag => "tag",
            EntityType::User => "user",
        }
    }

    /// Parse from string, returning None for unknown types.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "post" => Some(EntityType::Post),
            "category" => Some(EntityType::Category),
            "tag" => Some(EntityType::Tag),
            "user" => Some(EntityType::User),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ScribeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ScribeError::UnknownEntityType(s.to_string()))
    }
}

/// Publication state of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

/// A blog article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: EntityId,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub category_id: Option<EntityId>,
    #[serde(default)]
    pub tag_ids: Vec<EntityId>,
    pub author_id: EntityId,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Create a published post with no category or tags.
    pub fn new(id: EntityId, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            content: content.into(),
            summary: None,
            category_id: None,
            tag_ids: Vec::new(),
            author_id: 0,
            status: PostStatus::Published,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_category(mut self, category_id: EntityId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_tags(mut self, tag_ids: Vec<EntityId>) -> Self {
        self.tag_ids = tag_ids;
        self
    }

    pub fn with_status(mut self, status: PostStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}

/// A post category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Category {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            is_active: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A post tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Tag {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            is_active: true,
        }
    }
}

/// A registered user (post author).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl User {
    pub fn new(id: EntityId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            display_name: None,
            bio: None,
            is_active: true,
        }
    }

    /// Display name, falling back to the username.
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

fn default_active() -> bool {
    true
}

/// Any indexable system-of-record entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entity {
    Post(Post),
    Category(Category),
    Tag(Tag),
    User(User),
}

impl Entity {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Entity::Post(_) => EntityType::Post,
            Entity::Category(_) => EntityType::Category,
            Entity::Tag(_) => EntityType::Tag,
            Entity::User(_) => EntityType::User,
        }
    }

    pub fn id(&self) -> EntityId {
        match self {
            Entity::Post(p) => p.id,
            Entity::Category(c) => c.id,
            Entity::Tag(t) => t.id,
            Entity::User(u) => u.id,
        }
    }

    /// Whether the entity belongs in the search index.
    ///
    /// Posts must be published; everything else must be active.
    pub fn is_indexable(&self) -> bool {
        match self {
            Entity::Post(p) => p.is_published(),
            Entity::Category(c) => c.is_active,
            Entity::Tag(t) => t.is_active,
            Entity::User(u) => u.is_active,
        }
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl From<Post> for Entity {
    fn from(post: Post) -> Self {
        Entity::Post(post)
    }
}

impl From<Category> for Entity {
    fn from(category: Category) -> Self {
        Entity::Category(category)
    }
}

impl From<Tag> for Entity {
    fn from(tag: Tag) -> Self {
        Entity::Tag(tag)
    }
}

impl From<User> for Entity {
    fn from(user: User) -> Self {
        Entity::User(user)
    }
}
