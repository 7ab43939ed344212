//! The derived search document and query types.
//!
//! A `SearchIndex` is the canonical, denormalized representation of one
//! indexable entity. It is written to every configured engine and is the
//! row type of the derived-index store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityType};

/// Separator used when flattening keyword lists.
pub const KEYWORD_SEPARATOR: &str = ",";

/// Derived search document for one `(entity_type, entity_id)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndex {
    /// Surrogate key assigned by the derived-index store (0 until persisted)
    #[serde(default)]
    pub id: u64,

    pub entity_type: EntityType,

    pub entity_id: EntityId,

    pub title: String,

    pub content: String,

    /// Flattened, comma-joined keyword list
    #[serde(default)]
    pub keywords: String,

    pub language: String,

    /// Soft-delete flag
    #[serde(default = "default_active")]
    pub is_active: bool,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl SearchIndex {
    /// Create a new, not yet persisted document.
    pub fn new(
        entity_type: EntityType,
        entity_id: EntityId,
        title: impl Into<String>,
        content: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            entity_type,
            entity_id,
            title: title.into(),
            content: content.into(),
            keywords: String::new(),
            language: language.into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set keywords from a token list, dropping blanks.
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords = join_keywords(keywords);
        self
    }

    /// Identity key shared by every engine: `{entity_type}:{entity_id}`.
    pub fn doc_key(&self) -> String {
        doc_key(self.entity_type, self.entity_id)
    }

    /// Split the flattened keyword string back into tokens.
    pub fn keyword_list(&self) -> Vec<&str> {
        self.keywords
            .split(KEYWORD_SEPARATOR)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .collect()
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

/// Identity key for an entity: `{entity_type}:{entity_id}`.
pub fn doc_key(entity_type: EntityType, entity_id: EntityId) -> String {
    format!("{}:{}", entity_type.as_str(), entity_id)
}

fn join_keywords<I, S>(keywords: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keywords
        .into_iter()
        .map(|k| k.as_ref().trim().to_string())
        .filter(|k| !k.is_empty())
        .collect::<Vec<_>>()
        .join(KEYWORD_SEPARATOR)
}

/// Structured search request handled by an engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Free-text query (may be empty when filtering by identity)
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub entity_type: Option<EntityType>,
    #[serde(default)]
    pub entity_id: Option<EntityId>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub offset: usize,
    pub limit: usize,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            query: String::new(),
            entity_type: None,
            entity_id: None,
            language: None,
            offset: 0,
            limit: 10,
        }
    }
}

impl SearchCriteria {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Narrow query matching a single entity by identity.
    pub fn by_identity(entity_type: EntityType, entity_id: EntityId) -> Self {
        Self {
            entity_type: Some(entity_type),
            entity_id: Some(entity_id),
            limit: 1,
            ..Default::default()
        }
    }

    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// True when neither text nor any filter is set.
    pub fn is_unconstrained(&self) -> bool {
        self.query.trim().is_empty()
            && self.entity_type.is_none()
            && self.entity_id.is_none()
            && self.language.is_none()
    }
}

/// One matched document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub title: String,
    pub content: String,
    pub keywords: String,
    pub score: f32,
}

impl SearchHit {
    pub fn from_document(doc: &SearchIndex, score: f32) -> Self {
        Self {
            entity_type: doc.entity_type,
            entity_id: doc.entity_id,
            title: doc.title.clone(),
            content: doc.content.clone(),
            keywords: doc.keywords.clone(),
            score,
        }
    }
}

/// Result of a search against one engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultSet {
    pub hits: Vec<SearchHit>,
    /// Total matching documents (may exceed `hits.len()`)
    pub total: usize,
    /// Engine that executed the search
    pub engine: String,
}

impl SearchResultSet {
    /// Create empty results.
    pub fn empty(engine: &str) -> Self {
        Self {
            hits: Vec::new(),
            total: 0,
            engine: engine.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_key() {
        let doc = SearchIndex::new(EntityType::Tag, 9, "rust", "", "en");
        assert_eq!(doc.doc_key(), "tag:9");
        assert_eq!(doc_key(EntityType::User, 1), "user:1");
    }

    #[test]
    fn test_keywords_flattened() {
        let doc = SearchIndex::new(EntityType::Post, 1, "t", "c", "en")
            .with_keywords(["rust", " ", "async ", "tokio"]);
        assert_eq!(doc.keywords, "rust,async,tokio");
        assert_eq!(doc.keyword_list(), vec!["rust", "async", "tokio"]);
    }

    #[test]
    fn test_empty_keywords() {
        let doc = SearchIndex::new(EntityType::Post, 1, "t", "c", "en");
        assert!(doc.keyword_list().is_empty());
    }

    #[test]
    fn test_by_identity_criteria() {
        let criteria = SearchCriteria::by_identity(EntityType::Post, 5);
        assert_eq!(criteria.entity_type, Some(EntityType::Post));
        assert_eq!(criteria.entity_id, Some(5));
        assert_eq!(criteria.limit, 1);
        assert!(criteria.query.is_empty());
        assert!(!criteria.is_unconstrained());
        assert!(SearchCriteria::default().is_unconstrained());
    }

    #[test]
    fn test_search_index_bytes() {
        let doc = SearchIndex::new(EntityType::Category, 3, "Systems", "Low level", "en")
            .with_keywords(["category"]);
        let decoded = SearchIndex::from_bytes(&doc.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.doc_key(), "category:3");
        assert_eq!(decoded.title, "Systems");
        assert!(decoded.is_active);
    }
}
