//! Document builder: system-of-record entity -> `SearchIndex`.
//!
//! Posts carry their tag names and category name as keywords. Categories,
//! tags and users get a fixed keyword set naming their type.

use std::sync::Arc;

use tracing::{debug, warn};

use scribe_types::{Category, Entity, EntityType, Post, SearchIndex, Tag, User};

use crate::error::IndexingError;
use crate::source::EntitySource;

const CATEGORY_KEYWORDS: &[&str] = &["category"];
const TAG_KEYWORDS: &[&str] = &["tag"];
const USER_KEYWORDS: &[&str] = &["user", "author"];

/// Documents built from a batch of entities.
#[derive(Debug, Default)]
pub struct BatchBuild {
    pub docs: Vec<SearchIndex>,
    /// One message per entity that failed to build
    pub failures: Vec<String>,
    /// Entities skipped because they are not indexable
    pub skipped: usize,
}

/// Converts entities into canonical search documents.
pub struct DocumentBuilder {
    source: Arc<dyn EntitySource>,
    language: String,
}

impl DocumentBuilder {
    pub fn new(source: Arc<dyn EntitySource>, language: impl Into<String>) -> Self {
        Self {
            source,
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Build the document for an entity.
    ///
    /// Fails with [`IndexingError::Build`] for malformed entities or missing
    /// tags; a missing category is left out of the keywords. Lookup failures
    /// propagate as their own variants.
    pub fn build(&self, entity: &Entity) -> Result<SearchIndex, IndexingError> {
        if entity.id() == 0 {
            return Err(IndexingError::Build(format!(
                "{} has no id",
                entity.entity_type()
            )));
        }

        let doc = match entity {
            Entity::Post(post) => self.build_post(post)?,
            Entity::Category(category) => self.build_category(category),
            Entity::Tag(tag) => self.build_tag(tag),
            Entity::User(user) => self.build_user(user),
        };

        if doc.title.trim().is_empty() {
            return Err(IndexingError::Build(format!(
                "{} has an empty title",
                doc.doc_key()
            )));
        }

        debug!(doc_key = %doc.doc_key(), "Built document");
        Ok(doc)
    }

    /// Build every indexable entity in `entities`.
    ///
    /// Build failures are collected and skipped; any other error aborts
    /// the batch.
    pub fn build_batch<'a, I>(&self, entities: I) -> Result<BatchBuild, IndexingError>
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        let mut batch = BatchBuild::default();
        for entity in entities {
            if !entity.is_indexable() {
                batch.skipped += 1;
                continue;
            }
            match self.build(entity) {
                Ok(doc) => batch.docs.push(doc),
                Err(e) if e.is_build_failure() => {
                    warn!(
                        entity_type = %entity.entity_type(),
                        id = entity.id(),
                        error = %e,
                        "Skipping entity that failed to build"
                    );
                    batch.failures.push(e.to_string());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(batch)
    }

    fn build_post(&self, post: &Post) -> Result<SearchIndex, IndexingError> {
        let mut keywords = Vec::with_capacity(post.tag_ids.len() + 1);

        if !post.tag_ids.is_empty() {
            let tags = self.source.load_many(EntityType::Tag, &post.tag_ids)?;
            if tags.len() != post.tag_ids.len() {
                let missing: Vec<_> = post
                    .tag_ids
                    .iter()
                    .filter(|id| !tags.iter().any(|t| t.id() == **id))
                    .collect();
                return Err(IndexingError::Build(format!(
                    "post:{} references missing tags {:?}",
                    post.id, missing
                )));
            }
            for tag in tags {
                if let Entity::Tag(tag) = tag {
                    keywords.push(tag.name);
                }
            }
        }

        if let Some(category_id) = post.category_id {
            match self.source.load(EntityType::Category, category_id)? {
                Some(Entity::Category(category)) => keywords.push(category.name),
                _ => warn!(
                    post_id = post.id,
                    category_id, "Category not found, omitting from keywords"
                ),
            }
        }

        Ok(SearchIndex::new(
            EntityType::Post,
            post.id,
            post.title.clone(),
            post.content.clone(),
            self.language.clone(),
        )
        .with_keywords(keywords))
    }

    fn build_category(&self, category: &Category) -> SearchIndex {
        SearchIndex::new(
            EntityType::Category,
            category.id,
            category.name.clone(),
            category.description.clone().unwrap_or_default(),
            self.language.clone(),
        )
        .with_keywords(CATEGORY_KEYWORDS)
    }

    fn build_tag(&self, tag: &Tag) -> SearchIndex {
        SearchIndex::new(
            EntityType::Tag,
            tag.id,
            tag.name.clone(),
            tag.description.clone().unwrap_or_default(),
            self.language.clone(),
        )
        .with_keywords(TAG_KEYWORDS)
    }

    fn build_user(&self, user: &User) -> SearchIndex {
        SearchIndex::new(
            EntityType::User,
            user.id,
            user.name(),
            user.bio.clone().unwrap_or_default(),
            self.language.clone(),
        )
        .with_keywords(USER_KEYWORDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_storage::Storage;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<Storage>, DocumentBuilder) {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp.path()).unwrap());
        let builder = DocumentBuilder::new(storage.clone(), "en");
        (temp, storage, builder)
    }

    #[test]
    fn test_build_post_with_tags_and_category() {
        let (_temp, storage, builder) = setup();
        storage.put_entity(&Tag::new(1, "rust").into()).unwrap();
        storage.put_entity(&Tag::new(2, "async").into()).unwrap();
        storage
            .put_entity(&Category::new(9, "Programming").into())
            .unwrap();

        let post = Post::new(5, "Tokio tips", "Spawn less, join more")
            .with_tags(vec![1, 2])
            .with_category(9);
        let doc = builder.build(&post.into()).unwrap();

        assert_eq!(doc.doc_key(), "post:5");
        assert_eq!(doc.title, "Tokio tips");
        assert_eq!(doc.content, "Spawn less, join more");
        assert_eq!(doc.keywords, "rust,async,Programming");
        assert_eq!(doc.language, "en");
    }

    #[test]
    fn test_build_post_without_relations() {
        let (_temp, _storage, builder) = setup();
        let doc = builder.build(&Post::new(1, "Bare", "body").into()).unwrap();
        assert!(doc.keywords.is_empty());
    }

    #[test]
    fn test_build_post_missing_tag_fails() {
        let (_temp, _storage, builder) = setup();
        let post = Post::new(1, "Orphaned tags", "body").with_tags(vec![42]);
        let err = builder.build(&post.into()).unwrap_err();
        assert!(err.is_build_failure());
    }

    #[test]
    fn test_build_post_missing_category_omits_keyword() {
        let (_temp, storage, builder) = setup();
        storage.put_entity(&Tag::new(1, "rust").into()).unwrap();

        let post = Post::new(5, "Lost", "body")
            .with_tags(vec![1])
            .with_category(99);
        let doc = builder.build(&post.into()).unwrap();
        assert_eq!(doc.keywords, "rust");
    }

    #[test]
    fn test_build_empty_title_fails() {
        let (_temp, _storage, builder) = setup();
        let err = builder.build(&Post::new(1, "  ", "body").into()).unwrap_err();
        assert!(err.is_build_failure());
    }

    #[test]
    fn test_build_zero_id_fails() {
        let (_temp, _storage, builder) = setup();
        let err = builder.build(&Tag::new(0, "ghost").into()).unwrap_err();
        assert!(err.is_build_failure());
    }

    #[test]
    fn test_build_batch_skips_failures_and_drafts() {
        let (_temp, _storage, builder) = setup();
        let entities: Vec<Entity> = vec![
            Post::new(1, "Good", "body").into(),
            Post::new(2, "", "malformed").into(),
            Post::new(3, "Draft", "body")
                .with_status(scribe_types::PostStatus::Draft)
                .into(),
            Post::new(4, "Also good", "body").into(),
        ];
        let batch = builder.build_batch(&entities).unwrap();
        let ids: Vec<_> = batch.docs.iter().map(|d| d.entity_id).collect();
        assert_eq!(ids, vec![1, 4]);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.skipped, 1);
    }

    #[test]
    fn test_build_category_uses_description() {
        let (_temp, _storage, builder) = setup();
        let category = Category::new(2, "Systems").with_description("Kernels and compilers");
        let doc = builder.build(&category.into()).unwrap();
        assert_eq!(doc.title, "Systems");
        assert_eq!(doc.content, "Kernels and compilers");
        assert_eq!(doc.keywords, "category");
    }

    #[test]
    fn test_build_tag_without_description() {
        let (_temp, _storage, builder) = setup();
        let doc = builder.build(&Tag::new(3, "wasm").into()).unwrap();
        assert_eq!(doc.content, "");
        assert_eq!(doc.keywords, "tag");
    }

    #[test]
    fn test_build_user() {
        let (_temp, _storage, builder) = setup();
        let mut user = User::new(7, "ferris");
        user.display_name = Some("Ferris".to_string());
        user.bio = Some("Crab".to_string());
        let doc = builder.build(&user.into()).unwrap();
        assert_eq!(doc.title, "Ferris");
        assert_eq!(doc.content, "Crab");
        assert_eq!(doc.keyword_list(), vec!["user", "author"]);
    }
}
