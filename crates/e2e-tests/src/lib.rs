//! End-to-end test infrastructure for scribe.
//!
//! Provides a shared TestHarness wiring real RocksDB storage, a Tantivy
//! primary and the row-store fallback behind an `IndexService`, plus
//! corpus helpers.

use std::path::PathBuf;
use std::sync::Arc;

use scribe_indexing::{
    DatabaseEngine, DualEngineCoordinator, IndexService, MockEngine, RetryPolicy, SearchEngine,
    ServiceConfig, TantivyEngine,
};
use scribe_search::DocumentIndexConfig;
use scribe_storage::Storage;
use scribe_types::{
    Category, EngineKind, Entity, EntityId, EntityType, Post, PostStatus, SearchCriteria,
    SearchHit, Tag, User,
};

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// System-of-record and derived-index row store
    pub storage: Arc<Storage>,
    /// Path for the Tantivy index files
    pub index_path: PathBuf,
    pub primary: Arc<dyn SearchEngine>,
    pub fallback: Arc<DatabaseEngine>,
    pub service: IndexService,
}

impl TestHarness {
    /// Tantivy primary, row-store fallback.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let index_path = temp_dir.path().join("search-index");
        let tantivy = TantivyEngine::open(DocumentIndexConfig::new(&index_path))
            .expect("Failed to open tantivy engine");
        Self::build(temp_dir, index_path, Arc::new(tantivy))
    }

    /// Mock primary reporting kind Tantivy, row-store fallback. The mock is
    /// returned so the test can inject failures.
    pub fn with_mock_primary() -> (Self, Arc<MockEngine>) {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let index_path = temp_dir.path().join("search-index");
        let mock = Arc::new(MockEngine::with_kind("mock-primary", EngineKind::Tantivy));
        let harness = Self::build(temp_dir, index_path, mock.clone());
        (harness, mock)
    }

    fn build(
        temp_dir: tempfile::TempDir,
        index_path: PathBuf,
        primary: Arc<dyn SearchEngine>,
    ) -> Self {
        let storage = Arc::new(
            Storage::open(&temp_dir.path().join("db")).expect("Failed to open test storage"),
        );
        let fallback = Arc::new(DatabaseEngine::new(storage.clone()));

        let engines: Vec<Arc<dyn SearchEngine>> = vec![primary.clone(), fallback.clone()];
        let coordinator = Arc::new(
            DualEngineCoordinator::new(engines, EngineKind::Tantivy, RetryPolicy::immediate(2))
                .expect("Failed to build coordinator"),
        );
        let service = IndexService::new(
            storage.clone(),
            storage.clone(),
            coordinator,
            ServiceConfig {
                batch_size: 3,
                ..Default::default()
            },
        );

        Self {
            _temp_dir: temp_dir,
            storage,
            index_path,
            primary,
            fallback,
            service,
        }
    }

    pub fn put(&self, entity: impl Into<Entity>) {
        self.storage
            .put_entity(&entity.into())
            .expect("Failed to store entity");
    }

    /// Identity lookup against one engine.
    pub async fn lookup(
        engine: &dyn SearchEngine,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Option<SearchHit> {
        engine
            .search(&SearchCriteria::by_identity(entity_type, entity_id))
            .await
            .expect("Engine search failed")
            .hits
            .into_iter()
            .next()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Create `count` published posts with ids starting at `first_id`.
pub fn create_posts(first_id: EntityId, count: u64, topic: &str) -> Vec<Post> {
    (first_id..first_id + count)
        .map(|id| {
            Post::new(
                id,
                format!("{} part {}", topic, id),
                format!("Notes on {} number {}", topic, id),
            )
        })
        .collect()
}

/// Small mixed corpus: 6 published posts and one draft, 2 categories,
/// 3 tags, 2 users.
pub fn seed_corpus(harness: &TestHarness) {
    harness.put(Category::new(1, "Systems").with_description("Kernels and runtimes"));
    harness.put(Category::new(2, "Web"));
    harness.put(Tag::new(1, "rust"));
    harness.put(Tag::new(2, "tokio"));
    harness.put(Tag::new(3, "wasm"));
    harness.put(User::new(1, "ferris"));
    harness.put(User::new(2, "corro"));

    for (i, post) in create_posts(1, 6, "Async Rust").into_iter().enumerate() {
        let post = if i % 2 == 0 {
            post.with_tags(vec![1, 2]).with_category(1)
        } else {
            post.with_tags(vec![3]).with_category(2)
        };
        harness.put(post);
    }
    harness.put(Post::new(7, "Unfinished", "draft").with_status(PostStatus::Draft));
}
