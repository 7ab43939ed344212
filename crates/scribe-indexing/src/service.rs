//! `IndexService`: the single entry point used by the query-time service
//! and by operational tooling.
//!
//! Every operation returns a value. Failures are logged and reported as
//! `false`, zero counts or result objects; nothing propagates to the caller.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scribe_search::DocumentIndexConfig;
use scribe_storage::Storage;
use scribe_types::{
    CleanupResult, Entity, EntityId, EntityType, IndexRebuildResult, IndexStatus,
    IndexSyncResult, Post, SearchCriteria, SearchIndex, SearchResultSet, Settings,
};

use crate::builder::DocumentBuilder;
use crate::coordinator::DualEngineCoordinator;
use crate::database_engine::DatabaseEngine;
use crate::engine::SearchEngine;
use crate::error::IndexingError;
use crate::orphan::OrphanCleaner;
use crate::rebuild::RebuildOrchestrator;
use crate::retry::RetryPolicy;
use crate::source::{EntitySource, IndexRowStore};
use crate::status::StatusReporter;
use crate::sync::{SyncConfig, SyncReconciler};
use crate::tantivy_engine::TantivyEngine;

/// Tunables for the maintenance passes.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub language: String,
    pub batch_size: usize,
    pub sync: SyncConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            batch_size: 100,
            sync: SyncConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            language: settings.language.clone(),
            batch_size: settings.maintenance.batch_size,
            sync: SyncConfig::default().with_batch_size(settings.maintenance.batch_size),
        }
    }
}

/// Facade over the indexing components.
pub struct IndexService {
    source: Arc<dyn EntitySource>,
    builder: Arc<DocumentBuilder>,
    coordinator: Arc<DualEngineCoordinator>,
    rebuild: RebuildOrchestrator,
    sync: SyncReconciler,
    cleaner: OrphanCleaner,
    status: StatusReporter,
    batch_size: usize,
}

impl IndexService {
    /// Assemble the service from injected stores and a ready coordinator.
    pub fn new(
        source: Arc<dyn EntitySource>,
        rows: Arc<dyn IndexRowStore>,
        coordinator: Arc<DualEngineCoordinator>,
        config: ServiceConfig,
    ) -> Self {
        let batch_size = config.batch_size.max(1);
        let builder = Arc::new(DocumentBuilder::new(source.clone(), config.language));

        let rebuild = RebuildOrchestrator::new(
            source.clone(),
            builder.clone(),
            coordinator.clone(),
            batch_size,
        );
        let sync = SyncReconciler::new(
            source.clone(),
            builder.clone(),
            coordinator.clone(),
            config.sync,
        );
        let cleaner = OrphanCleaner::new(
            source.clone(),
            rows.clone(),
            coordinator.clone(),
            batch_size,
        );
        let status = StatusReporter::new(rows, coordinator.clone());

        Self {
            source,
            builder,
            coordinator,
            rebuild,
            sync,
            cleaner,
            status,
            batch_size,
        }
    }

    /// Wire the standard engine pair over one RocksDB store: Tantivy at
    /// `search_index_path` and the row-store engine.
    pub fn open(settings: &Settings, storage: Arc<Storage>) -> Result<Self, IndexingError> {
        settings.retry.validate().map_err(IndexingError::Config)?;

        let tantivy = TantivyEngine::open(DocumentIndexConfig::from_settings(settings))?;
        let database = DatabaseEngine::new(storage.clone());
        let engines: Vec<Arc<dyn SearchEngine>> = vec![Arc::new(tantivy), Arc::new(database)];

        let coordinator = Arc::new(DualEngineCoordinator::new(
            engines,
            settings.engines.primary,
            RetryPolicy::from_settings(&settings.retry),
        )?);

        Ok(Self::new(
            storage.clone(),
            storage,
            coordinator,
            ServiceConfig::from_settings(settings),
        ))
    }

    pub fn coordinator(&self) -> &Arc<DualEngineCoordinator> {
        &self.coordinator
    }

    /// Load, build and write one entity. False when the entity is missing,
    /// not indexable, fails to build, or no engine accepted the write.
    pub async fn index_entity(&self, entity_type: EntityType, id: EntityId) -> bool {
        let entity = match self.source.load(entity_type, id) {
            Ok(Some(entity)) => entity,
            Ok(None) => {
                warn!(%entity_type, id, "Cannot index missing entity");
                return false;
            }
            Err(e) => {
                warn!(%entity_type, id, error = %e, "Failed to load entity");
                return false;
            }
        };

        if !entity.is_indexable() {
            debug!(%entity_type, id, "Entity is not indexable");
            return false;
        }

        match self.builder.build(&entity) {
            Ok(doc) => self.coordinator.index_document(&doc).await,
            Err(e) => {
                warn!(%entity_type, id, error = %e, "Failed to build document");
                false
            }
        }
    }

    pub async fn remove_entity(&self, entity_type: EntityType, id: EntityId) -> bool {
        let removed = self.coordinator.delete_document(entity_type, id).await;
        debug!(%entity_type, id, removed, "Remove entity");
        removed
    }

    /// Re-index one entity. A missing or no-longer-indexable entity is
    /// removed from the index instead.
    pub async fn update_entity(&self, entity_type: EntityType, id: EntityId) -> bool {
        let entity = match self.source.load(entity_type, id) {
            Ok(entity) => entity,
            Err(e) => {
                warn!(%entity_type, id, error = %e, "Failed to load entity");
                return false;
            }
        };

        match entity {
            Some(entity) if entity.is_indexable() => match self.builder.build(&entity) {
                Ok(doc) => self.coordinator.update_document(&doc).await,
                Err(e) => {
                    warn!(%entity_type, id, error = %e, "Failed to build document");
                    false
                }
            },
            _ => {
                info!(%entity_type, id, "Entity gone or not indexable, removing from index");
                self.remove_entity(entity_type, id).await
            }
        }
    }

    /// Index a caller-supplied batch of posts. Returns how many the primary
    /// engine wrote. Unpublished posts are skipped, as is any post that
    /// fails to build for whatever reason; the rest of its chunk still goes
    /// out.
    pub async fn bulk_index_posts(&self, posts: &[Post]) -> usize {
        let mut written = 0;
        let mut failed = 0;
        for chunk in posts.chunks(self.batch_size) {
            let mut docs: Vec<SearchIndex> = Vec::with_capacity(chunk.len());
            for post in chunk {
                let entity = Entity::from(post.clone());
                if !entity.is_indexable() {
                    continue;
                }
                match self.builder.build(&entity) {
                    Ok(doc) => docs.push(doc),
                    Err(e) => {
                        warn!(post_id = post.id, error = %e, "Skipping post that failed to build");
                        failed += 1;
                    }
                }
            }
            if !docs.is_empty() {
                written += self.coordinator.bulk_index(&docs).await.primary;
            }
        }
        info!(requested = posts.len(), written, failed, "Bulk indexed posts");
        written
    }

    pub async fn rebuild_all_indexes(&self, cancel: &CancellationToken) -> IndexRebuildResult {
        self.rebuild.run(cancel).await
    }

    pub async fn sync_indexes(&self, cancel: &CancellationToken) -> IndexSyncResult {
        self.sync.run(cancel).await
    }

    pub async fn cleanup_invalid_indexes(&self, cancel: &CancellationToken) -> CleanupResult {
        self.cleaner.run(cancel).await
    }

    pub async fn get_index_status(&self) -> IndexStatus {
        self.status.report().await
    }

    /// Orphan cleanup followed by engine compaction.
    pub async fn optimize_index(&self, cancel: &CancellationToken) -> bool {
        let cleanup = self.cleaner.run(cancel).await;
        if cleanup.cancelled || cancel.is_cancelled() {
            info!("Optimize cancelled before compaction");
            return false;
        }
        let compacted = self.coordinator.optimize().await;
        info!(cleaned = cleanup.cleaned, compacted, "Optimize complete");
        compacted && cleanup.errors.is_empty()
    }

    /// Query the primary engine.
    pub async fn search(&self, criteria: &SearchCriteria) -> SearchResultSet {
        self.coordinator.search(criteria).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;
    use scribe_types::{EngineKind, PostStatus, Tag};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        storage: Arc<Storage>,
        primary: Arc<MockEngine>,
        fallback: Arc<MockEngine>,
        service: IndexService,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp.path()).unwrap());
        let primary = Arc::new(MockEngine::with_kind("primary", EngineKind::Tantivy));
        let fallback = Arc::new(MockEngine::with_kind("fallback", EngineKind::Database));
        let engines: Vec<Arc<dyn SearchEngine>> = vec![primary.clone(), fallback.clone()];
        let coordinator = Arc::new(
            DualEngineCoordinator::new(engines, EngineKind::Tantivy, RetryPolicy::disabled())
                .unwrap(),
        );
        let service = IndexService::new(
            storage.clone(),
            storage.clone(),
            coordinator,
            ServiceConfig {
                batch_size: 2,
                ..Default::default()
            },
        );
        Fixture {
            _temp: temp,
            storage,
            primary,
            fallback,
            service,
        }
    }

    #[tokio::test]
    async fn test_index_entity_writes_both_engines() {
        let f = fixture();
        f.storage.put_entity(&Post::new(1, "Hello", "World").into()).unwrap();

        assert!(f.service.index_entity(EntityType::Post, 1).await);
        assert_eq!(f.primary.get(EntityType::Post, 1).unwrap().title, "Hello");
        assert_eq!(f.fallback.get(EntityType::Post, 1).unwrap().title, "Hello");
    }

    #[tokio::test]
    async fn test_index_entity_missing_or_draft() {
        let f = fixture();
        f.storage
            .put_entity(&Post::new(2, "Draft", "x").with_status(PostStatus::Draft).into())
            .unwrap();

        assert!(!f.service.index_entity(EntityType::Post, 1).await);
        assert!(!f.service.index_entity(EntityType::Post, 2).await);
        assert!(f.primary.is_empty());
    }

    #[tokio::test]
    async fn test_update_entity_removes_unpublished() {
        let f = fixture();
        f.storage.put_entity(&Post::new(1, "Live", "x").into()).unwrap();
        f.service.index_entity(EntityType::Post, 1).await;

        f.storage
            .put_entity(&Post::new(1, "Live", "x").with_status(PostStatus::Archived).into())
            .unwrap();
        assert!(f.service.update_entity(EntityType::Post, 1).await);
        assert!(f.primary.get(EntityType::Post, 1).is_none());
    }

    #[tokio::test]
    async fn test_update_entity_rewrites_document() {
        let f = fixture();
        f.storage.put_entity(&Tag::new(1, "rust").into()).unwrap();
        f.service.index_entity(EntityType::Tag, 1).await;

        f.storage.put_entity(&Tag::new(1, "rustlang").into()).unwrap();
        assert!(f.service.update_entity(EntityType::Tag, 1).await);
        assert_eq!(f.primary.get(EntityType::Tag, 1).unwrap().title, "rustlang");
    }

    #[tokio::test]
    async fn test_remove_entity() {
        let f = fixture();
        f.storage.put_entity(&Post::new(1, "Gone soon", "x").into()).unwrap();
        f.service.index_entity(EntityType::Post, 1).await;

        assert!(f.service.remove_entity(EntityType::Post, 1).await);
        assert!(f.primary.is_empty());
        assert!(f.fallback.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_index_posts_counts_primary() {
        let f = fixture();
        let posts = vec![
            Post::new(1, "a", "x"),
            Post::new(2, "b", "x"),
            Post::new(3, "c", "x").with_status(PostStatus::Draft),
            Post::new(4, "d", "x"),
            Post::new(5, "", "x"),
        ];
        assert_eq!(f.service.bulk_index_posts(&posts).await, 3);
        assert_eq!(f.primary.len(), 3);

        f.primary.set_fail_writes(true);
        assert_eq!(f.service.bulk_index_posts(&posts).await, 0);
    }

    /// Storage-backed source whose lookup of one tag fails.
    struct BrokenTagSource {
        storage: Arc<Storage>,
        broken_tag: EntityId,
    }

    impl EntitySource for BrokenTagSource {
        fn load(
            &self,
            entity_type: EntityType,
            id: EntityId,
        ) -> Result<Option<Entity>, IndexingError> {
            if entity_type == EntityType::Tag && id == self.broken_tag {
                return Err(IndexingError::Engine("tag lookup timed out".into()));
            }
            self.storage.load(entity_type, id)
        }

        fn load_page(
            &self,
            entity_type: EntityType,
            start_id: EntityId,
            limit: usize,
        ) -> Result<Vec<Entity>, IndexingError> {
            self.storage.load_page(entity_type, start_id, limit)
        }
    }

    #[tokio::test]
    async fn test_bulk_index_posts_lookup_error_skips_one_post() {
        let f = fixture();
        f.storage.put_entity(&Tag::new(13, "unreachable").into()).unwrap();
        let source = Arc::new(BrokenTagSource {
            storage: f.storage.clone(),
            broken_tag: 13,
        });
        let service = IndexService::new(
            source,
            f.storage.clone(),
            f.service.coordinator().clone(),
            ServiceConfig {
                batch_size: 10,
                ..Default::default()
            },
        );

        let posts: Vec<Post> = (1..=10)
            .map(|id| {
                let post = Post::new(id, format!("Post {}", id), "body");
                if id == 5 {
                    post.with_tags(vec![13])
                } else {
                    post
                }
            })
            .collect();

        assert_eq!(service.bulk_index_posts(&posts).await, 9);
        assert!(f.primary.get(EntityType::Post, 5).is_none());
        assert!(f.primary.get(EntityType::Post, 6).is_some());
    }

    #[tokio::test]
    async fn test_optimize_runs_cleanup() {
        let f = fixture();
        f.storage
            .upsert_search_index(&scribe_types::SearchIndex::new(
                EntityType::Post,
                9,
                "orphan",
                "",
                "en",
            ))
            .unwrap();

        assert!(f.service.optimize_index(&CancellationToken::new()).await);
        assert_eq!(f.storage.search_index_summary().unwrap().total_rows, 0);
    }

    #[tokio::test]
    async fn test_optimize_cancelled() {
        let f = fixture();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!f.service.optimize_index(&cancel).await);
    }

    #[tokio::test]
    async fn test_open_from_settings() {
        let temp = TempDir::new().unwrap();
        let settings = Settings {
            db_path: temp.path().join("db").to_string_lossy().to_string(),
            search_index_path: temp.path().join("index").to_string_lossy().to_string(),
            ..Default::default()
        };
        let storage = Arc::new(Storage::open(&settings.expanded_db_path()).unwrap());
        let service = IndexService::open(&settings, storage.clone()).unwrap();
        assert_eq!(service.coordinator().primary().name(), "tantivy");
        assert_eq!(service.coordinator().fallbacks()[0].name(), "database");

        storage.put_entity(&Post::new(1, "Searchable title", "body").into()).unwrap();
        assert!(service.index_entity(EntityType::Post, 1).await);

        let results = service.search(&SearchCriteria::new("searchable")).await;
        assert_eq!(results.total, 1);
        assert_eq!(results.engine, "tantivy");
        assert_eq!(storage.search_index_summary().unwrap().active_rows, 1);
    }
}
