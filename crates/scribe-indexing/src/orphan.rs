//! Orphan cleanup: drop index rows whose entity is gone or no longer
//! indexable.
//!
//! A failed existence lookup keeps the row. Removing a live document is
//! worse than keeping a stale one for another pass.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scribe_types::{CleanupResult, SearchIndex};

use crate::coordinator::DualEngineCoordinator;
use crate::source::{EntitySource, IndexRowStore};

pub struct OrphanCleaner {
    source: Arc<dyn EntitySource>,
    rows: Arc<dyn IndexRowStore>,
    coordinator: Arc<DualEngineCoordinator>,
    batch_size: usize,
}

impl OrphanCleaner {
    pub fn new(
        source: Arc<dyn EntitySource>,
        rows: Arc<dyn IndexRowStore>,
        coordinator: Arc<DualEngineCoordinator>,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            rows,
            coordinator,
            batch_size: batch_size.max(1),
        }
    }

    /// Scan every active row once.
    pub async fn run(&self, cancel: &CancellationToken) -> CleanupResult {
        let mut result = CleanupResult::new();
        info!("Starting orphan cleanup");

        let mut start_id = 1;
        'pages: loop {
            let page = match self.rows.rows_page(start_id, self.batch_size) {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, "Failed to read index rows");
                    result.record_error(format!("row scan: {}", e));
                    break;
                }
            };
            let Some(last) = page.last() else {
                break;
            };
            let next_start = last.id.checked_add(1);
            let page_len = page.len();

            for row in page.iter().filter(|row| row.is_active) {
                if cancel.is_cancelled() {
                    info!("Orphan cleanup cancelled");
                    result.cancelled = true;
                    break 'pages;
                }
                result.scanned += 1;
                self.check_row(row, &mut result).await;
            }

            if page_len < self.batch_size {
                break;
            }
            let Some(next) = next_start else {
                break;
            };
            start_id = next;
        }

        info!(
            scanned = result.scanned,
            cleaned = result.cleaned,
            errors = result.errors.len(),
            "Orphan cleanup complete"
        );
        result
    }

    async fn check_row(&self, row: &SearchIndex, result: &mut CleanupResult) {
        let exists = match self.source.exists(row.entity_type, row.entity_id) {
            Ok(exists) => exists,
            Err(e) => {
                warn!(doc_key = %row.doc_key(), error = %e, "Existence check failed, keeping row");
                result.record_error(format!("{}: {}", row.doc_key(), e));
                return;
            }
        };
        if exists {
            return;
        }

        let removed_from_engines = self
            .coordinator
            .delete_document(row.entity_type, row.entity_id)
            .await;
        let removed_row = match self.rows.delete_row(row.id) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(doc_key = %row.doc_key(), error = %e, "Failed to delete index row");
                result.record_error(format!("{}: {}", row.doc_key(), e));
                false
            }
        };

        if removed_from_engines || removed_row {
            result.cleaned += 1;
            debug!(doc_key = %row.doc_key(), "Removed orphaned document");
        } else {
            result.record_error(format!("{}: orphan could not be removed", row.doc_key()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SearchEngine;
    use crate::error::IndexingError;
    use crate::mock::MockEngine;
    use crate::retry::RetryPolicy;
    use scribe_storage::Storage;
    use scribe_types::{
        EngineKind, Entity, EntityId, EntityType, OperationOutcome, Post, PostStatus, Tag,
    };
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        storage: Arc<Storage>,
        primary: Arc<MockEngine>,
        coordinator: Arc<DualEngineCoordinator>,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp.path()).unwrap());
        let primary = Arc::new(MockEngine::with_kind("primary", EngineKind::Tantivy));
        let coordinator = Arc::new(
            DualEngineCoordinator::new(
                vec![primary.clone() as Arc<dyn SearchEngine>],
                EngineKind::Tantivy,
                RetryPolicy::disabled(),
            )
            .unwrap(),
        );
        Fixture {
            _temp: temp,
            storage,
            primary,
            coordinator,
        }
    }

    async fn index_row(f: &Fixture, entity_type: EntityType, id: EntityId) {
        let doc = SearchIndex::new(entity_type, id, format!("doc {}", id), "", "en");
        f.storage.upsert_search_index(&doc).unwrap();
        f.primary.index_document(&doc).await.unwrap();
    }

    #[tokio::test]
    async fn test_removes_missing_and_unpublished() {
        let f = fixture();
        f.storage.put_entity(&Post::new(1, "Live", "x").into()).unwrap();
        f.storage
            .put_entity(
                &Post::new(2, "Unpublished", "x")
                    .with_status(PostStatus::Draft)
                    .into(),
            )
            .unwrap();
        for id in 1..=3 {
            index_row(&f, EntityType::Post, id).await;
        }

        let cleaner = OrphanCleaner::new(f.storage.clone(), f.storage.clone(), f.coordinator.clone(), 2);
        let result = cleaner.run(&CancellationToken::new()).await;

        assert_eq!(result.scanned, 3);
        assert_eq!(result.cleaned, 2);
        assert!(result.errors.is_empty());
        assert!(f.primary.get(EntityType::Post, 1).is_some());
        assert!(f.primary.get(EntityType::Post, 2).is_none());
        assert!(f.storage.find_search_index(EntityType::Post, 3).unwrap().is_none());
        assert_eq!(result.outcome(), OperationOutcome::Success);
    }

    #[tokio::test]
    async fn test_checks_every_entity_type() {
        let f = fixture();
        f.storage.put_entity(&Tag::new(1, "kept").into()).unwrap();
        index_row(&f, EntityType::Tag, 1).await;
        index_row(&f, EntityType::Tag, 2).await;
        index_row(&f, EntityType::User, 9).await;

        let cleaner = OrphanCleaner::new(f.storage.clone(), f.storage.clone(), f.coordinator.clone(), 100);
        let result = cleaner.run(&CancellationToken::new()).await;
        assert_eq!(result.cleaned, 2);
        assert_eq!(f.storage.search_index_summary().unwrap().active_rows, 1);
    }

    #[tokio::test]
    async fn test_second_pass_is_noop() {
        let f = fixture();
        index_row(&f, EntityType::Post, 5).await;
        let cleaner = OrphanCleaner::new(f.storage.clone(), f.storage.clone(), f.coordinator.clone(), 100);

        assert_eq!(cleaner.run(&CancellationToken::new()).await.cleaned, 1);
        let second = cleaner.run(&CancellationToken::new()).await;
        assert_eq!(second.scanned, 0);
        assert_eq!(second.cleaned, 0);
    }

    struct UncertainSource;

    impl EntitySource for UncertainSource {
        fn load(
            &self,
            _entity_type: EntityType,
            _id: EntityId,
        ) -> Result<Option<Entity>, IndexingError> {
            Err(IndexingError::Engine("lookup timed out".into()))
        }

        fn load_page(
            &self,
            _entity_type: EntityType,
            _start_id: EntityId,
            _limit: usize,
        ) -> Result<Vec<Entity>, IndexingError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_lookup_error_keeps_row() {
        let f = fixture();
        index_row(&f, EntityType::Post, 1).await;

        let cleaner = OrphanCleaner::new(
            Arc::new(UncertainSource),
            f.storage.clone(),
            f.coordinator.clone(),
            100,
        );
        let result = cleaner.run(&CancellationToken::new()).await;

        assert_eq!(result.scanned, 1);
        assert_eq!(result.cleaned, 0);
        assert_eq!(result.errors.len(), 1);
        assert!(f.primary.get(EntityType::Post, 1).is_some());
        assert!(f.storage.find_search_index(EntityType::Post, 1).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_row_removed_even_if_engine_fails() {
        let f = fixture();
        index_row(&f, EntityType::Post, 1).await;
        f.primary.set_fail_writes(true);

        let cleaner = OrphanCleaner::new(f.storage.clone(), f.storage.clone(), f.coordinator.clone(), 100);
        let result = cleaner.run(&CancellationToken::new()).await;
        assert_eq!(result.cleaned, 1);
        assert!(f.storage.find_search_index(EntityType::Post, 1).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_cleanup() {
        let f = fixture();
        index_row(&f, EntityType::Post, 1).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let cleaner = OrphanCleaner::new(f.storage.clone(), f.storage.clone(), f.coordinator.clone(), 100);
        let result = cleaner.run(&cancel).await;
        assert!(result.cancelled);
        assert_eq!(result.scanned, 0);
        assert!(f.primary.get(EntityType::Post, 1).is_some());
    }
}
