//! Incremental reconciliation: make sure every indexable entity is present
//! in the primary engine.
//!
//! Each entity is probed with a narrow identity search. Present documents
//! are updated, missing ones are indexed. Removal is left to the orphan
//! cleaner, so `removed_from_search_engine` stays 0.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scribe_types::{Entity, EntityType, IndexSyncResult};

use crate::builder::DocumentBuilder;
use crate::coordinator::DualEngineCoordinator;
use crate::source::EntitySource;

/// Which entity types a sync pass covers.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub entity_types: Vec<EntityType>,
    pub batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            entity_types: vec![EntityType::Post],
            batch_size: 100,
        }
    }
}

impl SyncConfig {
    /// Cover every entity type, not just posts.
    pub fn all_types() -> Self {
        Self {
            entity_types: EntityType::ALL.to_vec(),
            ..Default::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

pub struct SyncReconciler {
    source: Arc<dyn EntitySource>,
    builder: Arc<DocumentBuilder>,
    coordinator: Arc<DualEngineCoordinator>,
    config: SyncConfig,
}

impl SyncReconciler {
    pub fn new(
        source: Arc<dyn EntitySource>,
        builder: Arc<DocumentBuilder>,
        coordinator: Arc<DualEngineCoordinator>,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            builder,
            coordinator,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one pass. Per-entity failures are recorded and the pass moves on.
    pub async fn run(&self, cancel: &CancellationToken) -> IndexSyncResult {
        let started = Instant::now();
        let mut result = IndexSyncResult::new();

        info!(types = ?self.config.entity_types, "Starting index sync");

        'types: for entity_type in &self.config.entity_types {
            let mut start_id = 0;
            loop {
                let page = match self
                    .source
                    .load_page(*entity_type, start_id, self.config.batch_size)
                {
                    Ok(page) => page,
                    Err(e) => {
                        warn!(%entity_type, error = %e, "Failed to load entities for sync");
                        result.record_error(format!("{}: {}", entity_type, e));
                        break;
                    }
                };
                let Some(last) = page.last() else {
                    break;
                };
                let next_start = last.id().checked_add(1);
                let page_len = page.len();

                for entity in &page {
                    if cancel.is_cancelled() {
                        info!("Sync cancelled");
                        result.cancelled = true;
                        break 'types;
                    }
                    self.sync_entity(entity, &mut result).await;
                }

                if page_len < self.config.batch_size {
                    break;
                }
                let Some(next) = next_start else {
                    break;
                };
                start_id = next;
            }
        }

        result.finish(started.elapsed().as_millis() as u64);
        info!(
            added = result.added_to_search_engine,
            updated = result.updated_in_search_engine,
            errors = result.errors.len(),
            elapsed_ms = result.elapsed_milliseconds,
            "Index sync complete"
        );
        result
    }

    async fn sync_entity(&self, entity: &Entity, result: &mut IndexSyncResult) {
        if !entity.is_indexable() {
            return;
        }

        let doc = match self.builder.build(entity) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(
                    entity_type = %entity.entity_type(),
                    id = entity.id(),
                    error = %e,
                    "Failed to build document during sync"
                );
                result.record_error(e.to_string());
                return;
            }
        };

        let present = self
            .coordinator
            .probe_primary(doc.entity_type, doc.entity_id)
            .await;

        if present {
            if self.coordinator.update_document(&doc).await {
                result.updated_in_search_engine += 1;
            } else {
                result.record_error(format!("{}: update failed", doc.doc_key()));
            }
        } else if self.coordinator.index_document(&doc).await {
            result.added_to_search_engine += 1;
        } else {
            result.record_error(format!("{}: index failed", doc.doc_key()));
        }

        debug!(doc_key = %doc.doc_key(), present, "Synced entity");
    }
}
