//! Full-corpus rebuild.
//!
//! One sequential pass:
//! `Start -> RebuildEngines -> ReindexPosts -> ReindexCategories ->
//! ReindexTags -> ReindexUsers -> Aggregate -> Done`.
//!
//! Each reindex phase pages through the entity source and writes every page
//! as one bulk write. An unexpected error aborts the remaining phases;
//! counts from completed pages are kept.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use scribe_types::{EntityType, IndexRebuildResult, RebuildPhase};

use crate::builder::DocumentBuilder;
use crate::coordinator::DualEngineCoordinator;
use crate::error::IndexingError;
use crate::source::EntitySource;

/// Drives a full rebuild of every engine.
pub struct RebuildOrchestrator {
    source: Arc<dyn EntitySource>,
    builder: Arc<DocumentBuilder>,
    coordinator: Arc<DualEngineCoordinator>,
    batch_size: usize,
}

impl RebuildOrchestrator {
    pub fn new(
        source: Arc<dyn EntitySource>,
        builder: Arc<DocumentBuilder>,
        coordinator: Arc<DualEngineCoordinator>,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            builder,
            coordinator,
            batch_size: batch_size.max(1),
        }
    }

    /// Run the rebuild. Never fails; problems are reported in the result.
    pub async fn run(&self, cancel: &CancellationToken) -> IndexRebuildResult {
        let started = Instant::now();
        let mut result = IndexRebuildResult::new();

        info!(phase = %RebuildPhase::Start, batch_size = self.batch_size, "Starting index rebuild");

        if cancel.is_cancelled() {
            result.cancelled = true;
            result.aggregate();
            result.elapsed_milliseconds = started.elapsed().as_millis() as u64;
            return result;
        }

        info!(phase = %RebuildPhase::RebuildEngines, "Clearing engines");
        // An engine that was not cleared may still serve stale documents
        for failure in self.coordinator.rebuild_engines().await {
            result.record_failure(1);
            result.record_error(failure);
        }

        for entity_type in EntityType::ALL {
            let phase = RebuildPhase::reindex(entity_type);

            if cancel.is_cancelled() {
                info!(phase = %phase, "Rebuild cancelled");
                result.cancelled = true;
                break;
            }

            info!(phase = %phase, "Reindexing");
            if let Err(e) = self.reindex_type(entity_type, &mut result, cancel).await {
                error!(phase = %phase, error = %e, "Rebuild aborted");
                result.abort(phase, format!("{}: {}", phase, e));
                result.elapsed_milliseconds = started.elapsed().as_millis() as u64;
                return result;
            }
        }

        debug!(phase = %RebuildPhase::Aggregate, "Aggregating counts");
        result.aggregate();
        result.elapsed_milliseconds = started.elapsed().as_millis() as u64;

        info!(
            phase = %RebuildPhase::Done,
            total = result.total_count,
            failures = result.failure_count,
            elapsed_ms = result.elapsed_milliseconds,
            cancelled = result.cancelled,
            "Index rebuild complete"
        );
        result
    }

    async fn reindex_type(
        &self,
        entity_type: EntityType,
        result: &mut IndexRebuildResult,
        cancel: &CancellationToken,
    ) -> Result<(), IndexingError> {
        // Ensure every type appears in the counts, even when empty
        result.record_success(entity_type, 0);

        let mut start_id = 0;
        loop {
            let page = self
                .source
                .load_page(entity_type, start_id, self.batch_size)?;
            let Some(last) = page.last() else {
                break;
            };
            // Ids are unique; u64::MAX can only be the final row
            let next_start = last.id().checked_add(1);
            let page_len = page.len();

            let batch = self.builder.build_batch(&page)?;
            let built = batch.docs.len();
            result.record_failure(batch.failures.len() as u64);
            for failure in batch.failures {
                result.record_error(failure);
            }

            if built > 0 {
                let outcome = self.coordinator.bulk_index(&batch.docs).await;
                let written = outcome.primary.min(built);
                result.record_success(entity_type, written as u64);
                if written < built {
                    let missing = built - written;
                    result.record_failure(missing as u64);
                    result.record_error(format!(
                        "{}: primary wrote {} of {} documents",
                        entity_type, written, built
                    ));
                    warn!(%entity_type, written, built, "Bulk write incomplete during rebuild");
                }
            }

            debug!(
                %entity_type,
                page = page_len,
                built,
                skipped = batch.skipped,
                "Rebuilt page"
            );

            if page_len < self.batch_size {
                break;
            }
            let Some(next) = next_start else {
                break;
            };
            start_id = next;
            if cancel.is_cancelled() {
                info!(%entity_type, "Rebuild cancelled mid-phase");
                result.cancelled = true;
                break;
            }
        }

        info!(%entity_type, indexed = result.count_for(entity_type), "Phase complete");
        Ok(())
    }
}
