//! Dual-engine coordinator.
//!
//! Writes go to the primary and every fallback concurrently, each through
//! the retry policy. Reads go to the primary only. Engine errors are logged
//! and converted to `false` or empty results at this boundary.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use scribe_types::{
    EngineDocumentStats, EngineKind, EntityId, EntityType, SearchCriteria, SearchIndex,
    SearchResultSet,
};

use crate::engine::SearchEngine;
use crate::error::IndexingError;
use crate::retry::RetryPolicy;

fn accept_true(ok: &bool) -> bool {
    *ok
}

fn accept_any(_: &usize) -> bool {
    true
}

/// Per-role counts from a bulk write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    /// Documents the primary reported written (the canonical count)
    pub primary: usize,
    /// Documents written by the best fallback
    pub fallback: usize,
}

/// Routes writes to both engine roles and reads to the primary.
pub struct DualEngineCoordinator {
    primary: Arc<dyn SearchEngine>,
    fallbacks: Vec<Arc<dyn SearchEngine>>,
    retry: RetryPolicy,
}

impl DualEngineCoordinator {
    /// Select the first engine of kind `primary`; the rest become fallbacks.
    pub fn new(
        engines: Vec<Arc<dyn SearchEngine>>,
        primary: EngineKind,
        retry: RetryPolicy,
    ) -> Result<Self, IndexingError> {
        let position = engines
            .iter()
            .position(|e| e.kind() == primary)
            .ok_or_else(|| {
                IndexingError::Config(format!("no configured engine of kind {}", primary))
            })?;

        let mut fallbacks = engines;
        let primary = fallbacks.remove(position);

        info!(
            primary = primary.name(),
            fallbacks = ?fallbacks.iter().map(|e| e.name().to_string()).collect::<Vec<_>>(),
            "Engine roles selected"
        );

        Ok(Self {
            primary,
            fallbacks,
            retry,
        })
    }

    pub fn primary(&self) -> &Arc<dyn SearchEngine> {
        &self.primary
    }

    pub fn fallbacks(&self) -> &[Arc<dyn SearchEngine>] {
        &self.fallbacks
    }

    /// One retried boolean write on one engine, errors folded into `false`.
    async fn write_one<'a, F>(&self, engine: &'a dyn SearchEngine, operation: &str, call: F) -> bool
    where
        F: Fn(&'a dyn SearchEngine) -> futures::future::BoxFuture<'a, Result<bool, IndexingError>>,
    {
        match self
            .retry
            .run(engine.name(), operation, accept_true, || call(engine))
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                warn!(engine = engine.name(), operation, "Engine rejected write");
                false
            }
            Err(e) => {
                warn!(engine = engine.name(), operation, error = %e, "Engine write failed");
                false
            }
        }
    }

    /// Issue the same write to every engine concurrently.
    ///
    /// Returns `(primary_ok, fallback_results)`.
    async fn write_all<'a, F>(&'a self, operation: &str, call: F) -> (bool, Vec<bool>)
    where
        F: Fn(&'a dyn SearchEngine) -> futures::future::BoxFuture<'a, Result<bool, IndexingError>>
            + Copy,
    {
        let primary = self.write_one(self.primary.as_ref(), operation, call);
        let fallbacks = join_all(
            self.fallbacks
                .iter()
                .map(|engine| self.write_one(engine.as_ref(), operation, call)),
        );
        tokio::join!(primary, fallbacks)
    }

    /// Primary result, or any fallback's when the primary failed.
    fn resolve_write(&self, operation: &str, primary_ok: bool, fallback_ok: &[bool]) -> bool {
        if primary_ok {
            return true;
        }
        let absorbed = fallback_ok.iter().any(|ok| *ok);
        if absorbed {
            info!(operation, "Primary write failed, fallback absorbed it");
        } else if self.fallbacks.is_empty() {
            warn!(operation, "Primary write failed and no fallback is configured");
        } else {
            warn!(operation, "Write failed on every engine");
        }
        absorbed
    }

    pub async fn index_document(&self, doc: &SearchIndex) -> bool {
        let (primary_ok, fallback_ok) = self
            .write_all("index", |engine| engine.index_document(doc))
            .await;
        debug!(doc_key = %doc.doc_key(), primary_ok, "Index write complete");
        self.resolve_write("index", primary_ok, &fallback_ok)
    }

    pub async fn update_document(&self, doc: &SearchIndex) -> bool {
        let (primary_ok, fallback_ok) = self
            .write_all("update", |engine| engine.update_document(doc))
            .await;
        debug!(doc_key = %doc.doc_key(), primary_ok, "Update write complete");
        self.resolve_write("update", primary_ok, &fallback_ok)
    }

    /// Delete from every engine; succeeds if any engine no longer holds it.
    pub async fn delete_document(&self, entity_type: EntityType, entity_id: EntityId) -> bool {
        let (primary_ok, fallback_ok) = self
            .write_all("delete", |engine| {
                engine.delete_document(entity_type, entity_id)
            })
            .await;
        primary_ok || fallback_ok.iter().any(|ok| *ok)
    }

    async fn bulk_one(&self, engine: &dyn SearchEngine, docs: &[SearchIndex]) -> usize {
        match self
            .retry
            .run(engine.name(), "bulk_index", accept_any, || engine.bulk_index(docs))
            .await
        {
            Ok(count) => {
                if count < docs.len() {
                    warn!(
                        engine = engine.name(),
                        written = count,
                        requested = docs.len(),
                        "Bulk write incomplete"
                    );
                }
                count
            }
            Err(e) => {
                warn!(engine = engine.name(), error = %e, "Bulk write failed");
                0
            }
        }
    }

    /// Write a batch to the primary and, unconditionally, to every fallback.
    pub async fn bulk_index(&self, docs: &[SearchIndex]) -> BulkOutcome {
        if docs.is_empty() {
            return BulkOutcome::default();
        }
        let primary = self.bulk_one(self.primary.as_ref(), docs);
        let fallbacks = join_all(
            self.fallbacks
                .iter()
                .map(|engine| self.bulk_one(engine.as_ref(), docs)),
        );
        let (primary, fallbacks) = tokio::join!(primary, fallbacks);

        BulkOutcome {
            primary,
            fallback: fallbacks.into_iter().max().unwrap_or(0),
        }
    }

    /// Search the primary. Failures yield an empty result.
    pub async fn search(&self, criteria: &SearchCriteria) -> SearchResultSet {
        match self.primary.search(criteria).await {
            Ok(results) => results,
            Err(e) => {
                warn!(engine = self.primary.name(), error = %e, "Search failed");
                SearchResultSet::empty(self.primary.name())
            }
        }
    }

    /// Best-effort existence probe: a narrow identity search on the primary.
    pub async fn probe_primary(&self, entity_type: EntityType, entity_id: EntityId) -> bool {
        !self
            .search(&SearchCriteria::by_identity(entity_type, entity_id))
            .await
            .is_empty()
    }

    /// Ask every engine to clear its documents. Returns one entry per
    /// engine that failed.
    pub async fn rebuild_engines(&self) -> Vec<String> {
        let engines = std::iter::once(&self.primary).chain(self.fallbacks.iter());
        let results = join_all(engines.map(|engine| async move {
            match engine.rebuild_index().await {
                Ok(true) => None,
                Ok(false) => Some(format!("{}: rebuild declined", engine.name())),
                Err(e) => Some(format!("{}: {}", engine.name(), e)),
            }
        }))
        .await;

        let failures: Vec<String> = results.into_iter().flatten().collect();
        for failure in &failures {
            warn!(failure = %failure, "Engine rebuild failed");
        }
        failures
    }

    /// Run engine-specific compaction everywhere. True when all succeeded.
    pub async fn optimize(&self) -> bool {
        let engines = std::iter::once(&self.primary).chain(self.fallbacks.iter());
        let results = join_all(engines.map(|engine| async move {
            match engine.optimize().await {
                Ok(ok) => ok,
                Err(e) => {
                    warn!(engine = engine.name(), error = %e, "Optimize failed");
                    false
                }
            }
        }))
        .await;
        results.into_iter().all(|ok| ok)
    }

    pub async fn is_primary_healthy(&self) -> bool {
        self.primary.is_healthy().await
    }

    pub async fn primary_stats(&self) -> Option<EngineDocumentStats> {
        match self.primary.get_index_stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(engine = self.primary.name(), error = %e, "Stats unavailable");
                None
            }
        }
    }

    /// Native per-type count from the primary, if supported.
    pub async fn primary_count_by_type(&self, entity_type: EntityType) -> Option<u64> {
        match self.primary.count_by_type(entity_type).await {
            Ok(count) => count,
            Err(e) => {
                warn!(engine = self.primary.name(), %entity_type, error = %e, "Per-type count failed");
                None
            }
        }
    }
}
