//! Result and status types reported by index maintenance operations.
//!
//! None of these operations fail across their boundary; partial progress is
//! reported through counters, an error list and an [`OperationOutcome`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityType;

/// Coarse outcome of a multi-item maintenance pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    /// Everything attempted succeeded
    Success,
    /// Some items succeeded, some failed or the pass stopped early
    Partial,
    /// Nothing succeeded
    Failed,
}

impl OperationOutcome {
    fn classify(succeeded: u64, clean: bool) -> Self {
        match (clean, succeeded) {
            (true, _) => OperationOutcome::Success,
            (false, 0) => OperationOutcome::Failed,
            (false, _) => OperationOutcome::Partial,
        }
    }
}

/// Read-only snapshot of an engine's document storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineDocumentStats {
    pub document_count: u64,
    pub size_in_bytes: u64,
}

/// Phases of a full rebuild, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildPhase {
    Start,
    RebuildEngines,
    ReindexPosts,
    ReindexCategories,
    ReindexTags,
    ReindexUsers,
    Aggregate,
    Done,
}

impl RebuildPhase {
    /// Reindex phase for an entity type.
    pub fn reindex(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Post => RebuildPhase::ReindexPosts,
            EntityType::Category => RebuildPhase::ReindexCategories,
            EntityType::Tag => RebuildPhase::ReindexTags,
            EntityType::User => RebuildPhase::ReindexUsers,
        }
    }
}

impl fmt::Display for RebuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RebuildPhase::Start => "start",
            RebuildPhase::RebuildEngines => "rebuild_engines",
            RebuildPhase::ReindexPosts => "reindex_posts",
            RebuildPhase::ReindexCategories => "reindex_categories",
            RebuildPhase::ReindexTags => "reindex_tags",
            RebuildPhase::ReindexUsers => "reindex_users",
            RebuildPhase::Aggregate => "aggregate",
            RebuildPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Result of a full-corpus rebuild.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexRebuildResult {
    /// Sum of `entity_type_counts`
    pub total_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Successfully indexed documents per entity type
    pub entity_type_counts: BTreeMap<EntityType, u64>,
    pub elapsed_milliseconds: u64,
    pub errors: Vec<String>,
    pub success: bool,
    /// Phase in which an unexpected error stopped the pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted_at: Option<RebuildPhase>,
    #[serde(default)]
    pub cancelled: bool,
}

impl IndexRebuildResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record successfully indexed documents of one type.
    pub fn record_success(&mut self, entity_type: EntityType, count: u64) {
        *self.entity_type_counts.entry(entity_type).or_insert(0) += count;
        self.success_count += count;
    }

    /// Record documents that could not be built or written.
    pub fn record_failure(&mut self, count: u64) {
        self.failure_count += count;
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Compute derived totals once all phases ran.
    pub fn aggregate(&mut self) {
        self.total_count = self.entity_type_counts.values().sum();
        self.success = self.failure_count == 0 && self.aborted_at.is_none() && !self.cancelled;
    }

    /// Stop the pass in `phase` because of an unexpected error.
    pub fn abort(&mut self, phase: RebuildPhase, error: impl Into<String>) {
        self.record_error(error);
        self.aborted_at = Some(phase);
        self.total_count = self.entity_type_counts.values().sum();
        self.success = false;
    }

    pub fn count_for(&self, entity_type: EntityType) -> u64 {
        self.entity_type_counts
            .get(&entity_type)
            .copied()
            .unwrap_or(0)
    }

    pub fn outcome(&self) -> OperationOutcome {
        OperationOutcome::classify(self.success_count, self.success)
    }
}

/// Result of an incremental reconciliation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSyncResult {
    pub added_to_search_engine: u64,
    pub updated_in_search_engine: u64,
    /// Always 0: removals are owned by the orphan cleaner
    pub removed_from_search_engine: u64,
    pub elapsed_milliseconds: u64,
    pub errors: Vec<String>,
    pub success: bool,
    #[serde(default)]
    pub cancelled: bool,
}

impl IndexSyncResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn finish(&mut self, elapsed_ms: u64) {
        self.elapsed_milliseconds = elapsed_ms;
        self.success = self.errors.is_empty() && !self.cancelled;
    }

    pub fn outcome(&self) -> OperationOutcome {
        OperationOutcome::classify(
            self.added_to_search_engine + self.updated_in_search_engine,
            self.success,
        )
    }
}

/// Result of an orphan cleanup pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupResult {
    /// Active rows examined
    pub scanned: u64,
    /// Orphaned rows removed
    pub cleaned: u64,
    pub errors: Vec<String>,
    #[serde(default)]
    pub cancelled: bool,
}

impl CleanupResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn outcome(&self) -> OperationOutcome {
        OperationOutcome::classify(
            self.scanned,
            self.errors.is_empty() && !self.cancelled,
        )
    }
}

/// Per-type document counts in both stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStats {
    pub database_count: u64,
    pub search_engine_count: u64,
    /// True when `search_engine_count` was copied from the database count
    /// because the engine cannot count per type.
    pub estimated: bool,
}

/// Aggregated health and size of the index subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStatus {
    pub is_search_engine_healthy: bool,
    pub database_index_count: u64,
    pub search_engine_index_count: u64,
    pub index_size_in_bytes: u64,
    pub entity_stats: BTreeMap<EntityType, EntityStats>,
    /// Newest `updated_at` among active rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<DateTime<Utc>>,
}
