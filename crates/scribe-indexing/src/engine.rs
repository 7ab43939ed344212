//! Search engine abstraction.
//!
//! Each backend (Tantivy, the row-store scan, the in-memory mock) implements
//! [`SearchEngine`]. The coordinator only ever holds engines through this
//! trait.

use async_trait::async_trait;

use scribe_types::{
    EngineDocumentStats, EngineKind, EntityId, EntityType, SearchCriteria, SearchIndex,
    SearchResultSet,
};

use crate::error::IndexingError;

/// Capability set implemented once per backend.
///
/// Implementations must be safe to call concurrently. Writes return
/// `Ok(false)` when the engine declined the write without an error.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Name used in logs and result sets.
    fn name(&self) -> &str;

    /// Tag used to select the primary engine.
    fn kind(&self) -> EngineKind;

    async fn index_document(&self, doc: &SearchIndex) -> Result<bool, IndexingError>;

    async fn update_document(&self, doc: &SearchIndex) -> Result<bool, IndexingError>;

    /// Remove a document. Succeeds when the engine no longer holds it,
    /// including when it was never there.
    async fn delete_document(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Result<bool, IndexingError>;

    /// Write a batch. Returns how many documents were written.
    async fn bulk_index(&self, docs: &[SearchIndex]) -> Result<usize, IndexingError>;

    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchResultSet, IndexingError>;

    /// Drop all engine-held documents.
    async fn rebuild_index(&self) -> Result<bool, IndexingError>;

    async fn is_healthy(&self) -> bool;

    async fn get_index_stats(&self) -> Result<EngineDocumentStats, IndexingError>;

    /// Native per-type document count. `None` when the engine cannot count
    /// by type.
    async fn count_by_type(&self, _entity_type: EntityType) -> Result<Option<u64>, IndexingError> {
        Ok(None)
    }

    /// Engine-specific compaction.
    async fn optimize(&self) -> Result<bool, IndexingError> {
        Ok(true)
    }
}
