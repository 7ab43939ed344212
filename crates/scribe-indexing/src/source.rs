//! Store interfaces consumed by the indexing core.
//!
//! [`EntitySource`] is read-only access to the system-of-record.
//! [`IndexRowStore`] is the derived `SearchIndex` row collection.
//! Both are implemented for [`Storage`].

use scribe_storage::{SearchIndexSummary, Storage};
use scribe_types::{Entity, EntityId, EntityType, SearchIndex};

use crate::error::IndexingError;

/// Read access to indexable system-of-record entities.
pub trait EntitySource: Send + Sync {
    /// Load one entity by type and id.
    fn load(&self, entity_type: EntityType, id: EntityId)
        -> Result<Option<Entity>, IndexingError>;

    /// Load up to `limit` entities with id >= `start_id`, in id order.
    fn load_page(
        &self,
        entity_type: EntityType,
        start_id: EntityId,
        limit: usize,
    ) -> Result<Vec<Entity>, IndexingError>;

    /// Load several entities of one type. Missing ids are omitted.
    fn load_many(
        &self,
        entity_type: EntityType,
        ids: &[EntityId],
    ) -> Result<Vec<Entity>, IndexingError> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entity) = self.load(entity_type, *id)? {
                found.push(entity);
            }
        }
        Ok(found)
    }

    /// Whether the entity exists and still belongs in the index.
    fn exists(&self, entity_type: EntityType, id: EntityId) -> Result<bool, IndexingError> {
        Ok(self
            .load(entity_type, id)?
            .is_some_and(|entity| entity.is_indexable()))
    }
}

/// The derived `SearchIndex` row collection.
pub trait IndexRowStore: Send + Sync {
    /// Insert or update the row for the document's `(entity_type, entity_id)`.
    fn upsert_row(&self, row: &SearchIndex) -> Result<SearchIndex, IndexingError>;

    fn find_row(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Result<Option<SearchIndex>, IndexingError>;

    /// Delete by surrogate id. Returns whether a row was removed.
    fn delete_row(&self, id: u64) -> Result<bool, IndexingError>;

    /// Delete by identity. Returns whether a row was removed.
    fn delete_row_for(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Result<bool, IndexingError>;

    /// Up to `limit` rows with id >= `start_id`, in id order.
    fn rows_page(&self, start_id: u64, limit: usize) -> Result<Vec<SearchIndex>, IndexingError>;

    fn summary(&self) -> Result<SearchIndexSummary, IndexingError>;

    /// Remove every row. Returns the number removed.
    fn clear_rows(&self) -> Result<usize, IndexingError>;

    fn compact(&self) -> Result<(), IndexingError>;
}

impl EntitySource for Storage {
    fn load(
        &self,
        entity_type: EntityType,
        id: EntityId,
    ) -> Result<Option<Entity>, IndexingError> {
        Ok(self.get_entity(entity_type, id)?)
    }

    fn load_page(
        &self,
        entity_type: EntityType,
        start_id: EntityId,
        limit: usize,
    ) -> Result<Vec<Entity>, IndexingError> {
        Ok(self.list_entities(entity_type, start_id, limit)?)
    }
}

impl IndexRowStore for Storage {
    fn upsert_row(&self, row: &SearchIndex) -> Result<SearchIndex, IndexingError> {
        Ok(self.upsert_search_index(row)?)
    }

    fn find_row(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Result<Option<SearchIndex>, IndexingError> {
        Ok(self.find_search_index(entity_type, entity_id)?)
    }

    fn delete_row(&self, id: u64) -> Result<bool, IndexingError> {
        Ok(self.delete_search_index(id)?)
    }

    fn delete_row_for(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Result<bool, IndexingError> {
        Ok(self.delete_search_index_for(entity_type, entity_id)?)
    }

    fn rows_page(&self, start_id: u64, limit: usize) -> Result<Vec<SearchIndex>, IndexingError> {
        Ok(self.list_search_index(start_id, limit)?)
    }

    fn summary(&self) -> Result<SearchIndexSummary, IndexingError> {
        Ok(self.search_index_summary()?)
    }

    fn clear_rows(&self) -> Result<usize, IndexingError> {
        Ok(self.clear_search_index()?)
    }

    fn compact(&self) -> Result<(), IndexingError> {
        self.compact_cf(scribe_storage::column_families::CF_SEARCH_INDEX)?;
        Ok(())
    }
}
