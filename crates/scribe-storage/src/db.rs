//! RocksDB wrapper for scribe storage.
//!
//! Provides:
//! - Database open/close with column family setup
//! - Entity reads/writes and id-ordered paging
//! - SearchIndex row upserts keyed by `(entity_type, entity_id)`
//! - Admin operations (flush, compaction, statistics)

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use tracing::{debug, info};

use scribe_types::{Entity, EntityId, EntityType, SearchIndex};

use crate::column_families::{
    build_cf_descriptors, entity_cf, ALL_CF_NAMES, CF_SEARCH_INDEX, CF_SEARCH_INDEX_KEYS,
};
use crate::error::StorageError;
use crate::keys::{EntityKey, IdentityKey, RowKey};

const ROW_PREFIX: &[u8] = b"idx:";

/// Main storage interface for scribe
pub struct Storage {
    db: DB,
    /// Next surrogate id for SearchIndex rows
    row_sequence: AtomicU64,
    /// Serializes row upserts so the identity lookup and the write are atomic
    row_write_lock: Mutex<()>,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(4);

        let cf_descriptors = build_cf_descriptors();
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let row_sequence = Self::load_row_sequence(&db)?;

        Ok(Self {
            db,
            row_sequence: AtomicU64::new(row_sequence),
            row_write_lock: Mutex::new(()),
        })
    }

    /// Load the next row id from the highest existing row key
    fn load_row_sequence(db: &DB) -> Result<u64, StorageError> {
        let cf = db
            .cf_handle(CF_SEARCH_INDEX)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(CF_SEARCH_INDEX.to_string()))?;

        let mut iter = db.iterator_cf(cf, IteratorMode::End);
        if let Some(result) = iter.next() {
            let (key, _) = result?;
            let row_key = RowKey::from_bytes(&key)?;
            return Ok(row_key.id + 1);
        }
        // Row ids start at 1; 0 means "not persisted"
        Ok(1)
    }

    fn next_row_id(&self) -> u64 {
        self.row_sequence.fetch_add(1, Ordering::SeqCst)
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    // ==================== Entity Methods ====================

    /// Store (insert or replace) a system-of-record entity.
    pub fn put_entity(&self, entity: &Entity) -> Result<(), StorageError> {
        let cf = self.cf(entity_cf(entity.entity_type()))?;
        let key = EntityKey::new(entity.id());
        self.db.put_cf(cf, key.to_bytes(), entity.to_bytes()?)?;
        debug!(entity_type = %entity.entity_type(), id = entity.id(), "Stored entity");
        Ok(())
    }

    /// Get an entity by type and id.
    pub fn get_entity(
        &self,
        entity_type: EntityType,
        id: EntityId,
    ) -> Result<Option<Entity>, StorageError> {
        let cf = self.cf(entity_cf(entity_type))?;
        match self.db.get_cf(cf, EntityKey::new(id).to_bytes())? {
            Some(bytes) => {
                let entity = Entity::from_bytes(&bytes)?;
                if entity.entity_type() != entity_type {
                    return Err(StorageError::Corrupt(format!(
                        "{} column family holds a {} record at id {}",
                        entity_type,
                        entity.entity_type(),
                        id
                    )));
                }
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    /// Delete an entity. Returns whether it existed.
    pub fn delete_entity(&self, entity_type: EntityType, id: EntityId) -> Result<bool, StorageError> {
        let cf = self.cf(entity_cf(entity_type))?;
        let key = EntityKey::new(id).to_bytes();
        let existed = self.db.get_cf(cf, &key)?.is_some();
        self.db.delete_cf(cf, &key)?;
        debug!(entity_type = %entity_type, id, existed, "Deleted entity");
        Ok(existed)
    }

    /// Get up to `limit` entities of a type with id >= `start_id`, in id order.
    ///
    /// Used for paged scans: pass the last returned id + 1 to continue.
    pub fn list_entities(
        &self,
        entity_type: EntityType,
        start_id: EntityId,
        limit: usize,
    ) -> Result<Vec<Entity>, StorageError> {
        let cf = self.cf(entity_cf(entity_type))?;
        let start_key = EntityKey::new(start_id).to_bytes();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&start_key, Direction::Forward));

        let mut results = Vec::new();
        for item in iter.take(limit) {
            let (_, value) = item?;
            results.push(Entity::from_bytes(&value)?);
        }
        Ok(results)
    }

    // ==================== SearchIndex Row Methods ====================

    /// Insert or update the row for `(entity_type, entity_id)`.
    ///
    /// An existing row keeps its surrogate id and `created_at`; the returned
    /// row carries the persisted id.
    pub fn upsert_search_index(&self, row: &SearchIndex) -> Result<SearchIndex, StorageError> {
        let rows_cf = self.cf(CF_SEARCH_INDEX)?;
        let keys_cf = self.cf(CF_SEARCH_INDEX_KEYS)?;
        let identity = IdentityKey::new(row.entity_type, row.entity_id).to_bytes();

        let _guard = self
            .row_write_lock
            .lock()
            .map_err(|e| StorageError::Key(format!("row lock poisoned: {}", e)))?;

        let mut stored = row.clone();
        match self.db.get_cf(keys_cf, &identity)? {
            Some(id_bytes) => {
                let id = decode_row_id(&id_bytes)?;
                stored.id = id;
                if let Some(existing) = self.get_search_index(id)? {
                    stored.created_at = existing.created_at;
                }
            }
            None => {
                stored.id = self.next_row_id();
            }
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(rows_cf, RowKey::new(stored.id).to_bytes(), stored.to_bytes()?);
        batch.put_cf(keys_cf, &identity, stored.id.to_be_bytes());
        self.db.write(batch)?;

        debug!(
            row_id = stored.id,
            entity_type = %stored.entity_type,
            entity_id = stored.entity_id,
            "Upserted search index row"
        );
        Ok(stored)
    }

    /// Get a row by surrogate id.
    pub fn get_search_index(&self, id: u64) -> Result<Option<SearchIndex>, StorageError> {
        let cf = self.cf(CF_SEARCH_INDEX)?;
        match self.db.get_cf(cf, RowKey::new(id).to_bytes())? {
            Some(bytes) => Ok(Some(SearchIndex::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Get the row for an entity, if indexed.
    pub fn find_search_index(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Result<Option<SearchIndex>, StorageError> {
        let keys_cf = self.cf(CF_SEARCH_INDEX_KEYS)?;
        let identity = IdentityKey::new(entity_type, entity_id).to_bytes();
        match self.db.get_cf(keys_cf, identity)? {
            Some(id_bytes) => self.get_search_index(decode_row_id(&id_bytes)?),
            None => Ok(None),
        }
    }

    /// Delete a row by surrogate id. Returns whether it existed.
    pub fn delete_search_index(&self, id: u64) -> Result<bool, StorageError> {
        let _guard = self
            .row_write_lock
            .lock()
            .map_err(|e| StorageError::Key(format!("row lock poisoned: {}", e)))?;

        let Some(row) = self.get_search_index(id)? else {
            return Ok(false);
        };
        self.delete_row_locked(&row)?;
        Ok(true)
    }

    /// Delete the row for an entity. Returns whether it existed.
    pub fn delete_search_index_for(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Result<bool, StorageError> {
        let _guard = self
            .row_write_lock
            .lock()
            .map_err(|e| StorageError::Key(format!("row lock poisoned: {}", e)))?;

        let Some(row) = self.find_search_index(entity_type, entity_id)? else {
            return Ok(false);
        };
        self.delete_row_locked(&row)?;
        Ok(true)
    }

    fn delete_row_locked(&self, row: &SearchIndex) -> Result<(), StorageError> {
        let rows_cf = self.cf(CF_SEARCH_INDEX)?;
        let keys_cf = self.cf(CF_SEARCH_INDEX_KEYS)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(rows_cf, RowKey::new(row.id).to_bytes());
        batch.delete_cf(
            keys_cf,
            IdentityKey::new(row.entity_type, row.entity_id).to_bytes(),
        );
        self.db.write(batch)?;

        debug!(row_id = row.id, doc_key = %row.doc_key(), "Deleted search index row");
        Ok(())
    }

    /// Get up to `limit` rows with id >= `start_id`, in id order.
    pub fn list_search_index(
        &self,
        start_id: u64,
        limit: usize,
    ) -> Result<Vec<SearchIndex>, StorageError> {
        let cf = self.cf(CF_SEARCH_INDEX)?;
        let start_key = RowKey::new(start_id).to_bytes();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&start_key, Direction::Forward));

        let mut rows = Vec::new();
        for item in iter {
            if rows.len() >= limit {
                break;
            }
            let (key, value) = item?;
            if !key.starts_with(ROW_PREFIX) {
                break;
            }
            rows.push(SearchIndex::from_bytes(&value)?);
        }
        Ok(rows)
    }

    /// Single pass over all rows collecting counts and sizes.
    pub fn search_index_summary(&self) -> Result<SearchIndexSummary, StorageError> {
        let cf = self.cf(CF_SEARCH_INDEX)?;
        let mut summary = SearchIndexSummary::default();

        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            summary.total_rows += 1;
            summary.size_in_bytes += (key.len() + value.len()) as u64;

            let row = SearchIndex::from_bytes(&value)?;
            if !row.is_active {
                continue;
            }
            summary.active_rows += 1;
            *summary.active_by_type.entry(row.entity_type).or_insert(0) += 1;
            summary.last_updated_at = match summary.last_updated_at {
                Some(latest) if latest >= row.updated_at => Some(latest),
                _ => Some(row.updated_at),
            };
        }

        Ok(summary)
    }

    /// Remove every row and identity key. Returns the number of rows removed.
    pub fn clear_search_index(&self) -> Result<usize, StorageError> {
        let rows_cf = self.cf(CF_SEARCH_INDEX)?;
        let keys_cf = self.cf(CF_SEARCH_INDEX_KEYS)?;

        let _guard = self
            .row_write_lock
            .lock()
            .map_err(|e| StorageError::Key(format!("row lock poisoned: {}", e)))?;

        let mut batch = WriteBatch::default();
        let mut count = 0;
        for item in self.db.iterator_cf(rows_cf, IteratorMode::Start) {
            let (key, _) = item?;
            batch.delete_cf(rows_cf, &key);
            count += 1;
        }
        for item in self.db.iterator_cf(keys_cf, IteratorMode::Start) {
            let (key, _) = item?;
            batch.delete_cf(keys_cf, &key);
        }
        self.db.write(batch)?;

        info!(count, "Cleared search index rows");
        Ok(count)
    }

    // ===== Admin Operations =====

    /// Flush all column families to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.flush_cf(cf)?;
            }
        }
        Ok(())
    }

    /// Trigger compaction on a specific column family.
    pub fn compact_cf(&self, cf_name: &str) -> Result<(), StorageError> {
        let cf = self.cf(cf_name)?;
        info!(cf = %cf_name, "Starting compaction...");
        self.db.compact_range_cf::<&[u8], &[u8]>(cf, None, None);
        info!(cf = %cf_name, "Compaction complete");
        Ok(())
    }

    /// Get database statistics.
    pub fn get_stats(&self) -> Result<StorageStats, StorageError> {
        let mut stats = StorageStats::default();

        for entity_type in EntityType::ALL {
            let cf = self.cf(entity_cf(entity_type))?;
            stats
                .entity_counts
                .insert(entity_type, self.count_cf_entries(cf)?);
        }

        stats.search_index_rows = self.count_cf_entries(self.cf(CF_SEARCH_INDEX)?)?;
        stats.disk_usage_bytes = self.get_disk_usage();

        Ok(stats)
    }

    fn count_cf_entries(&self, cf: &rocksdb::ColumnFamily) -> Result<u64, StorageError> {
        let mut count = 0u64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn get_disk_usage(&self) -> u64 {
        let mut total_size = 0u64;
        if let Ok(entries) = std::fs::read_dir(self.db.path()) {
            for entry in entries.flatten() {
                if let Ok(metadata) = entry.metadata() {
                    total_size += metadata.len();
                }
            }
        }
        total_size
    }
}

fn decode_row_id(bytes: &[u8]) -> Result<u64, StorageError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::Key(format!("Invalid row id length: {}", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

/// Aggregate view of the SearchIndex rows.
#[derive(Debug, Clone, Default)]
pub struct SearchIndexSummary {
    pub total_rows: u64,
    pub active_rows: u64,
    pub active_by_type: BTreeMap<EntityType, u64>,
    /// Bytes of keys plus values across all rows
    pub size_in_bytes: u64,
    pub last_updated_at: Option<DateTime<Utc>>,
}

/// Statistics about the storage.
#[derive(Debug, Default, serde::Serialize)]
pub struct StorageStats {
    /// Records per system-of-record entity type
    pub entity_counts: BTreeMap<EntityType, u64>,
    /// Number of SearchIndex rows (active and inactive)
    pub search_index_rows: u64,
    /// Total disk usage in bytes
    pub disk_usage_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_types::{Category, Post, PostStatus, Tag};
    use tempfile::TempDir;

    fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(temp_dir.path()).unwrap();
        (storage, temp_dir)
    }

    fn row(entity_type: EntityType, entity_id: EntityId, title: &str) -> SearchIndex {
        SearchIndex::new(entity_type, entity_id, title, "content", "en")
    }

    #[test]
    fn test_open_creates_column_families() {
        let (storage, _temp) = create_test_storage();
        for cf_name in ALL_CF_NAMES {
            assert!(
                storage.db.cf_handle(cf_name).is_some(),
                "CF {} should exist",
                cf_name
            );
        }
    }

    #[test]
    fn test_entity_roundtrip() {
        let (storage, _temp) = create_test_storage();
        let post = Post::new(1, "Ownership", "Borrowing explained").with_tags(vec![2, 3]);
        storage.put_entity(&post.clone().into()).unwrap();

        let loaded = storage.get_entity(EntityType::Post, 1).unwrap().unwrap();
        match loaded {
            Entity::Post(p) => {
                assert_eq!(p.title, "Ownership");
                assert_eq!(p.tag_ids, vec![2, 3]);
            }
            other => panic!("Expected post, got {:?}", other),
        }
    }

    #[test]
    fn test_entity_not_found() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.get_entity(EntityType::Tag, 99).unwrap().is_none());
    }

    #[test]
    fn test_entity_types_isolated() {
        let (storage, _temp) = create_test_storage();
        storage.put_entity(&Category::new(1, "Rust").into()).unwrap();
        assert!(storage.get_entity(EntityType::Tag, 1).unwrap().is_none());
        assert!(storage
            .get_entity(EntityType::Category, 1)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_delete_entity() {
        let (storage, _temp) = create_test_storage();
        storage.put_entity(&Tag::new(4, "async").into()).unwrap();
        assert!(storage.delete_entity(EntityType::Tag, 4).unwrap());
        assert!(!storage.delete_entity(EntityType::Tag, 4).unwrap());
        assert!(storage.get_entity(EntityType::Tag, 4).unwrap().is_none());
    }

    #[test]
    fn test_list_entities_paged() {
        let (storage, _temp) = create_test_storage();
        for id in [3, 1, 12, 7, 20] {
            let post = Post::new(id, format!("Post {}", id), "body");
            storage.put_entity(&post.into()).unwrap();
        }

        let first = storage.list_entities(EntityType::Post, 0, 2).unwrap();
        let ids: Vec<_> = first.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![1, 3]);

        let second = storage.list_entities(EntityType::Post, 4, 10).unwrap();
        let ids: Vec<_> = second.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![7, 12, 20]);

        assert!(storage
            .list_entities(EntityType::Post, 21, 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_list_entities_includes_unpublished() {
        let (storage, _temp) = create_test_storage();
        let draft = Post::new(1, "Draft", "wip").with_status(PostStatus::Draft);
        storage.put_entity(&draft.into()).unwrap();
        let listed = storage.list_entities(EntityType::Post, 0, 10).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].is_indexable());
    }

    #[test]
    fn test_upsert_assigns_id() {
        let (storage, _temp) = create_test_storage();
        let stored = storage
            .upsert_search_index(&row(EntityType::Post, 1, "First"))
            .unwrap();
        assert_eq!(stored.id, 1);

        let other = storage
            .upsert_search_index(&row(EntityType::Post, 2, "Second"))
            .unwrap();
        assert_eq!(other.id, 2);
    }

    #[test]
    fn test_upsert_is_idempotent_per_entity() {
        let (storage, _temp) = create_test_storage();
        let first = storage
            .upsert_search_index(&row(EntityType::Post, 5, "Version 1"))
            .unwrap();
        let second = storage
            .upsert_search_index(&row(EntityType::Post, 5, "Version 2"))
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.created_at, first.created_at);

        let rows = storage.list_search_index(0, 100).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Version 2");
    }

    #[test]
    fn test_same_id_different_type_are_distinct() {
        let (storage, _temp) = create_test_storage();
        storage
            .upsert_search_index(&row(EntityType::Post, 1, "post"))
            .unwrap();
        storage
            .upsert_search_index(&row(EntityType::Tag, 1, "tag"))
            .unwrap();
        assert_eq!(storage.list_search_index(0, 100).unwrap().len(), 2);
    }

    #[test]
    fn test_find_and_delete_search_index() {
        let (storage, _temp) = create_test_storage();
        let stored = storage
            .upsert_search_index(&row(EntityType::User, 8, "ferris"))
            .unwrap();

        let found = storage
            .find_search_index(EntityType::User, 8)
            .unwrap()
            .unwrap();
        assert_eq!(found.id, stored.id);

        assert!(storage.delete_search_index(stored.id).unwrap());
        assert!(!storage.delete_search_index(stored.id).unwrap());
        assert!(storage
            .find_search_index(EntityType::User, 8)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_delete_search_index_for_entity() {
        let (storage, _temp) = create_test_storage();
        storage
            .upsert_search_index(&row(EntityType::Tag, 3, "rust"))
            .unwrap();
        assert!(storage
            .delete_search_index_for(EntityType::Tag, 3)
            .unwrap());
        assert!(!storage
            .delete_search_index_for(EntityType::Tag, 3)
            .unwrap());
        assert!(storage.list_search_index(0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_row_sequence_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let storage = Storage::open(temp_dir.path()).unwrap();
            storage
                .upsert_search_index(&row(EntityType::Post, 1, "a"))
                .unwrap();
            storage
                .upsert_search_index(&row(EntityType::Post, 2, "b"))
                .unwrap();
        }
        let storage = Storage::open(temp_dir.path()).unwrap();
        let stored = storage
            .upsert_search_index(&row(EntityType::Post, 3, "c"))
            .unwrap();
        assert_eq!(stored.id, 3);
    }

    #[test]
    fn test_search_index_summary() {
        let (storage, _temp) = create_test_storage();
        for id in 1..=3 {
            storage
                .upsert_search_index(&row(EntityType::Post, id, "p"))
                .unwrap();
        }
        storage
            .upsert_search_index(&row(EntityType::Category, 1, "c"))
            .unwrap();
        let mut inactive = row(EntityType::Tag, 1, "t");
        inactive.is_active = false;
        storage.upsert_search_index(&inactive).unwrap();

        let summary = storage.search_index_summary().unwrap();
        assert_eq!(summary.total_rows, 5);
        assert_eq!(summary.active_rows, 4);
        assert_eq!(summary.active_by_type.get(&EntityType::Post), Some(&3));
        assert_eq!(summary.active_by_type.get(&EntityType::Category), Some(&1));
        assert_eq!(summary.active_by_type.get(&EntityType::Tag), None);
        assert!(summary.size_in_bytes > 0);
        assert!(summary.last_updated_at.is_some());
    }

    #[test]
    fn test_clear_search_index() {
        let (storage, _temp) = create_test_storage();
        for id in 1..=4 {
            storage
                .upsert_search_index(&row(EntityType::Post, id, "p"))
                .unwrap();
        }
        assert_eq!(storage.clear_search_index().unwrap(), 4);
        assert!(storage.list_search_index(0, 10).unwrap().is_empty());
        assert!(storage
            .find_search_index(EntityType::Post, 1)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_get_stats() {
        let (storage, _temp) = create_test_storage();
        storage.put_entity(&Post::new(1, "a", "b").into()).unwrap();
        storage.put_entity(&Tag::new(1, "t").into()).unwrap();
        storage
            .upsert_search_index(&row(EntityType::Post, 1, "a"))
            .unwrap();

        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.entity_counts.get(&EntityType::Post), Some(&1));
        assert_eq!(stats.entity_counts.get(&EntityType::User), Some(&0));
        assert_eq!(stats.search_index_rows, 1);
    }

    #[test]
    fn test_compact_and_flush() {
        let (storage, _temp) = create_test_storage();
        storage
            .upsert_search_index(&row(EntityType::Post, 1, "a"))
            .unwrap();
        storage.flush().unwrap();
        storage.compact_cf(CF_SEARCH_INDEX).unwrap();
        assert!(storage.compact_cf("missing").is_err());
    }
}
