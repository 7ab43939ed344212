//! Storage layer for scribe.
//!
//! Provides RocksDB-backed storage with:
//! - Column family isolation per entity kind
//! - Zero-padded id keys for ordered, paged scans
//! - The derived `SearchIndex` row store, with a key column family that
//!   enforces one row per `(entity_type, entity_id)`
//! - Atomic row + key writes via WriteBatch

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;

pub use db::{SearchIndexSummary, Storage, StorageStats};
pub use error::StorageError;
pub use keys::{EntityKey, IdentityKey, RowKey};
