//! # scribe-types
//!
//! Shared domain types for the scribe search indexing system.
//!
//! This crate defines the data structures used throughout the system:
//! - Entities: Posts, categories, tags and users read from the system-of-record
//! - SearchIndex: The derived, denormalized document for one indexable entity
//! - Reports: Rebuild, sync, cleanup and status results
//! - Settings: Layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use scribe_types::{EntityType, SearchIndex};
//!
//! let doc = SearchIndex::new(EntityType::Post, 42, "Hello", "World", "en");
//! assert_eq!(doc.doc_key(), "post:42");
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod report;
pub mod search_index;

pub use config::{
    EngineKind, EngineSettings, MaintenanceSettings, RetrySettings, SearchSettings, Settings,
    MIN_WRITER_MEMORY_MB,
};
pub use entity::{Category, Entity, EntityId, EntityType, Post, PostStatus, Tag, User};
pub use error::ScribeError;
pub use report::{
    CleanupResult, EngineDocumentStats, EntityStats, IndexRebuildResult, IndexStatus,
    IndexSyncResult, OperationOutcome, RebuildPhase,
};
pub use search_index::{
    doc_key, SearchCriteria, SearchHit, SearchIndex, SearchResultSet, KEYWORD_SEPARATOR,
};
