//! Dual-engine search indexing for scribe.
//!
//! Keeps a primary and a fallback search engine consistent with the
//! system-of-record.
//!
//! ## Key Components
//!
//! - [`DocumentBuilder`]: Converts entities into canonical [`SearchIndex`](scribe_types::SearchIndex) documents
//! - [`SearchEngine`]: Capability trait implemented by [`TantivyEngine`], [`DatabaseEngine`] and [`MockEngine`]
//! - [`DualEngineCoordinator`]: Routes writes to every engine with retry, reads to the primary
//! - [`RebuildOrchestrator`]: Full phased rebuild
//! - [`SyncReconciler`]: Adds missing and refreshes present documents
//! - [`OrphanCleaner`]: Removes documents whose entity is gone
//! - [`StatusReporter`]: Health, counts and size
//! - [`IndexService`]: Facade exposing all of the above
//!
//! ## Example
//!
//! ```ignore
//! use scribe_indexing::IndexService;
//! use tokio_util::sync::CancellationToken;
//!
//! let service = IndexService::open(&settings, storage)?;
//! service.index_entity(EntityType::Post, 42).await;
//! let result = service.rebuild_all_indexes(&CancellationToken::new()).await;
//! println!("{} documents indexed", result.total_count);
//! ```

pub mod builder;
pub mod coordinator;
pub mod database_engine;
pub mod engine;
pub mod error;
pub mod mock;
pub mod orphan;
pub mod rebuild;
pub mod retry;
pub mod service;
pub mod source;
pub mod status;
pub mod sync;
pub mod tantivy_engine;

pub use builder::{BatchBuild, DocumentBuilder};
pub use coordinator::{BulkOutcome, DualEngineCoordinator};
pub use database_engine::DatabaseEngine;
pub use engine::SearchEngine;
pub use error::IndexingError;
pub use mock::MockEngine;
pub use orphan::OrphanCleaner;
pub use rebuild::RebuildOrchestrator;
pub use retry::RetryPolicy;
pub use service::{IndexService, ServiceConfig};
pub use source::{EntitySource, IndexRowStore};
pub use status::StatusReporter;
pub use sync::{SyncConfig, SyncReconciler};
pub use tantivy_engine::TantivyEngine;
