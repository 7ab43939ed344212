//! Error types for the indexing subsystem.

use scribe_search::SearchError;
use scribe_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while building documents or driving engines
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Tantivy search index error
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// An entity could not be turned into a document
    #[error("Build error: {0}")]
    Build(String),

    /// Invalid engine or service configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine-level failure reported by an implementation
    #[error("Engine error: {0}")]
    Engine(String),

    /// JSON encoding/decoding errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl IndexingError {
    /// True for per-item build failures that callers skip rather than abort on.
    pub fn is_build_failure(&self) -> bool {
        matches!(self, IndexingError::Build(_))
    }
}

impl From<serde_json::Error> for IndexingError {
    fn from(err: serde_json::Error) -> Self {
        IndexingError::Serialization(err.to_string())
    }
}
