//! Error types for the scribe system.

use thiserror::Error;

/// Unified error type for domain-level operations.
#[derive(Debug, Error)]
pub enum ScribeError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unknown entity type tag
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    /// Unknown engine kind tag
    #[error("Unknown engine kind: {0}")]
    UnknownEngineKind(String),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
