//! Document store error types.

use thiserror::Error;

/// Document store operation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Store connection is closed or unreachable
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Document not found in collection
    #[error("Document '{id}' not found in collection '{collection}'")]
    DocumentNotFound { collection: String, id: String },

    /// Collection name cannot be used
    #[error("Invalid collection name '{0}'")]
    InvalidCollectionName(String),

    /// Insert with an identity that already exists
    #[error("Duplicate id '{id}' in collection '{collection}'")]
    DuplicateId { collection: String, id: String },

    /// Document shape rejected by the store
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Unknown filter operator
    #[error("Unknown operator '{0}'")]
    UnknownOperator(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Data corruption detected
    #[error("Data corruption detected: {0}")]
    DataCorruption(String),

    /// I/O error during persistence
    #[error("I/O error: {0}")]
    IoError(String),

    /// Transient I/O error that may succeed on retry
    #[error("Transient I/O error: {0}")]
    TransientIoError(String),
}

impl StoreError {
    /// Returns `true` if the store could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
