//! Error types for settings storage.
//!
//! These errors cross the byte-store and registry boundaries only. The
//! typed manager and bindings swallow them and degrade to defaults.

use thiserror::Error;

/// Errors that can occur in byte stores, codecs and the descriptor registry.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Bytes could not be encoded or decoded as the requested type.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// The underlying store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Invalid key format.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The key is already registered with a different value type.
    #[error("key collision on {key}: registered as {registered}, requested as {requested}")]
    KeyCollision {
        key: String,
        registered: &'static str,
        requested: &'static str,
    },

    /// The key is already registered with a different default value.
    #[error("key {0} is already registered with a different default")]
    DefaultConflict(String),

    /// Database error from SQLx.
    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// I/O error.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Returns true if a later attempt at the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::DatabaseError(_) | StoreError::IoError(_)
        )
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::SerializationError(err.to_string())
    }
}
