//! ByteStore trait - the persistent medium underneath typed settings.
//!
//! A byte store maps string keys to opaque blobs and fires a store-wide
//! change signal after every successful write. It knows nothing about
//! value types; that is the codec's job.

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::signal::ChangeSignal;

/// Maximum key length in bytes.
pub const MAX_KEY_LENGTH: usize = 1024;

/// Validate that a key is well-formed.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(StoreError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

/// A persistent key-value store of raw bytes.
///
/// Implementations must fire their change signal after every successful
/// `set_bytes`, including writes that did not come through a typed manager.
#[async_trait]
pub trait ByteStore: Send + Sync {
    /// Get the blob stored under `key`.
    ///
    /// Returns `None` if the key does not exist.
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the blob stored under `key`.
    async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Subscribe to the store-wide change signal.
    fn subscribe(&self) -> ChangeSignal;

    /// Check if a key exists.
    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get_bytes(key).await?.is_some())
    }
}
