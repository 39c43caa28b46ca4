//! In-memory byte store implementation.
//!
//! This implementation is NOT durable - data is lost on process exit.
//! Use for testing, development, and hosts that persist elsewhere.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::signal::{ChangeNotifier, ChangeSignal};
use crate::store::{validate_key, ByteStore};

/// In-memory implementation of [`ByteStore`].
///
/// Uses a BTreeMap for ordered key iteration and RwLock for concurrency.
pub struct MemoryByteStore {
    data: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    notifier: ChangeNotifier,
}

impl MemoryByteStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::with_config(&StoreConfig::default())
    }

    /// Create a new empty store using the signal capacity from `config`.
    pub fn with_config(config: &StoreConfig) -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            notifier: ChangeNotifier::new(config.signal_capacity),
        }
    }

    /// Get the number of entries in the store.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// All keys, in lexicographic order.
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    /// Clear all entries. Fires the change signal.
    pub fn clear(&self) {
        self.data.write().clear();
        self.notifier.notify();
    }

    /// Fire the change signal without touching any data.
    ///
    /// Stands in for a platform notification caused by something outside
    /// this process.
    pub fn notify_external_change(&self) {
        self.notifier.notify();
    }
}

impl Default for MemoryByteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ByteStore for MemoryByteStore {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.data.read().get(key).cloned())
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        self.data.write().insert(key.to_string(), value);
        self.notifier.notify();
        Ok(())
    }

    fn subscribe(&self) -> ChangeSignal {
        self.notifier.subscribe()
    }
}
