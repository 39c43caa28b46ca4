//! # univrs-settings
//!
//! Typed, observable settings for the Univrs ecosystem.
//!
//! Values of any serde type live under string keys in a persistent byte
//! store. Consumers hold [`ObservableBinding`]s: in-memory cache cells that
//! read through a [`TypedStoreManager`], write back in the background, and
//! pick up changes made elsewhere when the store's change signal fires.
//!
//! - **Typed keys**: [`KeyDescriptor`] ties a key to a type and a default
//! - **Read-your-writes**: `set` updates the cache before the write lands
//! - **Serialized writes**: one ordered writer per store, readers in parallel
//! - **Self-healing**: missing or corrupt values fall back to the default,
//!   which is written back once
//! - **De-duplicated notifications**: bindings only notify on real changes
//!
//! ## Backends
//!
//! - [`SqliteByteStore`]: Embedded SQLite database (durable)
//! - [`MemoryByteStore`]: In-memory store (testing and development)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//! use univrs_settings::{DescriptorRegistry, SqliteByteStore, TypedStoreManager};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Score {
//!     name: String,
//!     age: u32,
//!     volumes: Vec<f64>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> univrs_settings::Result<()> {
//!     let registry = DescriptorRegistry::new();
//!     let score = registry.register(
//!         "score",
//!         Score { name: String::new(), age: 0, volumes: vec![] },
//!     )?;
//!
//!     let store = Arc::new(SqliteByteStore::open("settings.db").await?);
//!     let manager = TypedStoreManager::new(store);
//!
//!     let mut binding = manager.bind(&score).await;
//!     binding.set(Score { name: "A".to_string(), age: 20, volumes: vec![1.5] });
//!     println!("{:?}", binding.get());
//!
//!     manager.flush().await;
//!     Ok(())
//! }
//! ```

pub mod binding;
pub mod codec;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod manager;
pub mod memory;
pub mod signal;
pub mod sqlite;
pub mod store;
mod writer;

// Re-export main types
pub use binding::{BindingState, ObservableBinding, ObserverId};
pub use codec::{Codec, JsonCodec, StoreValue};
pub use config::{SqliteConfig, StoreConfig};
pub use descriptor::{DescriptorRegistry, KeyDescriptor};
pub use error::{Result, StoreError};
pub use manager::TypedStoreManager;
pub use memory::MemoryByteStore;
pub use signal::{ChangeNotifier, ChangeSignal};
pub use sqlite::SqliteByteStore;
pub use store::{ByteStore, MAX_KEY_LENGTH};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::binding::{BindingState, ObservableBinding};
    pub use crate::codec::StoreValue;
    pub use crate::descriptor::{DescriptorRegistry, KeyDescriptor};
    pub use crate::error::{Result, StoreError};
    pub use crate::manager::TypedStoreManager;
    pub use crate::memory::MemoryByteStore;
    pub use crate::sqlite::SqliteByteStore;
    pub use crate::store::ByteStore;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_memory_binding_basic() {
        let store = Arc::new(MemoryByteStore::new());
        let manager = TypedStoreManager::new(store);
        let key = KeyDescriptor::new("greeting", "hello".to_string());

        let mut binding = manager.bind(&key).await;
        binding.set("bye".to_string());
        assert_eq!(binding.get(), "bye");
    }

    #[test]
    fn test_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        fn assert_send<T: Send>() {}

        assert_send_sync::<MemoryByteStore>();
        assert_send_sync::<SqliteByteStore>();
        assert_send_sync::<TypedStoreManager>();
        assert_send_sync::<DescriptorRegistry>();
        assert_send::<ObservableBinding<String>>();
    }
}
