//! Typed access to a byte store.
//!
//! [`TypedStoreManager`] owns the read/write discipline over a
//! [`ByteStore`]: reads fall back to the descriptor default and heal the
//! store, writes are fire-and-forget and applied by a single ordered writer.
//! Nothing here returns an error to the caller; storage never breaks the UI.

use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::binding::ObservableBinding;
use crate::codec::{Codec, JsonCodec, StoreValue};
use crate::descriptor::KeyDescriptor;
use crate::signal::ChangeSignal;
use crate::store::ByteStore;
use crate::writer::{StoreWriter, WriteOp};

/// Typed, serialized access to a [`ByteStore`].
///
/// Every manager built over the same store instance, and every clone of
/// one, shares a single writer. All writes to that store are applied one at
/// a time in issue order.
pub struct TypedStoreManager<C: Codec = JsonCodec> {
    writer: Arc<StoreWriter>,
    codec: Arc<C>,
}

impl TypedStoreManager<JsonCodec> {
    /// Create a JSON-encoding manager over `store`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime while no writer is running
    /// for `store`; the writer task is spawned onto the current runtime.
    pub fn new(store: Arc<dyn ByteStore>) -> Self {
        Self::with_codec(store, JsonCodec)
    }
}

impl<C: Codec> TypedStoreManager<C> {
    /// Create a manager over `store` using `codec`.
    ///
    /// # Panics
    ///
    /// Panics if no writer is running for `store` and this is called outside
    /// a Tokio runtime.
    pub fn with_codec(store: Arc<dyn ByteStore>, codec: C) -> Self {
        Self {
            writer: StoreWriter::for_store(store),
            codec: Arc::new(codec),
        }
    }

    /// The underlying byte store.
    pub fn store(&self) -> &Arc<dyn ByteStore> {
        self.writer.state().store()
    }

    /// Subscribe to the store-wide change signal.
    pub fn subscribe(&self) -> ChangeSignal {
        self.writer.state().store().subscribe()
    }

    /// The codec values are encoded with.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Read the current value for `descriptor`.
    ///
    /// A write queued for this store but not yet applied is returned
    /// as-is. Missing or undecodable data yields the default and schedules
    /// a one-shot write-back of that default. Store errors yield the default
    /// without a write-back.
    pub async fn read<V: StoreValue>(&self, descriptor: &KeyDescriptor<V>) -> V {
        let key = descriptor.key();

        if let Some(bytes) = self.writer.state().pending_bytes(key) {
            match self.codec.decode::<V>(&bytes) {
                Ok(value) => return value,
                Err(err) => debug!(key = %key, error = %err, "queued write not decodable"),
            }
        }

        match self.writer.state().read_bytes(key).await {
            Ok(Some(bytes)) => match self.codec.decode::<V>(&bytes) {
                Ok(value) => value,
                Err(err) => {
                    debug!(key = %key, error = %err, "stored value not decodable, using default");
                    self.heal(descriptor, Some(bytes));
                    descriptor.default_value().clone()
                }
            },
            Ok(None) => {
                debug!(key = %key, "no stored value, using default");
                self.heal(descriptor, None);
                descriptor.default_value().clone()
            }
            Err(err) => {
                warn!(key = %key, error = %err, "settings store unavailable, using default");
                descriptor.default_value().clone()
            }
        }
    }

    /// Persist `value` for `descriptor` in the background.
    ///
    /// Returns immediately. Encode failures drop the write.
    pub fn write<V: StoreValue>(&self, descriptor: &KeyDescriptor<V>, value: &V) {
        let key = descriptor.key();
        match self.codec.encode(value) {
            Ok(bytes) => self.writer.enqueue_put(key, bytes),
            Err(err) => warn!(key = %key, error = %err, "setting not encodable, dropping write"),
        }
    }

    /// Wait until every write queued for this store before this call has
    /// been applied.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.writer.send(WriteOp::Flush(done)) {
            let _ = wait.await;
        }
    }

    /// Bind a new observable cache cell to `descriptor`.
    pub async fn bind<V: StoreValue>(&self, descriptor: &KeyDescriptor<V>) -> ObservableBinding<V, C> {
        ObservableBinding::bind(self.clone(), descriptor.clone()).await
    }

    /// Schedule a default write-back for `descriptor`, at most one per key.
    fn heal<V: StoreValue>(&self, descriptor: &KeyDescriptor<V>, observed: Option<Vec<u8>>) {
        let key = descriptor.key();
        let state = self.writer.state();
        if !state.begin_heal(key) {
            return;
        }

        let bytes = match self.codec.encode(descriptor.default_value()) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key = %key, error = %err, "default not encodable, skipping write-back");
                state.end_heal(key);
                return;
            }
        };

        let op = WriteOp::Heal {
            key: key.to_string(),
            bytes,
            observed,
        };
        if !self.writer.send(op) {
            state.end_heal(key);
        }
    }

    #[cfg(test)]
    pub(crate) fn heal_in_flight(&self, key: &str) -> bool {
        self.writer.state().heal_in_flight(key)
    }
}

impl<C: Codec> Clone for TypedStoreManager<C> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
            codec: Arc::clone(&self.codec),
        }
    }
}
