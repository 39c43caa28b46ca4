//! Shared helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use univrs_settings::{ByteStore, ChangeSignal, MemoryByteStore, Result, StoreError};

/// Install a test subscriber once. Respects `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "univrs_settings=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Value type used across the scenario tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub name: String,
    pub age: u32,
    pub volumes: Vec<f64>,
}

impl Score {
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            age: 0,
            volumes: vec![],
        }
    }
}

/// A byte store that counts writes and records overlapping write spans.
///
/// Each write holds a "busy" flag across an artificial delay; a second write
/// arriving while the flag is set is an overlap.
pub struct CountingStore {
    inner: MemoryByteStore,
    delay: Duration,
    busy: AtomicBool,
    writes: AtomicUsize,
    overlaps: AtomicUsize,
    failing: AtomicBool,
}

impl CountingStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryByteStore::new(),
            delay,
            busy: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
            overlaps: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// Make every subsequent operation fail as if the medium were gone.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryByteStore {
        &self.inner
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ByteStore for CountingStore {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_available()?;
        self.inner.get_bytes(key).await
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.check_available()?;
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        tokio::time::sleep(self.delay).await;
        let result = self.inner.set_bytes(key, value).await;
        self.busy.store(false, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::SeqCst);
        result
    }

    fn subscribe(&self) -> ChangeSignal {
        self.inner.subscribe()
    }
}

/// A byte store where a second writer can land right behind a write.
///
/// Once armed with [`intrude_after_next_write`](Self::intrude_after_next_write),
/// the next `set_bytes` stores its own bytes, then the intruding bytes, and
/// then parks until [`release`](Self::release) is called.
pub struct InterleavingStore {
    inner: MemoryByteStore,
    intrusion: Mutex<Option<Vec<u8>>>,
    entered: Notify,
    released: Notify,
}

impl InterleavingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryByteStore::new(),
            intrusion: Mutex::new(None),
            entered: Notify::new(),
            released: Notify::new(),
        }
    }

    pub fn intrude_after_next_write(&self, bytes: Vec<u8>) {
        *self.intrusion.lock() = Some(bytes);
    }

    /// Wait until an armed write has parked.
    pub async fn wait_parked(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

#[async_trait]
impl ByteStore for InterleavingStore {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get_bytes(key).await
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.inner.set_bytes(key, value).await?;

        let intrusion = self.intrusion.lock().take();
        if let Some(bytes) = intrusion {
            self.inner.set_bytes(key, bytes).await?;
            self.entered.notify_one();
            self.released.notified().await;
        }
        Ok(())
    }

    fn subscribe(&self) -> ChangeSignal {
        self.inner.subscribe()
    }
}

/// Decode what the store currently holds under `key`.
pub async fn stored<V: serde::de::DeserializeOwned>(store: &dyn ByteStore, key: &str) -> Option<V> {
    let bytes = store.get_bytes(key).await.ok()??;
    serde_json::from_slice(&bytes).ok()
}
