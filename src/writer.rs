//! Single ordered writer for a byte store.
//!
//! Every mutation of the medium goes through one background task that
//! applies queued operations in order, each under the exclusive side of an
//! I/O lock. Readers take the shared side.
//!
//! There is one writer per store instance, however many managers are built
//! over it. [`StoreWriter::for_store`] hands out the live writer for a store
//! or starts one.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, error, warn};

use crate::error::{Result, StoreError};
use crate::store::ByteStore;

/// An operation queued for the writer task.
pub(crate) enum WriteOp {
    /// Replace the blob under `key`.
    Put { key: String, bytes: Vec<u8>, seq: u64 },
    /// Write a default back, but only if the store still holds `observed`.
    Heal {
        key: String,
        bytes: Vec<u8>,
        observed: Option<Vec<u8>>,
    },
    /// Resolve once everything queued before it has been applied.
    Flush(oneshot::Sender<()>),
}

struct PendingWrite {
    bytes: Vec<u8>,
    seq: u64,
}

/// State shared between every manager on one store and its writer task.
pub(crate) struct WriterState {
    store: Arc<dyn ByteStore>,
    io_lock: RwLock<()>,
    /// Latest queued-but-unapplied bytes per key.
    pending: Mutex<HashMap<String, PendingWrite>>,
    /// Keys with a default write-back in flight.
    healing: Mutex<HashSet<String>>,
    next_seq: AtomicU64,
}

impl WriterState {
    pub(crate) fn new(store: Arc<dyn ByteStore>) -> Self {
        Self {
            store,
            io_lock: RwLock::new(()),
            pending: Mutex::new(HashMap::new()),
            healing: Mutex::new(HashSet::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn ByteStore> {
        &self.store
    }

    /// Read bytes under the shared side of the I/O lock.
    pub(crate) async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let _guard = self.io_lock.read().await;
        self.store.get_bytes(key).await
    }

    /// Bytes queued for `key` that the writer has not applied yet.
    pub(crate) fn pending_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.pending.lock().get(key).map(|p| p.bytes.clone())
    }

    /// Record a pending write and queue it.
    ///
    /// The pending map lock is held across the send so queue order matches
    /// sequence order.
    pub(crate) fn enqueue_put(
        &self,
        queue: &mpsc::UnboundedSender<WriteOp>,
        key: &str,
        bytes: Vec<u8>,
    ) {
        let mut pending = self.pending.lock();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let op = WriteOp::Put {
            key: key.to_string(),
            bytes: bytes.clone(),
            seq,
        };
        if queue.send(op).is_err() {
            warn!(key = %key, "settings writer is gone, dropping write");
            return;
        }
        pending.insert(key.to_string(), PendingWrite { bytes, seq });
    }

    /// Claim the heal slot for `key`. Returns `false` if one is in flight.
    pub(crate) fn begin_heal(&self, key: &str) -> bool {
        self.healing.lock().insert(key.to_string())
    }

    /// Release the heal slot for `key`.
    pub(crate) fn end_heal(&self, key: &str) {
        self.healing.lock().remove(key);
    }

    #[cfg(test)]
    pub(crate) fn heal_in_flight(&self, key: &str) -> bool {
        self.healing.lock().contains(key)
    }

    async fn apply(&self, op: WriteOp) {
        match op {
            WriteOp::Put { key, bytes, seq } => self.apply_put(key, bytes, seq).await,
            WriteOp::Heal {
                key,
                bytes,
                observed,
            } => self.apply_heal(key, bytes, observed).await,
            WriteOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    async fn apply_put(&self, key: String, bytes: Vec<u8>, seq: u64) {
        let _guard = self.io_lock.write().await;

        // Readers arriving from here on wait for the lock and see the store,
        // including anything written to it after these bytes.
        {
            let mut pending = self.pending.lock();
            if pending.get(&key).is_some_and(|p| p.seq == seq) {
                pending.remove(&key);
            }
        }

        match self.store.set_bytes(&key, bytes).await {
            Ok(()) => debug!(key = %key, seq, "setting persisted"),
            Err(err) => log_dropped(&key, &err),
        }
    }

    async fn apply_heal(&self, key: String, bytes: Vec<u8>, observed: Option<Vec<u8>>) {
        {
            let _guard = self.io_lock.write().await;
            let superseded = self.pending.lock().contains_key(&key);
            if superseded {
                debug!(key = %key, "write queued after read, skipping default write-back");
            } else {
                match self.store.get_bytes(&key).await {
                    Ok(current) if current == observed => {
                        match self.store.set_bytes(&key, bytes).await {
                            Ok(()) => debug!(key = %key, "default written back"),
                            Err(err) => log_dropped(&key, &err),
                        }
                    }
                    Ok(_) => debug!(key = %key, "key changed since read, skipping default write-back"),
                    Err(err) => log_dropped(&key, &err),
                }
            }
        }
        self.end_heal(&key);
    }
}

fn log_dropped(key: &str, err: &StoreError) {
    if err.is_transient() {
        warn!(key = %key, error = %err, "settings write dropped");
    } else {
        error!(key = %key, error = %err, "settings write dropped");
    }
}

/// Writer task body. Runs until every queue sender is dropped.
pub(crate) async fn run(state: Arc<WriterState>, mut queue: mpsc::UnboundedReceiver<WriteOp>) {
    debug!("settings writer started");
    while let Some(op) = queue.recv().await {
        state.apply(op).await;
    }
    debug!("settings writer stopped");
}

/// Handle on the writer task serving one store.
///
/// Managers hold this behind an `Arc`; the task stops once the last handle
/// is dropped.
pub(crate) struct StoreWriter {
    state: Arc<WriterState>,
    queue: mpsc::UnboundedSender<WriteOp>,
}

type WriterMap = Mutex<HashMap<usize, Weak<StoreWriter>>>;

fn live_writers() -> &'static WriterMap {
    static WRITERS: OnceLock<WriterMap> = OnceLock::new();
    WRITERS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Identity of a store instance. Stable while any `Arc` to it is alive, and
/// a live writer keeps one.
fn store_id(store: &Arc<dyn ByteStore>) -> usize {
    Arc::as_ptr(store) as *const () as usize
}

impl StoreWriter {
    /// The writer for `store`, spawning one on the current runtime if none
    /// is running.
    ///
    /// # Panics
    ///
    /// Panics if a writer has to be spawned outside a Tokio runtime.
    pub(crate) fn for_store(store: Arc<dyn ByteStore>) -> Arc<StoreWriter> {
        let id = store_id(&store);
        let mut writers = live_writers().lock();

        // A writer whose runtime has shut down has a closed queue
        if let Some(writer) = writers
            .get(&id)
            .and_then(Weak::upgrade)
            .filter(|w| !w.queue.is_closed())
        {
            return writer;
        }

        writers.retain(|_, w| w.strong_count() > 0);

        let state = Arc::new(WriterState::new(store));
        let (queue, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run(Arc::clone(&state), receiver));

        let writer = Arc::new(StoreWriter { state, queue });
        writers.insert(id, Arc::downgrade(&writer));
        debug!(writers = writers.len(), "settings writer registered");
        writer
    }

    pub(crate) fn state(&self) -> &WriterState {
        &self.state
    }

    pub(crate) fn enqueue_put(&self, key: &str, bytes: Vec<u8>) {
        self.state.enqueue_put(&self.queue, key, bytes);
    }

    /// Queue an operation. Returns `false` if the writer task is gone.
    pub(crate) fn send(&self, op: WriteOp) -> bool {
        self.queue.send(op).is_ok()
    }
}
