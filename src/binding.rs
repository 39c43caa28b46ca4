//! Observable per-consumer cache cells.
//!
//! An [`ObservableBinding`] holds the last known value for one key, serves
//! reads from memory, writes through a [`TypedStoreManager`], and reconciles
//! with the store whenever the store-wide change signal fires. Observers are
//! only told about changes that came from outside this binding.
//!
//! The binding is driven from one home task: call
//! [`next_change`](ObservableBinding::next_change) in that task's event loop,
//! or [`sync_pending`](ObservableBinding::sync_pending) on each tick.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use univrs_settings::{KeyDescriptor, MemoryByteStore, TypedStoreManager};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MemoryByteStore::new());
//!     let manager = TypedStoreManager::new(store);
//!     let theme = KeyDescriptor::new("theme", "light".to_string());
//!
//!     let mut binding = manager.bind(&theme).await;
//!     binding.subscribe(|value| println!("theme is now {value}"));
//!     binding.set("dark".to_string());
//!
//!     while let Some(value) = binding.next_change().await {
//!         println!("changed elsewhere: {value}");
//!     }
//! }
//! ```

use std::fmt;
use tracing::{debug, trace};

use crate::codec::{Codec, JsonCodec, StoreValue};
use crate::descriptor::KeyDescriptor;
use crate::manager::TypedStoreManager;
use crate::signal::ChangeSignal;

/// Lifecycle of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// Subscribed to the change signal and reconciling.
    Bound,
    /// Subscription released; the cache is frozen apart from local sets.
    Disposed,
}

/// Handle returned by [`ObservableBinding::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer<V> = Box<dyn FnMut(&V) + Send>;

/// A live, typed cache of one settings key.
pub struct ObservableBinding<V: StoreValue, C: Codec = JsonCodec> {
    manager: TypedStoreManager<C>,
    descriptor: KeyDescriptor<V>,
    current: V,
    signal: Option<ChangeSignal>,
    observers: Vec<(ObserverId, Observer<V>)>,
    next_observer: u64,
}

impl<V: StoreValue, C: Codec> ObservableBinding<V, C> {
    /// Read the initial value and start listening for store changes.
    ///
    /// The subscription is taken before the read so a change landing in
    /// between is still seen.
    pub async fn bind(manager: TypedStoreManager<C>, descriptor: KeyDescriptor<V>) -> Self {
        let signal = manager.subscribe();
        let current = manager.read(&descriptor).await;
        debug!(key = %descriptor.key(), "binding established");

        Self {
            manager,
            descriptor,
            current,
            signal: Some(signal),
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    /// The cached value. Never touches the store.
    pub fn get(&self) -> &V {
        &self.current
    }

    /// The descriptor this binding is bound to.
    pub fn descriptor(&self) -> &KeyDescriptor<V> {
        &self.descriptor
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BindingState {
        if self.signal.is_some() {
            BindingState::Bound
        } else {
            BindingState::Disposed
        }
    }

    /// Replace the value.
    ///
    /// Equal values are ignored. Otherwise the cache updates at once and the
    /// durable write is dispatched in the background. Returns whether the
    /// value changed.
    pub fn set(&mut self, value: V) -> bool {
        if self.current == value {
            trace!(key = %self.descriptor.key(), "set with unchanged value ignored");
            return false;
        }
        self.current = value;
        self.manager.write(&self.descriptor, &self.current);
        true
    }

    /// Restore the registered default.
    pub fn reset(&mut self) -> bool {
        let default = self.descriptor.default_value().clone();
        self.set(default)
    }

    /// Register a callback for values arriving from outside this binding.
    pub fn subscribe(&mut self, observer: impl FnMut(&V) + Send + 'static) -> ObserverId {
        self.next_observer += 1;
        let id = ObserverId(self.next_observer);
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer, _)| *observer != id);
        self.observers.len() != before
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Re-read the store and publish the value if it differs from the cache.
    ///
    /// Returns `true` if the cache changed and observers were notified.
    pub async fn on_external_change(&mut self) -> bool {
        if self.signal.is_none() {
            return false;
        }

        let fresh = self.manager.read(&self.descriptor).await;
        if fresh == self.current {
            trace!(key = %self.descriptor.key(), "change signal not relevant");
            return false;
        }

        debug!(key = %self.descriptor.key(), "external change applied");
        self.current = fresh;
        for (_, observer) in self.observers.iter_mut() {
            observer(&self.current);
        }
        true
    }

    /// Wait for the next change to this key made outside this binding.
    ///
    /// Signals for unrelated changes are absorbed. Returns `None` once the
    /// binding is disposed or the store's notifier is gone.
    pub async fn next_change(&mut self) -> Option<&V> {
        loop {
            let fired = match self.signal.as_mut() {
                Some(signal) => signal.recv().await,
                None => return None,
            };
            if !fired {
                debug!(key = %self.descriptor.key(), "change signal closed");
                return None;
            }
            if self.on_external_change().await {
                return Some(&self.current);
            }
        }
    }

    /// Reconcile once if any change signals are already queued.
    ///
    /// Never waits for a new signal. Returns `true` if the value changed.
    pub async fn sync_pending(&mut self) -> bool {
        let fired = match self.signal.as_mut() {
            Some(signal) => signal.drain(),
            None => false,
        };
        fired && self.on_external_change().await
    }

    /// Release the change subscription and all observers.
    pub fn dispose(&mut self) {
        if self.signal.take().is_some() {
            self.observers.clear();
            debug!(key = %self.descriptor.key(), "binding disposed");
        }
    }
}

impl<V: StoreValue + fmt::Debug, C: Codec> fmt::Debug for ObservableBinding<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableBinding")
            .field("key", &self.descriptor.key())
            .field("current", &self.current)
            .field("state", &self.state())
            .field("observers", &self.observers.len())
            .finish()
    }
}
