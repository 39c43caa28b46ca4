//! Key descriptors and the descriptor registry.
//!
//! A [`KeyDescriptor`] ties a store key to a value type and a default. The
//! [`DescriptorRegistry`] is an explicit value object consumers build at
//! startup, so no per-type global state is needed.

use parking_lot::RwLock;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::codec::StoreValue;
use crate::error::{Result, StoreError};
use crate::store::validate_key;

/// Type-safe binding of a store key to a value type and its default.
///
/// Cloning is cheap; the key and default are shared and immutable.
pub struct KeyDescriptor<V> {
    key: Arc<str>,
    default: Arc<V>,
}

impl<V> KeyDescriptor<V> {
    /// Create a descriptor without going through a registry.
    ///
    /// Nothing checks that `key` is not used elsewhere with another type.
    pub fn new(key: impl Into<Arc<str>>, default: V) -> Self {
        Self {
            key: key.into(),
            default: Arc::new(default),
        }
    }

    /// The store key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The value used when the store has nothing usable.
    pub fn default_value(&self) -> &V {
        &self.default
    }
}

impl<V> Clone for KeyDescriptor<V> {
    fn clone(&self) -> Self {
        Self {
            key: Arc::clone(&self.key),
            default: Arc::clone(&self.default),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for KeyDescriptor<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDescriptor")
            .field("key", &self.key)
            .field("default", &self.default)
            .finish()
    }
}

struct Registration {
    type_id: TypeId,
    type_name: &'static str,
    descriptor: Box<dyn Any + Send + Sync>,
}

/// Registry mapping unique keys to (value type, default).
///
/// Registering a key twice with the same type and default returns the
/// original descriptor. A different type or default is rejected.
#[derive(Default)]
pub struct DescriptorRegistry {
    entries: RwLock<HashMap<String, Registration>>,
}

impl fmt::Debug for DescriptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

impl DescriptorRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` for values of type `V` with the given default.
    pub fn register<V: StoreValue>(
        &self,
        key: impl Into<String>,
        default: V,
    ) -> Result<KeyDescriptor<V>> {
        let key = key.into();
        validate_key(&key)?;

        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&key) {
            if existing.type_id != TypeId::of::<V>() {
                return Err(StoreError::KeyCollision {
                    key,
                    registered: existing.type_name,
                    requested: type_name::<V>(),
                });
            }
            return match existing.descriptor.downcast_ref::<KeyDescriptor<V>>() {
                Some(descriptor) if *descriptor.default_value() == default => {
                    Ok(descriptor.clone())
                }
                _ => Err(StoreError::DefaultConflict(key)),
            };
        }

        let descriptor = KeyDescriptor::new(key.as_str(), default);
        debug!(key = %key, value_type = type_name::<V>(), "registered settings key");
        entries.insert(
            key,
            Registration {
                type_id: TypeId::of::<V>(),
                type_name: type_name::<V>(),
                descriptor: Box::new(descriptor.clone()),
            },
        );
        Ok(descriptor)
    }

    /// Look up the descriptor for `key`.
    ///
    /// Returns `None` if the key is unknown or registered with another type.
    pub fn descriptor<V: StoreValue>(&self, key: &str) -> Option<KeyDescriptor<V>> {
        self.entries
            .read()
            .get(key)
            .and_then(|reg| reg.descriptor.downcast_ref::<KeyDescriptor<V>>())
            .cloned()
    }

    /// Whether `key` has been registered.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// All registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_accessors() {
        let d = KeyDescriptor::new("volume", 0.5f64);
        assert_eq!(d.key(), "volume");
        assert_eq!(*d.default_value(), 0.5);

        let cloned = d.clone();
        assert_eq!(cloned.key(), d.key());
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = DescriptorRegistry::new();
        assert!(registry.is_empty());

        registry.register("theme", "light".to_string()).unwrap();
        registry.register("volume", 7u32).unwrap();

        let theme = registry.descriptor::<String>("theme").unwrap();
        assert_eq!(theme.default_value(), "light");
        assert_eq!(registry.keys(), vec!["theme".to_string(), "volume".to_string()]);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("volume"));
    }

    #[test]
    fn test_lookup_wrong_type() {
        let registry = DescriptorRegistry::new();
        registry.register("volume", 7u32).unwrap();

        assert!(registry.descriptor::<String>("volume").is_none());
        assert!(registry.descriptor::<u32>("missing").is_none());
    }

    #[test]
    fn test_register_same_type_twice() {
        let registry = DescriptorRegistry::new();
        registry.register("volume", 7u32).unwrap();

        let again = registry.register("volume", 7u32).unwrap();
        assert_eq!(*again.default_value(), 7);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_collision() {
        let registry = DescriptorRegistry::new();
        registry.register("volume", 7u32).unwrap();

        let err = registry.register("volume", "loud".to_string()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::KeyCollision { registered: "u32", .. }
        ));
    }

    #[test]
    fn test_register_default_conflict() {
        let registry = DescriptorRegistry::new();
        registry.register("volume", 7u32).unwrap();

        let err = registry.register("volume", 8u32).unwrap_err();
        assert!(matches!(err, StoreError::DefaultConflict(_)));
        assert_eq!(*registry.descriptor::<u32>("volume").unwrap().default_value(), 7);
    }

    #[test]
    fn test_register_invalid_key() {
        let registry = DescriptorRegistry::new();
        let err = registry.register("", 1u8).unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }
}
