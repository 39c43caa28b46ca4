//! Configuration for byte stores.

use serde::Deserialize;
use std::time::Duration;

use crate::error::Result;
use crate::signal::DEFAULT_SIGNAL_CAPACITY;

/// Top-level store configuration.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Capacity of the change-signal channel. Subscribers that fall further
    /// behind than this see a single coalesced change.
    pub signal_capacity: usize,
    /// SQLite backend settings.
    pub sqlite: SqliteConfig,
}

impl StoreConfig {
    /// Parse a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            signal_capacity: DEFAULT_SIGNAL_CAPACITY,
            sqlite: SqliteConfig::default(),
        }
    }
}

/// SQLite backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Maximum pooled connections for file-backed stores.
    pub max_connections: u32,
    /// How long to wait on a locked database, in seconds.
    pub busy_timeout_secs: u64,
    /// Use write-ahead logging.
    pub wal: bool,
}

impl SqliteConfig {
    /// Busy timeout as a [`Duration`].
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            busy_timeout_secs: 30,
            wal: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.signal_capacity, 1024);
        assert_eq!(config.sqlite.max_connections, 5);
        assert_eq!(config.sqlite.busy_timeout(), Duration::from_secs(30));
        assert!(config.sqlite.wal);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = StoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config =
            StoreConfig::from_json_str(r#"{"signal_capacity": 8, "sqlite": {"wal": false}}"#)
                .unwrap();
        assert_eq!(config.signal_capacity, 8);
        assert!(!config.sqlite.wal);
        assert_eq!(config.sqlite.max_connections, 5);
    }

    #[test]
    fn test_malformed_json() {
        let err = StoreConfig::from_json_str("{signal_capacity").unwrap_err();
        assert!(matches!(err, StoreError::SerializationError(_)));
    }
}
