//! Local store configuration.

use std::path::PathBuf;

use super::store::DEFAULT_MAX_BATCH_GET_KEYS;

/// Default directory of an on-disk store.
pub const DEFAULT_DATA_PATH: &str = "dynq-data";

/// How a [`LocalStore`](super::LocalStore) is opened and what it accepts.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store directory. Ignored for temporary stores.
    pub path: PathBuf,

    /// Keep nothing on disk after the store is dropped.
    pub temporary: bool,

    /// Page cache size, in bytes.
    pub cache_bytes: u64,

    /// Background flush period. `None` leaves flushing to explicit
    /// [`flush`](super::LocalStore::flush) calls.
    pub flush_interval_ms: Option<u64>,

    /// Keys accepted by one batched get; larger batches are rejected.
    pub max_batch_get_keys: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATA_PATH),
            temporary: false,
            cache_bytes: 64 << 20,
            flush_interval_ms: Some(500),
            max_batch_get_keys: DEFAULT_MAX_BATCH_GET_KEYS,
        }
    }
}

impl StoreConfig {
    /// On-disk store rooted at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// In-memory store, used by tests and `--temporary`.
    pub fn temporary() -> Self {
        Self {
            temporary: true,
            ..Self::default()
        }
    }

    pub fn with_max_batch_get_keys(mut self, keys: usize) -> Self {
        self.max_batch_get_keys = keys.max(1);
        self
    }

    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let config = sled::Config::new()
            .cache_capacity(self.cache_bytes)
            .flush_every_ms(self.flush_interval_ms);

        if self.temporary {
            config.temporary(true)
        } else {
            config.path(&self.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_limit_is_at_least_one() {
        let config = StoreConfig::temporary().with_max_batch_get_keys(0);
        assert_eq!(config.max_batch_get_keys, 1);
        assert!(config.temporary);
        assert_eq!(StoreConfig::new("x").max_batch_get_keys, DEFAULT_MAX_BATCH_GET_KEYS);
    }
}
