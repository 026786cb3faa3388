//! Byte-oriented external storage.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::{
    error::StorageError,
    sweep::{SWEEP_PERIOD, Sweep, spawn_sweeper},
};

/// A key-value store holding raw bytes with a time-to-live.
///
/// A zero `ttl` means the value does not expire on its own. Eviction under
/// memory pressure is entirely up to the implementation.
#[async_trait]
pub trait Storage: Send + Sync + fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError>;

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug)]
struct StoredValue {
    data: Bytes,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

#[derive(Debug, Default)]
struct Values(DashMap<String, StoredValue>);

impl Sweep for Values {
    fn purge_expired(&self) -> usize {
        let before = self.0.len();
        self.0.retain(|_, value| !value.is_expired());
        before.saturating_sub(self.0.len())
    }
}

/// In-process [`Storage`] backed by a concurrent map.
///
/// Expired values are dropped when read and by a background sweep every
/// [`SWEEP_PERIOD`].
#[derive(Debug)]
pub struct MemoryStorage {
    inner: Arc<Values>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_sweep_period(SWEEP_PERIOD)
    }

    pub fn with_sweep_period(period: Duration) -> Self {
        let inner = Arc::new(Values::default());
        spawn_sweeper(&inner, period, "memory");
        Self { inner }
    }

    /// Number of stored keys, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.inner.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.0.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        if let Some(value) = self.inner.0.get(key) {
            if !value.is_expired() {
                return Ok(Some(value.data.clone()));
            }
        }
        self.inner.0.remove_if(key, |_, value| value.is_expired());
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StorageError> {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Instant::now().checked_add(ttl)
        };
        self.inner.0.insert(
            key.to_string(),
            StoredValue {
                data: value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.inner.0.remove(key);
        Ok(())
    }
}
