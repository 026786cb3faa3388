//! Entry lifecycle across the two storage backends.
//!
//! Without external storage, entries are kept as values in a local map and
//! handed out as clones (bodies are `Bytes`, so cloning shares the buffer).
//! With external storage, entry metadata is JSON-encoded under the cache key
//! and the body is stored raw under `<key>_body`.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::{
    clock::Clock, entry::Entry, error::StorageError, key::body_key, pool::EntryPool,
    storage::Storage, store::MemoryCacheStore, sweep::SWEEP_PERIOD,
};

#[derive(Debug)]
pub struct Manager {
    pool: EntryPool,
    memory: MemoryCacheStore,
    storage: Option<Arc<dyn Storage>>,
}

impl Manager {
    /// Local entries expire against `clock` and are swept in the background.
    pub fn new(storage: Option<Arc<dyn Storage>>, clock: Clock) -> Self {
        Self::with_sweep_period(storage, clock, SWEEP_PERIOD)
    }

    pub(crate) fn with_sweep_period(
        storage: Option<Arc<dyn Storage>>,
        clock: Clock,
        sweep_period: Duration,
    ) -> Self {
        Self {
            pool: EntryPool::new(),
            memory: MemoryCacheStore::new(clock, sweep_period),
            storage,
        }
    }

    /// Entry stored under `key`, or a zeroed pooled one when there is none.
    ///
    /// With external storage the returned entry has an empty body; see
    /// [`Manager::get_raw`].
    pub async fn get(&self, key: &str) -> Result<Entry, StorageError> {
        let Some(storage) = &self.storage else {
            return Ok(self.memory.get(key).unwrap_or_else(|| self.pool.acquire()));
        };

        let Some(raw) = storage.get(key).await? else {
            return Ok(self.pool.acquire());
        };

        match serde_json::from_slice::<Entry>(&raw) {
            Ok(entry) => Ok(entry),
            Err(e) => {
                warn!(
                    target: "kura::manager",
                    cache_key = %key,
                    error = %e,
                    "Undecodable cache entry; treating as absent"
                );
                Ok(self.pool.acquire())
            }
        }
    }

    /// Raw bytes stored under `key`, if any.
    pub async fn get_raw(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        self.external(key)?.get(key).await
    }

    /// Persists `entry` under `key` for `ttl` (zero keeps it until deleted).
    ///
    /// Locally the entry itself becomes the stored value. Externally its
    /// metadata is encoded (never the body) and the entry goes back to the
    /// pool once the write has completed.
    pub async fn set(&self, key: &str, entry: Entry, ttl: Duration) -> Result<(), StorageError> {
        let Some(storage) = &self.storage else {
            self.memory.insert(key, entry, ttl);
            return Ok(());
        };

        let encoded = serde_json::to_vec(&entry).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;
        storage.set(key, Bytes::from(encoded), ttl).await?;
        self.release(entry);
        Ok(())
    }

    pub async fn set_raw(&self, key: &str, raw: Bytes, ttl: Duration) -> Result<(), StorageError> {
        self.external(key)?.set(key, raw, ttl).await
    }

    /// Removes the value under `key`. Paired body keys are the caller's concern.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match &self.storage {
            Some(storage) => storage.delete(key).await,
            None => {
                if let Some(entry) = self.memory.remove(key) {
                    self.release(entry);
                }
                Ok(())
            }
        }
    }

    /// Returns an entry to the reuse pool.
    pub fn release(&self, entry: Entry) {
        self.pool.release(entry);
    }

    /// Fills in the body of an entry read with [`Manager::get`].
    ///
    /// Returns `false` when external storage no longer holds the body; the
    /// entry must then not be served.
    pub(crate) async fn load_body(&self, key: &str, entry: &mut Entry) -> Result<bool, StorageError> {
        if self.storage.is_none() {
            return Ok(true);
        }
        match self.get_raw(&body_key(key)).await? {
            Some(body) => {
                entry.body = body;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stores a freshly populated entry, splitting off the body when external.
    pub(crate) async fn commit(
        &self,
        key: &str,
        mut entry: Entry,
        ttl: Duration,
    ) -> Result<(), StorageError> {
        if self.storage.is_some() {
            let body = std::mem::take(&mut entry.body);
            self.set_raw(&body_key(key), body, ttl).await?;
        }
        self.set(key, entry, ttl).await
    }

    /// Deletes an entry together with its body key.
    pub(crate) async fn evict(&self, key: &str) -> Result<(), StorageError> {
        self.delete(key).await?;
        if self.storage.is_some() {
            self.delete(&body_key(key)).await?;
        }
        debug!(target: "kura::manager", cache_key = %key, "Evicted cache entry");
        Ok(())
    }

    fn external(&self, key: &str) -> Result<&Arc<dyn Storage>, StorageError> {
        self.storage
            .as_ref()
            .ok_or_else(|| StorageError::NoExternalStorage {
                key: key.to_string(),
            })
    }

    #[cfg(test)]
    pub(crate) fn local_len(&self) -> usize {
        self.memory.len()
    }

    #[cfg(test)]
    pub(crate) fn pooled(&self) -> usize {
        self.pool.len()
    }
}
