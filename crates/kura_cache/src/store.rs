use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::warn;

use crate::clock::Clock;
use crate::entry::Entry;
use crate::sweep::{Sweep, spawn_sweeper};

#[derive(Debug)]
struct Slot {
    entry: Entry,
    // Clock second at which the slot may be swept; `None` never expires.
    deadline: Option<u64>,
}

#[derive(Debug)]
struct Entries {
    map: RwLock<HashMap<String, Slot>>,
    clock: Clock,
}

impl Sweep for Entries {
    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let Ok(mut map) = self.map.write() else {
            return 0;
        };
        let before = map.len();
        map.retain(|_, slot| slot.deadline.is_none_or(|deadline| now < deadline));
        before - map.len()
    }
}

/// Process-local entry map used when no external storage is configured.
///
/// Entries past their time-to-live are removed by a background sweep even
/// if their key is never requested again.
#[derive(Debug)]
pub(crate) struct MemoryCacheStore {
    inner: Arc<Entries>,
}

impl MemoryCacheStore {
    pub(crate) fn new(clock: Clock, sweep_period: Duration) -> Self {
        let inner = Arc::new(Entries {
            map: RwLock::new(HashMap::new()),
            clock,
        });
        spawn_sweeper(&inner, sweep_period, "local");
        Self { inner }
    }

    pub(crate) fn get(&self, key: &str) -> Option<Entry> {
        self.inner.map.read().ok()?.get(key).map(|slot| slot.entry.clone())
    }

    pub(crate) fn insert(&self, key: &str, entry: Entry, ttl: Duration) {
        let deadline =
            (!ttl.is_zero()).then(|| self.inner.clock.now().saturating_add(ttl.as_secs()));
        match self.inner.map.write() {
            Ok(mut map) => {
                map.insert(key.to_string(), Slot { entry, deadline });
            }
            Err(_) => {
                warn!(
                    target: "kura::manager",
                    cache_key = %key,
                    "Local cache map poisoned; entry not stored"
                );
            }
        }
    }

    pub(crate) fn remove(&self, key: &str) -> Option<Entry> {
        self.inner.map.write().ok()?.remove(key).map(|slot| slot.entry)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.map.read().map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(exp: u64) -> Entry {
        Entry {
            status: 200,
            exp,
            ..Entry::default()
        }
    }

    #[tokio::test]
    async fn expired_entries_are_swept_without_lookup() {
        let clock = Clock::frozen(1_000);
        let store = MemoryCacheStore::new(clock.clone(), Duration::from_millis(20));
        for i in 0..100 {
            store.insert(&format!("/k{i}_GET"), entry(1_001), Duration::from_secs(1));
        }
        store.insert("/forever_GET", entry(0), Duration::ZERO);
        assert_eq!(store.len(), 101);

        clock.advance(3_600);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(store.len(), 1);
        assert!(store.get("/forever_GET").is_some());
    }

    #[test]
    fn purge_keeps_entries_before_their_deadline() {
        let clock = Clock::frozen(1_000);
        let store = MemoryCacheStore::new(clock.clone(), Duration::from_secs(60));
        store.insert("short", entry(1_002), Duration::from_secs(2));
        store.insert("long", entry(1_010), Duration::from_secs(10));

        clock.advance(1);
        assert_eq!(store.inner.purge_expired(), 0);

        clock.advance(1);
        assert_eq!(store.inner.purge_expired(), 1);
        assert!(store.get("short").is_none());
        assert!(store.get("long").is_some());
    }

    #[test]
    fn insert_into_poisoned_map_is_dropped() {
        let store = MemoryCacheStore::new(Clock::frozen(1_000), Duration::from_secs(60));
        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _map = store.inner.map.write().expect("first writer");
            panic!("writer died");
        }));
        assert!(poisoned.is_err());

        store.insert("k", entry(1_010), Duration::from_secs(10));
        assert!(store.get("k").is_none());
    }
}
