//! Free list of reusable entries.

use std::sync::Mutex;

use tracing::trace;

use crate::entry::Entry;

const MAX_POOLED_ENTRIES: usize = 1024;

/// Entries come out of the pool zeroed (`exp == 0`), so a fresh entry is
/// indistinguishable from an absent one.
#[derive(Debug, Default)]
pub(crate) struct EntryPool {
    free: Mutex<Vec<Entry>>,
}

impl EntryPool {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Takes a zeroed entry from the pool or allocates a new one.
    pub(crate) fn acquire(&self) -> Entry {
        self.free
            .lock()
            .ok()
            .and_then(|mut free| free.pop())
            .unwrap_or_default()
    }

    /// Zeroes an entry and keeps it for reuse.
    ///
    /// Taking the entry by value means whoever released it can no longer
    /// observe it being refilled.
    pub(crate) fn release(&self, mut entry: Entry) {
        entry.reset();
        let Ok(mut free) = self.free.lock() else {
            return;
        };
        if free.len() >= MAX_POOLED_ENTRIES {
            trace!(target: "kura::manager", "Entry pool full; dropping entry");
            return;
        }
        free.push(entry);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.free.lock().map(|f| f.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn released_entries_come_back_zeroed() {
        let pool = EntryPool::new();
        let mut entry = pool.acquire();
        entry.status = 200;
        entry.body = Bytes::from_static(b"x");
        entry.exp = 42;

        pool.release(entry);
        assert_eq!(pool.len(), 1);

        let reused = pool.acquire();
        assert_eq!(reused, Entry::default());
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn pool_is_bounded() {
        let pool = EntryPool::new();
        for _ in 0..MAX_POOLED_ENTRIES + 10 {
            pool.release(Entry::default());
        }
        assert_eq!(pool.len(), MAX_POOLED_ENTRIES);
    }
}
