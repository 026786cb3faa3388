//! Approximate, cheaply readable clock.
//!
//! Reading the system time on every request is avoided: a background task
//! stores the current unix second into an atomic every
//! [`TIMESTAMP_UPDATE_PERIOD`], and lookups just load it. Expiration checks
//! are therefore only precise to one period; an entry can be served up to
//! one period after its nominal expiry.

use std::{
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

/// How often the shared timestamp is refreshed.
pub const TIMESTAMP_UPDATE_PERIOD: Duration = Duration::from_millis(300);

/// Shared seconds counter, refreshed in the background.
#[derive(Clone, Debug)]
pub struct Clock {
    ts: Arc<AtomicU64>,
}

impl Clock {
    /// Starts the refresh task on the current Tokio runtime.
    ///
    /// The task holds only a weak reference and ends on its next tick once
    /// every `Clock` handle has been dropped.
    pub fn start() -> Self {
        let ts = Arc::new(AtomicU64::new(unix_now()));
        tokio::spawn(refresh(Arc::downgrade(&ts)));
        Self { ts }
    }

    /// Current timestamp in whole seconds. Lock-free.
    pub fn now(&self) -> u64 {
        self.ts.load(Ordering::Acquire)
    }

    /// A clock that only moves when told to.
    #[cfg(test)]
    pub(crate) fn frozen(ts: u64) -> Self {
        Self {
            ts: Arc::new(AtomicU64::new(ts)),
        }
    }

    #[cfg(test)]
    pub(crate) fn advance(&self, secs: u64) {
        self.ts.fetch_add(secs, Ordering::AcqRel);
    }
}

async fn refresh(ts: Weak<AtomicU64>) {
    let mut ticker = interval(TIMESTAMP_UPDATE_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(ts) = ts.upgrade() else {
            debug!(target: "kura::clock", "All clock handles dropped; stopping refresh");
            return;
        };
        ts.store(unix_now(), Ordering::Release);
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn started_clock_tracks_system_time() {
        let clock = Clock::start();
        let now = unix_now();
        assert!(clock.now().abs_diff(now) <= 1);
    }

    #[test]
    fn frozen_clock_only_moves_on_advance() {
        let clock = Clock::frozen(100);
        assert_eq!(clock.now(), 100);
        clock.advance(5);
        assert_eq!(clock.now(), 105);
    }
}
