//! Background removal of expired values from the in-process stores.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use tokio::{
    runtime::Handle,
    time::{MissedTickBehavior, interval},
};
use tracing::debug;

/// How often the in-process stores drop expired values.
pub const SWEEP_PERIOD: Duration = Duration::from_secs(10);

pub(crate) trait Sweep: Send + Sync + 'static {
    /// Drops every expired value and returns how many were removed.
    fn purge_expired(&self) -> usize;
}

/// Spawns a task calling [`Sweep::purge_expired`] every `period`.
///
/// The task holds only a weak reference and ends once `target` is dropped.
/// Outside a Tokio runtime nothing is spawned and expired values are only
/// dropped when touched.
pub(crate) fn spawn_sweeper<T: Sweep>(target: &Arc<T>, period: Duration, store: &'static str) {
    let Ok(handle) = Handle::try_current() else {
        debug!(target: "kura::manager", store, "No runtime; expired values are removed on access only");
        return;
    };
    handle.spawn(sweep(Arc::downgrade(target), period, store));
}

async fn sweep<T: Sweep>(target: Weak<T>, period: Duration, store: &'static str) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(target) = target.upgrade() else {
            debug!(target: "kura::manager", store, "Store dropped; stopping sweeper");
            return;
        };
        let removed = target.purge_expired();
        if removed > 0 {
            debug!(target: "kura::manager", store, removed, "Swept expired values");
        }
    }
}
