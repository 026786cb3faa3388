//! Response cache for idempotent HTTP reads.
//!
//! [`Cache`] sits in front of a downstream stage (reached through
//! [`Context::next`]) and serves GET/HEAD responses from a previously
//! captured [`Entry`] while it is fresh. Entries live either in a
//! process-local map or in a pluggable byte-oriented [`Storage`];
//! [`Manager`] hides which one is active.

mod clock;
mod config;
mod context;
mod entry;
mod error;
mod handler;
mod key;
mod manager;
mod policy;
mod pool;
mod storage;
mod store;
mod sweep;

pub use clock::{Clock, TIMESTAMP_UPDATE_PERIOD};
pub use config::{CacheConfig, Exclude, ExpirationGenerator, KeyGenerator};
pub use context::Context;
pub use entry::Entry;
pub use error::StorageError;
pub use handler::{Cache, CacheStatus};
pub use key::CacheKey;
pub use manager::Manager;
pub use policy::{CachePolicy, parse_max_age};
pub use storage::{MemoryStorage, Storage};
pub use sweep::SWEEP_PERIOD;
