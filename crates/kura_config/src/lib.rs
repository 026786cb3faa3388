mod cache;
mod global;
mod kura;
mod server;
mod validation;

pub use cache::{CacheSettings, KeyStrategy, StorageKind};
pub use global::GlobalConfig;
pub use kura::KuraConfig;
pub use server::ServerConfig;
pub use validation::{ConfigReport, validate};
