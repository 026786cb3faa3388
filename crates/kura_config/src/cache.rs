use serde::Deserialize;

// =======================================================
// CACHE KEY STRATEGY
// =======================================================
/// Which part of the request identifies a cache entry.
///
/// The HTTP method is always appended by the cache engine, so this only
/// selects the request-specific prefix.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyStrategy {
    #[default]
    #[serde(rename = "path")]
    Path,
    #[serde(rename = "path_and_query")]
    PathAndQuery,
    #[serde(rename = "host_path")]
    HostPath,
}

// =======================================================
// STORAGE KIND
// =======================================================
/// Where cache entries live.
///
/// - `local`: entries are kept as values in a process-local map.
/// - `memory`: entries go through the byte-oriented storage interface
///   (metadata and body under separate keys), backed by the in-process
///   byte store.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageKind {
    #[default]
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "memory")]
    Memory,
}

// =======================================================
// CACHE SETTINGS + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Default TTL in seconds. Negative disables caching entirely.
    pub expiration_secs: i64,
    /// Response header reporting `unreachable` / `hit` / `miss`.
    pub cache_header: String,
    /// Emit `Cache-Control: public, max-age=N` on hits.
    pub cache_control: bool,
    /// Snapshot end-to-end response headers into the entry.
    pub store_response_headers: bool,
    pub key: KeyStrategy,
    pub storage: StorageKind,
    /// Do not cache responses with status >= 400.
    pub exclude_errors: bool,
    /// Let an upstream `Cache-Control: max-age=N` override the TTL.
    pub respect_max_age: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            expiration_secs: 60,
            cache_header: "X-Cache".into(),
            cache_control: false,
            store_response_headers: false,
            key: KeyStrategy::Path,
            storage: StorageKind::Local,
            exclude_errors: false,
            respect_max_age: false,
        }
    }
}

impl CacheSettings {
    /// Returns false when a negative expiration turned the cache off.
    pub fn enabled(&self) -> bool {
        self.expiration_secs >= 0
    }

    pub fn expiration_secs(&self) -> i64 {
        self.expiration_secs
    }

    pub fn cache_header(&self) -> &str {
        &self.cache_header
    }

    pub fn cache_control(&self) -> bool {
        self.cache_control
    }

    pub fn store_response_headers(&self) -> bool {
        self.store_response_headers
    }

    pub fn key(&self) -> KeyStrategy {
        self.key
    }

    pub fn storage(&self) -> StorageKind {
        self.storage
    }

    pub fn exclude_errors(&self) -> bool {
        self.exclude_errors
    }

    pub fn respect_max_age(&self) -> bool {
        self.respect_max_age
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &CacheSettings) {
        if self.cache_header.trim().is_empty() {
            self.cache_header = defaults.cache_header.clone();
        }
    }
}
