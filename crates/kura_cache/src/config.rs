//! Runtime cache configuration.

use std::{fmt, sync::Arc, time::Duration};

use bytes::Bytes;
use http::{HeaderName, Response, request};
use kura_config::{CacheSettings, KeyStrategy, StorageKind};
use tracing::warn;

use crate::{
    policy::{CachePolicy, parse_max_age},
    storage::{MemoryStorage, Storage},
};

/// Derives the request-specific part of the cache key.
pub type KeyGenerator = Arc<dyn Fn(&request::Parts) -> String + Send + Sync>;

/// Computes a per-response TTL, overriding [`CacheConfig::expiration`].
pub type ExpirationGenerator =
    Arc<dyn Fn(&request::Parts, &Response<Bytes>, &CacheConfig) -> Duration + Send + Sync>;

/// Returns true when a produced response must not be cached.
pub type Exclude = Arc<dyn Fn(&request::Parts, &Response<Bytes>) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct CacheConfig {
    /// Default TTL; `None` disables caching and every request passes through.
    pub expiration: Option<Duration>,
    /// Header carrying `unreachable`, `hit` or `miss`.
    pub cache_header: HeaderName,
    /// Emit `Cache-Control: public, max-age=N` on hits.
    pub cache_control: bool,
    pub store_response_headers: bool,
    pub key_generator: KeyGenerator,
    pub expiration_generator: Option<ExpirationGenerator>,
    pub exclude: Option<Exclude>,
    /// External storage; `None` keeps entries in process memory.
    pub storage: Option<Arc<dyn Storage>>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiration: Some(CachePolicy::default_ttl()),
            cache_header: HeaderName::from_static("x-cache"),
            cache_control: false,
            store_response_headers: false,
            key_generator: Arc::new(|parts: &request::Parts| parts.uri.path().to_string()),
            expiration_generator: None,
            exclude: None,
            storage: None,
        }
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("expiration", &self.expiration)
            .field("cache_header", &self.cache_header)
            .field("cache_control", &self.cache_control)
            .field("store_response_headers", &self.store_response_headers)
            .field("expiration_generator", &self.expiration_generator.is_some())
            .field("exclude", &self.exclude.is_some())
            .field("storage", &self.storage)
            .finish()
    }
}

impl CacheConfig {
    /// Builds the runtime configuration from the `[cache]` file section.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        let mut cfg = Self {
            expiration: u64::try_from(settings.expiration_secs())
                .ok()
                .map(Duration::from_secs),
            cache_control: settings.cache_control(),
            store_response_headers: settings.store_response_headers(),
            key_generator: key_generator_for(settings.key()),
            ..Self::default()
        };

        match HeaderName::try_from(settings.cache_header()) {
            Ok(name) => cfg.cache_header = name,
            Err(e) => warn!(
                target: "kura::cache",
                header = %settings.cache_header(),
                error = %e,
                "Invalid cache header name; using default"
            ),
        }

        if settings.exclude_errors() {
            cfg.exclude = Some(Arc::new(|_: &request::Parts, res: &Response<Bytes>| {
                res.status().is_client_error() || res.status().is_server_error()
            }));
        }

        if settings.respect_max_age() {
            cfg.expiration_generator = Some(Arc::new(
                |_: &request::Parts, res: &Response<Bytes>, cfg: &CacheConfig| {
                    parse_max_age(res.headers())
                        .or(cfg.expiration)
                        .unwrap_or_default()
                },
            ));
        }

        if settings.storage() == StorageKind::Memory {
            cfg.storage = Some(Arc::new(MemoryStorage::new()));
        }

        cfg
    }

    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.expiration = None;
        self
    }

    pub fn with_cache_control(mut self, enabled: bool) -> Self {
        self.cache_control = enabled;
        self
    }

    pub fn with_response_headers(mut self, enabled: bool) -> Self {
        self.store_response_headers = enabled;
        self
    }

    pub fn with_key_generator(
        mut self,
        generator: impl Fn(&request::Parts) -> String + Send + Sync + 'static,
    ) -> Self {
        self.key_generator = Arc::new(generator);
        self
    }

    pub fn with_expiration_generator(
        mut self,
        generator: impl Fn(&request::Parts, &Response<Bytes>, &CacheConfig) -> Duration
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.expiration_generator = Some(Arc::new(generator));
        self
    }

    pub fn with_exclude(
        mut self,
        exclude: impl Fn(&request::Parts, &Response<Bytes>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.exclude = Some(Arc::new(exclude));
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }
}

fn key_generator_for(strategy: KeyStrategy) -> KeyGenerator {
    match strategy {
        KeyStrategy::Path => Arc::new(|parts: &request::Parts| parts.uri.path().to_string()),
        KeyStrategy::PathAndQuery => Arc::new(|parts: &request::Parts| {
            parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| parts.uri.path().to_string())
        }),
        KeyStrategy::HostPath => Arc::new(|parts: &request::Parts| {
            let host = parts
                .headers
                .get(http::header::HOST)
                .and_then(|h| h.to_str().ok())
                .or_else(|| parts.uri.host())
                .unwrap_or_default();
            format!("{host}{}", parts.uri.path())
        }),
    }
}

#[cfg(test)]
mod tests {
    use http::{Request, StatusCode};

    use super::*;

    fn parts(uri: &str, host: Option<&str>) -> request::Parts {
        let mut builder = Request::get(uri);
        if let Some(host) = host {
            builder = builder.header(http::header::HOST, host);
        }
        builder.body(()).expect("request").into_parts().0
    }

    #[test]
    fn default_keys_by_path() {
        let cfg = CacheConfig::default();
        assert_eq!((cfg.key_generator)(&parts("/a/b?x=1", None)), "/a/b");
        assert_eq!(cfg.expiration, Some(Duration::from_secs(60)));
        assert_eq!(cfg.cache_header.as_str(), "x-cache");
    }

    #[test]
    fn key_strategies() {
        let pq = key_generator_for(KeyStrategy::PathAndQuery);
        assert_eq!(pq(&parts("/a?x=1", None)), "/a?x=1");

        let host = key_generator_for(KeyStrategy::HostPath);
        assert_eq!(host(&parts("/a?x=1", Some("example.com"))), "example.com/a");
    }

    #[test]
    fn negative_expiration_disables() {
        let settings = CacheSettings {
            expiration_secs: -1,
            ..CacheSettings::default()
        };
        assert!(CacheConfig::from_settings(&settings).expiration.is_none());
    }

    #[test]
    fn settings_install_predicates_and_storage() {
        let settings = CacheSettings {
            cache_header: "X-Edge-Cache".into(),
            exclude_errors: true,
            respect_max_age: true,
            storage: StorageKind::Memory,
            ..CacheSettings::default()
        };
        let cfg = CacheConfig::from_settings(&settings);
        assert_eq!(cfg.cache_header.as_str(), "x-edge-cache");
        assert!(cfg.storage.is_some());

        let req = parts("/", None);
        let exclude = cfg.exclude.clone().expect("exclude installed");
        let mut res = Response::new(Bytes::new());
        assert!(!exclude(&req, &res));
        *res.status_mut() = StatusCode::NOT_FOUND;
        assert!(exclude(&req, &res));

        let generator = cfg.expiration_generator.clone().expect("generator installed");
        assert_eq!(generator(&req, &res, &cfg), Duration::from_secs(60));
        res.headers_mut().insert(
            http::header::CACHE_CONTROL,
            http::HeaderValue::from_static("max-age=7"),
        );
        assert_eq!(generator(&req, &res, &cfg), Duration::from_secs(7));
    }
}
