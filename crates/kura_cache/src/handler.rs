//! The cache handler.
//!
//! Per request:
//! 1. non-GET/HEAD requests (or a disabled cache) go straight downstream and
//!    are tagged `unreachable`;
//! 2. the entry for `<key>_<METHOD>` is fetched and, under the global lock,
//!    either served (`hit`), evicted when stale, or found absent;
//! 3. on a miss the lock is released while the downstream stage runs, then
//!    re-taken to decide on and perform the population (`miss`).
//!
//! Concurrent misses on the same key are not coalesced: each one runs the
//! downstream stage and the last writer wins.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode, header};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::{
    clock::Clock, config::CacheConfig, context::Context, entry::Entry, key::CacheKey,
    manager::Manager, policy::CachePolicy,
};

/// Outcome reported in the cache status header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    /// Not eligible for caching; the downstream stage produced the response.
    Unreachable,
    /// Served from a fresh entry without running the downstream stage.
    Hit,
    /// Produced downstream and stored for later requests.
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Unreachable => "unreachable",
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct Cache {
    cfg: CacheConfig,
    manager: Manager,
    clock: Clock,
    // One lock for every key: it guards the check-then-act sections only,
    // never the downstream call.
    mux: RwLock<()>,
}

impl Cache {
    /// Builds the cache and starts its clock.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(cfg: CacheConfig) -> Self {
        Self::with_clock(cfg, Clock::start())
    }

    pub(crate) fn with_clock(cfg: CacheConfig, clock: Clock) -> Self {
        let manager = Manager::new(cfg.storage.clone(), clock.clone());
        Self {
            cfg,
            manager,
            clock,
            mux: RwLock::new(()),
        }
    }

    /// Runs one request through the cache.
    ///
    /// Errors from the downstream stage are returned unchanged and nothing
    /// is cached for that request. Storage failures are converted into the
    /// context's error type.
    #[instrument(
        skip_all,
        fields(method = %ctx.request().method, path = %ctx.request().uri.path())
    )]
    pub async fn handle<C: Context>(&self, ctx: &mut C) -> Result<CacheStatus, C::Error> {
        let Some(default_ttl) = self.cfg.expiration else {
            return self.pass_through(ctx).await;
        };
        if !CachePolicy::is_cacheable(&ctx.request().method) {
            return self.pass_through(ctx).await;
        }

        let key = CacheKey::new(
            &(self.cfg.key_generator)(ctx.request()),
            &ctx.request().method,
        );
        let mut entry = self.manager.get(key.as_str()).await?;

        {
            let guard = self.mux.write().await;
            let now = self.clock.now();

            if entry.is_expired(now) {
                debug!(target: "kura::cache", cache_key = %key, exp = entry.exp, now, "Cache entry stale");
                self.manager.evict(key.as_str()).await?;
            } else if entry.is_populated() {
                match StatusCode::from_u16(entry.status) {
                    Ok(status) => {
                        if self.manager.load_body(key.as_str(), &mut entry).await? {
                            self.serve_hit(ctx.response_mut(), status, &entry, now);
                            drop(guard);

                            debug!(target: "kura::cache", cache_key = %key, "Cache hit");
                            self.manager.release(entry);
                            return Ok(CacheStatus::Hit);
                        }
                        warn!(
                            target: "kura::cache",
                            cache_key = %key,
                            "Cached body missing from storage; evicting"
                        );
                        self.manager.evict(key.as_str()).await?;
                    }
                    Err(_) => {
                        warn!(
                            target: "kura::cache",
                            cache_key = %key,
                            status = entry.status,
                            "Cache entry has an invalid status; evicting"
                        );
                        self.manager.evict(key.as_str()).await?;
                    }
                }
            }
        }

        ctx.next().await?;

        let _guard = self.mux.write().await;

        if let Some(exclude) = &self.cfg.exclude {
            if exclude(ctx.request(), ctx.response()) {
                debug!(target: "kura::cache", cache_key = %key, "Response excluded from cache");
                return Ok(self.skip_store(ctx, entry));
            }
        }

        let ttl = match &self.cfg.expiration_generator {
            Some(generator) => generator(ctx.request(), ctx.response(), &self.cfg),
            None => default_ttl,
        };
        if ttl.as_secs() == 0 {
            debug!(target: "kura::cache", cache_key = %key, "Zero TTL; not storing");
            return Ok(self.skip_store(ctx, entry));
        }

        self.populate(&mut entry, ctx.response());
        entry.exp = self.clock.now().saturating_add(ttl.as_secs());

        debug!(
            target: "kura::cache",
            cache_key = %key,
            status = entry.status,
            ttl_secs = ttl.as_secs(),
            "Storing response"
        );
        self.manager.commit(key.as_str(), entry, ttl).await?;

        self.mark(ctx.response_mut(), CacheStatus::Miss);
        Ok(CacheStatus::Miss)
    }

    async fn pass_through<C: Context>(&self, ctx: &mut C) -> Result<CacheStatus, C::Error> {
        let result = ctx.next().await;
        self.mark(ctx.response_mut(), CacheStatus::Unreachable);
        result.map(|()| CacheStatus::Unreachable)
    }

    fn skip_store<C: Context>(&self, ctx: &mut C, entry: Entry) -> CacheStatus {
        self.manager.release(entry);
        self.mark(ctx.response_mut(), CacheStatus::Unreachable);
        CacheStatus::Unreachable
    }

    fn serve_hit(&self, res: &mut Response<Bytes>, status: StatusCode, entry: &Entry, now: u64) {
        *res.status_mut() = status;
        *res.body_mut() = entry.body.clone();

        let headers = res.headers_mut();
        if let Some(snapshot) = &entry.headers {
            for (name, value) in snapshot {
                let (Ok(name), Ok(value)) = (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_maybe_shared(value.clone()),
                ) else {
                    continue;
                };
                headers.append(name, value);
            }
        }
        set_bytes(headers, header::CONTENT_TYPE, &entry.content_type);
        set_bytes(headers, header::CONTENT_ENCODING, &entry.content_encoding);

        if self.cfg.cache_control {
            // Based on the approximate clock: may overstate the remaining
            // lifetime by up to one refresh period.
            let value = format!("public, max-age={}", entry.max_age(now));
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(header::CACHE_CONTROL, value);
            }
        }

        self.mark(res, CacheStatus::Hit);
    }

    fn populate(&self, entry: &mut Entry, res: &Response<Bytes>) {
        // `Bytes` is immutable, so sharing the body cannot observe later writes.
        entry.body = res.body().clone();
        entry.status = res.status().as_u16();
        entry.content_type = header_bytes(res.headers(), &header::CONTENT_TYPE);
        entry.content_encoding = header_bytes(res.headers(), &header::CONTENT_ENCODING);

        entry.headers = self.cfg.store_response_headers.then(|| {
            res.headers()
                .iter()
                .filter(|(name, _)| {
                    !CachePolicy::is_ignored_header(name) && **name != self.cfg.cache_header
                })
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        Bytes::copy_from_slice(value.as_bytes()),
                    )
                })
                .collect()
        });
    }

    fn mark(&self, res: &mut Response<Bytes>, status: CacheStatus) {
        res.headers_mut().insert(
            self.cfg.cache_header.clone(),
            HeaderValue::from_static(status.as_str()),
        );
    }
}

fn header_bytes(headers: &HeaderMap, name: &HeaderName) -> Bytes {
    headers
        .get(name)
        .map(|v| Bytes::copy_from_slice(v.as_bytes()))
        .unwrap_or_default()
}

fn set_bytes(headers: &mut HeaderMap, name: HeaderName, value: &Bytes) {
    if value.is_empty() {
        return;
    }
    if let Ok(value) = HeaderValue::from_maybe_shared(value.clone()) {
        headers.insert(name, value);
    }
}
