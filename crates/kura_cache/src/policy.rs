use std::time::Duration;

use http::{HeaderMap, HeaderName, Method, header};

/// Headers never copied into an entry's header snapshot.
///
/// Hop-by-hop headers only describe the original connection. Content-Type
/// and Content-Encoding are captured in dedicated entry fields.
const IGNORED_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "content-type",
    "content-encoding",
];

pub struct CachePolicy;

impl CachePolicy {
    pub fn is_cacheable(method: &Method) -> bool {
        matches!(*method, Method::GET | Method::HEAD)
    }

    pub fn default_ttl() -> Duration {
        Duration::from_secs(60)
    }

    pub fn is_ignored_header(name: &HeaderName) -> bool {
        IGNORED_HEADERS.contains(&name.as_str())
    }
}

/// Reads `max-age` out of a response's `Cache-Control` header.
///
/// `s-maxage` is ignored; `no-store`/`no-cache` yield a zero TTL.
pub fn parse_max_age(headers: &HeaderMap) -> Option<Duration> {
    let mut max_age = None;
    for value in headers.get_all(header::CACHE_CONTROL) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for directive in value.split(',') {
            let directive = directive.trim();
            if directive.eq_ignore_ascii_case("no-store") || directive.eq_ignore_ascii_case("no-cache")
            {
                return Some(Duration::ZERO);
            }
            let Some((name, arg)) = directive.split_once('=') else {
                continue;
            };
            if name.trim().eq_ignore_ascii_case("max-age") {
                if let Ok(secs) = arg.trim().trim_matches('"').parse::<u64>() {
                    max_age = Some(Duration::from_secs(secs));
                }
            }
        }
    }
    max_age
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    #[test]
    fn only_safe_reads_are_cacheable() {
        assert!(CachePolicy::is_cacheable(&Method::GET));
        assert!(CachePolicy::is_cacheable(&Method::HEAD));
        assert!(!CachePolicy::is_cacheable(&Method::POST));
        assert!(!CachePolicy::is_cacheable(&Method::PUT));
        assert!(!CachePolicy::is_cacheable(&Method::DELETE));
    }

    #[test]
    fn hop_by_hop_and_explicit_headers_are_ignored() {
        assert!(CachePolicy::is_ignored_header(&header::CONNECTION));
        assert!(CachePolicy::is_ignored_header(&header::TRANSFER_ENCODING));
        assert!(CachePolicy::is_ignored_header(&header::CONTENT_TYPE));
        assert!(CachePolicy::is_ignored_header(&header::CONTENT_ENCODING));
        assert!(!CachePolicy::is_ignored_header(&header::ETAG));
        assert!(!CachePolicy::is_ignored_header(&HeaderName::from_static("x-custom")));
    }

    #[test]
    fn parse_max_age_reads_directive() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=120"),
        );
        assert_eq!(parse_max_age(&headers), Some(Duration::from_secs(120)));
    }

    #[test]
    fn parse_max_age_no_store_is_zero() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, max-age=120"),
        );
        assert_eq!(parse_max_age(&headers), Some(Duration::ZERO));
    }

    #[test]
    fn parse_max_age_absent() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_max_age(&headers), None);
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("public"));
        assert_eq!(parse_max_age(&headers), None);
    }
}
