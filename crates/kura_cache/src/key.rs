use http::Method;

const SEPARATOR: char = '_';
const BODY_SUFFIX: &str = "_body";

/// Storage key of a cacheable request.
///
/// The method is folded in so GET and HEAD never share an entry.
#[derive(Clone, Hash, Eq, PartialEq, Debug)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(generated: &str, method: &Method) -> Self {
        let method = method.as_str();
        let mut key = String::with_capacity(generated.len() + 1 + method.len());
        key.push_str(generated);
        key.push(SEPARATOR);
        key.push_str(method);
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key under which external storage keeps the raw body of `key`.
pub(crate) fn body_key(key: &str) -> String {
    format!("{key}{BODY_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_is_appended() {
        assert_eq!(CacheKey::new("/a", &Method::GET).as_str(), "/a_GET");
        assert_eq!(CacheKey::new("/a", &Method::HEAD).as_str(), "/a_HEAD");
    }

    #[test]
    fn get_and_head_do_not_collide() {
        assert_ne!(
            CacheKey::new("/a", &Method::GET),
            CacheKey::new("/a", &Method::HEAD)
        );
    }

    #[test]
    fn body_key_is_suffixed() {
        let key = CacheKey::new("/a", &Method::GET);
        assert_eq!(body_key(key.as_str()), "/a_GET_body");
    }
}
