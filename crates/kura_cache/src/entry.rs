use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One cached response.
///
/// `exp` is an absolute [`Clock`](crate::Clock) timestamp; `0` means the
/// entry was never populated and is treated as absent. The body is never
/// part of the serialized form: with external storage it is persisted
/// separately under its own key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub status: u16,
    #[serde(default)]
    pub content_type: Bytes,
    #[serde(default)]
    pub content_encoding: Bytes,
    #[serde(skip)]
    pub body: Bytes,
    /// Snapshot of end-to-end response headers, when header preservation is on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<(String, Bytes)>>,
    pub exp: u64,
}

impl Entry {
    /// True once the entry carries a response.
    pub fn is_populated(&self) -> bool {
        self.exp != 0
    }

    /// True when the entry carries a response that is no longer fresh at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.exp != 0 && now >= self.exp
    }

    /// Seconds left before expiry, as seen from `now`.
    pub fn max_age(&self, now: u64) -> u64 {
        self.exp.saturating_sub(now)
    }

    /// Clears every field back to the absent state, keeping nothing alive.
    pub(crate) fn reset(&mut self) {
        self.status = 0;
        self.content_type = Bytes::new();
        self.content_encoding = Bytes::new();
        self.body = Bytes::new();
        self.headers = None;
        self.exp = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> Entry {
        Entry {
            status: 200,
            content_type: Bytes::from_static(b"text/plain"),
            content_encoding: Bytes::from_static(b"gzip"),
            body: Bytes::from_static(b"hello"),
            headers: Some(vec![("x-custom".into(), Bytes::from_static(b"1"))]),
            exp: 110,
        }
    }

    #[test]
    fn zero_exp_is_absent_and_never_expired() {
        let entry = Entry::default();
        assert!(!entry.is_populated());
        assert!(!entry.is_expired(u64::MAX));
    }

    #[test]
    fn expires_when_clock_reaches_exp() {
        let entry = populated();
        assert!(!entry.is_expired(109));
        assert!(entry.is_expired(110));
        assert!(entry.is_expired(111));
    }

    #[test]
    fn max_age_never_underflows() {
        let entry = populated();
        assert_eq!(entry.max_age(100), 10);
        assert_eq!(entry.max_age(200), 0);
    }

    #[test]
    fn serialized_form_excludes_body() {
        let entry = populated();
        let encoded = serde_json::to_vec(&entry).expect("encode");
        let decoded: Entry = serde_json::from_slice(&encoded).expect("decode");

        assert!(decoded.body.is_empty());
        assert_eq!(decoded.status, 200);
        assert_eq!(decoded.content_type, entry.content_type);
        assert_eq!(decoded.headers, entry.headers);
        assert_eq!(decoded.exp, 110);
    }

    #[test]
    fn reset_returns_to_default() {
        let mut entry = populated();
        entry.reset();
        assert_eq!(entry, Entry::default());
    }
}
