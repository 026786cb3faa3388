use thiserror::Error;

/// Failure of a cache storage operation.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend failed on `{key}`: {message}")]
    Backend { key: String, message: String },

    #[error("failed to encode cache entry `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("raw value `{key}` requires an external storage backend")]
    NoExternalStorage { key: String },
}

impl StorageError {
    /// Convenience for backend implementations.
    pub fn backend(key: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Backend {
            key: key.into(),
            message: message.to_string(),
        }
    }
}
