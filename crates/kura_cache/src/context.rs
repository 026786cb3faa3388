use async_trait::async_trait;
use bytes::Bytes;
use http::{Response, request};

use crate::error::StorageError;

/// Per-request view the cache needs from the surrounding server.
///
/// The response starts out empty. [`Context::next`] runs the downstream
/// stage, which fills in [`Context::response_mut`]; on a cache hit the cache
/// fills it in instead and `next` is never called.
#[async_trait]
pub trait Context: Send {
    /// Error type of the downstream stage. Storage failures are converted
    /// into it so they surface through the same channel.
    type Error: From<StorageError> + Send;

    fn request(&self) -> &request::Parts;

    fn response(&self) -> &Response<Bytes>;

    fn response_mut(&mut self) -> &mut Response<Bytes>;

    async fn next(&mut self) -> Result<(), Self::Error>;
}
