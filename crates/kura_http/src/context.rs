use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Response, request};
use kura_cache::Context;

use crate::origin::Origin;

/// One in-flight request: the parsed head, the collected body, and the
/// response being built for it.
pub struct HttpContext {
    parts: request::Parts,
    body: Bytes,
    response: Response<Bytes>,
    origin: Arc<dyn Origin>,
}

impl HttpContext {
    pub fn new(parts: request::Parts, body: Bytes, origin: Arc<dyn Origin>) -> Self {
        Self {
            parts,
            body,
            response: Response::new(Bytes::new()),
            origin,
        }
    }

    pub fn into_response(self) -> Response<Bytes> {
        self.response
    }
}

#[async_trait]
impl Context for HttpContext {
    type Error = anyhow::Error;

    fn request(&self) -> &request::Parts {
        &self.parts
    }

    fn response(&self) -> &Response<Bytes> {
        &self.response
    }

    fn response_mut(&mut self) -> &mut Response<Bytes> {
        &mut self.response
    }

    async fn next(&mut self) -> anyhow::Result<()> {
        self.response = self.origin.respond(&self.parts, &self.body).await?;
        Ok(())
    }
}
