//! Downstream stages reached on a cache miss.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderValue, Method, Response, StatusCode, header, request};
use kura_config::ServerConfig;
use tokio::fs;
use tracing::{debug, instrument};

use crate::fs::PathResolver;

/// Produces the original response for a request.
#[async_trait]
pub trait Origin: Send + Sync {
    async fn respond(&self, parts: &request::Parts, body: &Bytes)
    -> anyhow::Result<Response<Bytes>>;
}

/// Serves files below a root directory.
#[derive(Debug, Clone)]
pub struct StaticOrigin {
    root: PathBuf,
    index: String,
}

impl StaticOrigin {
    pub fn new(root: impl Into<PathBuf>, index: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            index: index.into(),
        }
    }

    pub fn from_config(cfg: &ServerConfig) -> Self {
        Self::new(cfg.root(), cfg.index())
    }

    async fn read(&self, path: &Path) -> anyhow::Result<Option<(Bytes, Option<String>)>> {
        let meta = match fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("stat {}", path.display()));
            }
        };
        if !meta.is_file() {
            return Ok(None);
        }

        let data = fs::read(path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        let last_modified = meta.modified().ok().map(httpdate::fmt_http_date);
        Ok(Some((Bytes::from(data), last_modified)))
    }
}

#[async_trait]
impl Origin for StaticOrigin {
    #[instrument(skip_all, fields(path = %parts.uri.path()))]
    async fn respond(
        &self,
        parts: &request::Parts,
        _body: &Bytes,
    ) -> anyhow::Result<Response<Bytes>> {
        if parts.method != Method::GET && parts.method != Method::HEAD {
            let mut res = plain(StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed\n");
            res.headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
            return Ok(res);
        }

        let Some(relative) = PathResolver::resolve_relative_path(parts.uri.path(), &self.index)
        else {
            debug!(target: "kura::origin", "Rejected unsafe path");
            return Ok(plain(StatusCode::NOT_FOUND, "404 Not Found\n"));
        };

        let full_path = self.root.join(&relative);
        let Some((data, last_modified)) = self.read(&full_path).await? else {
            debug!(target: "kura::origin", file = %full_path.display(), "File not found");
            return Ok(plain(StatusCode::NOT_FOUND, "404 Not Found\n"));
        };

        let mime = mime_guess::from_path(&full_path).first_or_octet_stream();
        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, mime.as_ref())
            .header(header::CONTENT_LENGTH, data.len());
        if let Some(last_modified) = last_modified {
            builder = builder.header(header::LAST_MODIFIED, last_modified);
        }

        let body = if parts.method == Method::HEAD {
            Bytes::new()
        } else {
            data
        };
        Ok(builder.body(body)?)
    }
}

pub(crate) fn plain(status: StatusCode, body: &'static str) -> Response<Bytes> {
    let mut res = Response::new(Bytes::from_static(body.as_bytes()));
    *res.status_mut() = status;
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    res
}
