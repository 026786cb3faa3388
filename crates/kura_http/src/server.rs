//! Listener, accept loop and per-connection HTTP/1.1 serving.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use kura_cache::{Cache, Context};
use kura_config::KuraConfig;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::Semaphore,
};
use tracing::{debug, error, info, instrument, warn};

use crate::{context::HttpContext, origin::Origin, origin::plain};

pub struct Server {
    cfg: Arc<KuraConfig>,
    cache: Arc<Cache>,
    origin: Arc<dyn Origin>,
}

impl Server {
    pub fn new(cfg: KuraConfig, cache: Cache, origin: Arc<dyn Origin>) -> Self {
        Self {
            cfg: Arc::new(cfg),
            cache: Arc::new(cache),
            origin,
        }
    }

    /// Binds the configured listen address and serves until the listener fails.
    pub async fn run(self) -> anyhow::Result<()> {
        info!(target: "kura::server", "Starting KURA");
        info!(
            target: "kura::server",
            worker_connections = self.cfg.global.worker_connections,
            log_level = %self.cfg.global.log_level,
            "Global configuration loaded"
        );

        let listener = bind_listener(self.cfg.server.listen()).await?;
        self.serve(listener).await
    }

    /// Accepts connections on `listener`, one task per connection.
    #[instrument(skip_all, fields(listen = %self.cfg.server.listen()))]
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let max_conns = self.cfg.global.worker_connections as usize;
        let semaphore = Arc::new(Semaphore::new(max_conns));
        info!(target: "kura::server", max_conns, "Connection semaphore initialized");

        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(target: "kura::server", error = ?e, "Failed to accept connection");
                    return Err(e.into());
                }
            };

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .context("connection semaphore closed")?;
            debug!(
                target: "kura::server",
                client_addr = %addr,
                available_permits = semaphore.available_permits(),
                "Connection accepted"
            );

            let cache = self.cache.clone();
            let origin = self.origin.clone();
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = serve_connection(stream, addr, cache, origin).await {
                    warn!(target: "kura::server", client_addr = %addr, error = ?e, "Connection error");
                }
            });
        }
    }
}

pub(crate) async fn bind_listener(listen_addr: &str) -> anyhow::Result<TcpListener> {
    info!(target: "kura::server", listen = %listen_addr, "Binding listener");

    match TcpListener::bind(listen_addr).await {
        Ok(listener) => {
            info!(target: "kura::server", listen = %listen_addr, "Bind() successful");
            Ok(listener)
        }
        Err(e) => {
            error!(
                target: "kura::server",
                listen = %listen_addr,
                error = ?e,
                "Failed to bind listener"
            );
            Err(e.into())
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    client_addr: SocketAddr,
    cache: Arc<Cache>,
    origin: Arc<dyn Origin>,
) -> anyhow::Result<()> {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req: Request<Incoming>| {
        let cache = cache.clone();
        let origin = origin.clone();
        async move { handle_request(req, client_addr, cache, origin).await }
    });

    http1::Builder::new()
        .keep_alive(true)
        .serve_connection(io, service)
        .await
        .context("HTTP/1 connection error")?;

    Ok(())
}

async fn handle_request(
    req: Request<Incoming>,
    client_addr: SocketAddr,
    cache: Arc<Cache>,
    origin: Arc<dyn Origin>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!(target: "kura::server", error = ?e, "Failed to read request body");
            return Ok(plain(StatusCode::BAD_REQUEST, "400 Bad Request\n").map(Full::new));
        }
    };

    let mut ctx = HttpContext::new(parts, body, origin);
    match cache.handle(&mut ctx).await {
        Ok(cache_status) => {
            info!(
                target: "kura::server",
                client_addr = %client_addr,
                method = %ctx.request().method,
                path = %ctx.request().uri.path(),
                status = ctx.response().status().as_u16(),
                cache = %cache_status,
                "Request served"
            );
            Ok(ctx.into_response().map(Full::new))
        }
        Err(e) => {
            error!(
                target: "kura::server",
                client_addr = %client_addr,
                method = %ctx.request().method,
                path = %ctx.request().uri.path(),
                error = ?e,
                "Request failed"
            );
            Ok(plain(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error\n")
                .map(Full::new))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use kura_cache::CacheConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::origin::StaticOrigin;

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        let req = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(req.as_bytes()).await.expect("write");
        let mut out = String::new();
        stream.read_to_string(&mut out).await.expect("read");
        out.to_ascii_lowercase()
    }

    #[tokio::test]
    async fn serves_through_cache_over_tcp() {
        let root = std::env::temp_dir().join(format!("kura-server-{}", std::process::id()));
        std::fs::create_dir_all(&root).expect("create root");
        std::fs::write(root.join("index.html"), "v1").expect("write index");

        let mut cfg = KuraConfig::default();
        cfg.server.root = root.display().to_string();
        let cache = Cache::new(CacheConfig::default().with_expiration(Duration::from_secs(60)));
        let origin = Arc::new(StaticOrigin::from_config(&cfg.server));
        let server = Server::new(cfg, cache, origin);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(server.serve(listener));

        let first = get(addr, "/").await;
        assert!(first.starts_with("http/1.1 200"), "{first}");
        assert!(first.contains("x-cache: miss"), "{first}");
        assert!(first.ends_with("v1"), "{first}");

        std::fs::write(root.join("index.html"), "v2").expect("rewrite index");

        let second = get(addr, "/").await;
        assert!(second.contains("x-cache: hit"), "{second}");
        assert!(second.ends_with("v1"), "{second}");

        let missing = get(addr, "/missing.txt").await;
        assert!(missing.starts_with("http/1.1 404"), "{missing}");
        assert!(missing.contains("x-cache: miss"), "{missing}");

        let _ = std::fs::remove_dir_all(&root);
    }
}
