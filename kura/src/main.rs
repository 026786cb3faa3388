use std::sync::Arc;

use kura_cache::{Cache, CacheConfig};
use kura_config::KuraConfig;
use kura_http::{Server, StaticOrigin};
use tracing::info;
use utils::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = KuraConfig::from_file_or_default("kura.conf");
    init_tracing(cfg.global().log_level());
    cfg.print();

    let cache_cfg = CacheConfig::from_settings(cfg.cache());
    info!(target: "kura::cache", config = ?cache_cfg, "Response cache configured");

    let cache = Cache::new(cache_cfg);
    let origin = Arc::new(StaticOrigin::from_config(cfg.server()));

    Server::new(cfg, cache, origin).run().await
}
