use serde::Deserialize;

use crate::validation::{ConfigReport, validate};
use crate::{CacheSettings, GlobalConfig, ServerConfig};

// =======================================================
// KURA CONFIG — main config
// =======================================================
#[derive(Debug, Clone, Deserialize)]
pub struct KuraConfig {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub cache: CacheSettings,
}

impl Default for KuraConfig {
    fn default() -> Self {
        let mut cfg = Self {
            global: GlobalConfig::default(),
            server: ServerConfig::default(),
            cache: CacheSettings::default(),
        };
        cfg.apply_defaults();
        cfg
    }
}

impl KuraConfig {
    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    pub fn cache(&self) -> &CacheSettings {
        &self.cache
    }

    /// Validate the configuration and return a report of warnings and errors.
    pub fn validate(&self) -> ConfigReport {
        validate(self)
    }

    pub fn from_file(file_name: &str) -> Result<Self, config::ConfigError> {
        let built = config::Config::builder()
            .add_source(config::File::new(file_name, config::FileFormat::Ini).required(false))
            .build()?;

        let mut cfg: KuraConfig = built.try_deserialize()?;

        cfg.apply_defaults();
        Ok(cfg)
    }

    pub fn from_file_or_default(file_name: &str) -> Self {
        match Self::from_file(file_name) {
            Ok(cfg) => {
                let report = cfg.validate();
                if report.has_errors() {
                    eprintln!("⚠️  Invalid config in '{file_name}':");
                    eprintln!("{}", report.format());
                    eprintln!("➡️  Using default config(in-memory)...");
                    KuraConfig::default()
                } else {
                    if !report.warnings().is_empty() {
                        eprintln!("⚠️  Config warnings in '{file_name}':");
                        eprintln!("{}", report.format());
                    }
                    cfg
                }
            }
            Err(e) => {
                eprintln!("⚠️  Error reading config '{file_name}': {e}");
                eprintln!("➡️  Using default config(in-memory)...");
                KuraConfig::default()
            }
        }
    }

    fn apply_defaults(&mut self) {
        self.global.apply_defaults_from(&GlobalConfig::default());
        self.server.apply_defaults_from(&ServerConfig::default());
        self.cache.apply_defaults_from(&CacheSettings::default());
    }

    pub fn print(&self) {
        println!("================ KURA CONFIG =================");
        println!("\n[global]");
        println!("  worker_connections   = {}", self.global.worker_connections);
        println!("  log_level            = {}", self.global.log_level);

        println!("\n[server]");
        println!("  listen               = {}", self.server.listen);
        println!("  root                 = {}", self.server.root);
        println!("  index                = {}", self.server.index);

        println!("\n[cache]");
        println!("  expiration_secs      = {}", self.cache.expiration_secs);
        println!("  cache_header         = {}", self.cache.cache_header);
        println!("  cache_control        = {}", self.cache.cache_control);
        println!(
            "  store_response_headers = {}",
            self.cache.store_response_headers
        );
        println!("  key                  = {:?}", self.cache.key);
        println!("  storage              = {:?}", self.cache.storage);
        println!("  exclude_errors       = {}", self.cache.exclude_errors);
        println!("  respect_max_age      = {}", self.cache.respect_max_age);
        println!("==============================================");
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use super::KuraConfig;
    use crate::{KeyStrategy, StorageKind};

    fn write_conf(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "kura-config-{}-{name}.conf",
            std::process::id()
        ));
        fs::write(&path, contents).expect("write temp config");
        path
    }

    #[test]
    fn default_config_has_sane_values() {
        let cfg = KuraConfig::default();
        assert_eq!(cfg.global.worker_connections, 1024);
        assert_eq!(cfg.server.listen, "0.0.0.0:8080");
        assert_eq!(cfg.cache.expiration_secs, 60);
        assert_eq!(cfg.cache.cache_header, "X-Cache");
        assert_eq!(cfg.cache.key, KeyStrategy::Path);
        assert_eq!(cfg.cache.storage, StorageKind::Local);
        assert!(cfg.cache.enabled());
    }

    #[test]
    fn from_file_reads_cache_section() {
        let path = write_conf(
            "cache-section",
            "[server]\nlisten = 127.0.0.1:9000\n\n[cache]\nexpiration_secs = 5\ncache_control = true\nstore_response_headers = true\nkey = path_and_query\nstorage = memory\n",
        );
        let cfg = KuraConfig::from_file(path.to_str().expect("utf-8 path")).expect("parse config");
        let _ = fs::remove_file(&path);

        assert_eq!(cfg.server.listen, "127.0.0.1:9000");
        assert_eq!(cfg.server.index, "index.html");
        assert_eq!(cfg.cache.expiration_secs, 5);
        assert!(cfg.cache.cache_control);
        assert!(cfg.cache.store_response_headers);
        assert_eq!(cfg.cache.key, KeyStrategy::PathAndQuery);
        assert_eq!(cfg.cache.storage, StorageKind::Memory);
        assert_eq!(cfg.cache.cache_header, "X-Cache");
    }

    #[test]
    fn negative_expiration_disables_cache() {
        let path = write_conf("negative", "[cache]\nexpiration_secs = -1\n");
        let cfg = KuraConfig::from_file(path.to_str().expect("utf-8 path")).expect("parse config");
        let _ = fs::remove_file(&path);

        assert!(!cfg.cache.enabled());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = KuraConfig::from_file_or_default("/definitely/not/here/kura.conf");
        assert_eq!(cfg.cache.expiration_secs, 60);
    }
}
