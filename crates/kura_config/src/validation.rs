use std::{net::SocketAddr, path::Path};

use crate::KuraConfig;

/// Validation output for a loaded Kura configuration.
#[derive(Debug, Default)]
pub struct ConfigReport {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ConfigReport {
    /// Returns true when no errors were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true when at least one error was found.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the collected warning messages.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Returns the collected error messages.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Render warnings and errors into a readable, multi-line string.
    pub fn format(&self) -> String {
        let mut out = String::new();
        if !self.errors.is_empty() {
            out.push_str("Errors:\n");
            for err in &self.errors {
                out.push_str("  - ");
                out.push_str(err);
                out.push('\n');
            }
        }
        if !self.warnings.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Warnings:\n");
            for warn in &self.warnings {
                out.push_str("  - ");
                out.push_str(warn);
                out.push('\n');
            }
        }
        out
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Validate a Kura configuration and return a report of issues.
pub fn validate(cfg: &KuraConfig) -> ConfigReport {
    let mut report = ConfigReport::default();

    validate_server(cfg, &mut report);
    validate_cache(cfg, &mut report);

    report
}

fn validate_server(cfg: &KuraConfig, report: &mut ConfigReport) {
    let server = &cfg.server;

    if server.listen.trim().is_empty() {
        report.error("server.listen is empty");
    } else if server.listen.parse::<SocketAddr>().is_err() {
        report.warn(format!(
            "server.listen '{listen}' is not a socket address; DNS resolution will be used",
            listen = server.listen
        ));
    }

    if server.root.trim().is_empty() {
        report.warn("server.root is empty");
    } else if !Path::new(&server.root).exists() {
        report.warn(format!(
            "server.root '{root}' does not exist",
            root = server.root
        ));
    }
}

fn validate_cache(cfg: &KuraConfig, report: &mut ConfigReport) {
    let cache = &cfg.cache;

    if !cache.enabled() {
        report.warn("cache.expiration_secs is negative; responses will not be cached");
    } else if cache.expiration_secs == 0 {
        report.warn("cache.expiration_secs is 0; responses will not be stored");
    }

    if http_header_name_invalid(&cache.cache_header) {
        report.error(format!(
            "cache.cache_header '{name}' is not a valid header name",
            name = cache.cache_header
        ));
    }
}

fn http_header_name_invalid(name: &str) -> bool {
    name.is_empty()
        || !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

#[cfg(test)]
mod tests {
    use crate::KuraConfig;

    #[test]
    fn default_config_has_no_errors() {
        let report = KuraConfig::default().validate();
        assert!(report.is_ok(), "{}", report.format());
    }

    #[test]
    fn invalid_cache_header_is_an_error() {
        let mut cfg = KuraConfig::default();
        cfg.cache.cache_header = "X Cache".into();
        let report = cfg.validate();
        assert!(report.has_errors());
        assert!(report.format().contains("cache.cache_header"));
    }

    #[test]
    fn disabled_cache_is_a_warning() {
        let mut cfg = KuraConfig::default();
        cfg.cache.expiration_secs = -1;
        let report = cfg.validate();
        assert!(report.is_ok());
        assert!(
            report
                .warnings()
                .iter()
                .any(|w| w.contains("expiration_secs is negative"))
        );
    }

    #[test]
    fn empty_listen_is_an_error() {
        let mut cfg = KuraConfig::default();
        cfg.server.listen = " ".into();
        assert!(cfg.validate().has_errors());
    }
}
