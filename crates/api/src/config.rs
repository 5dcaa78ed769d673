//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use domain::StatusPolicy;
use notifier::DispatcherConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; unset runs on the in-memory store
/// - `DB_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `SENDGRID_API_KEY`: unset logs emails instead of sending them
/// - `MAIL_FROM`: sender address
/// - `STATUS_POLICY`: `permissive` or `strict` (default: `permissive`)
/// - `NOTIFY_POLL_INTERVAL_SECS`, `NOTIFY_BATCH_SIZE`,
///   `NOTIFY_MAX_ATTEMPTS`, `NOTIFY_RETRY_BASE_SECS`: dispatcher tuning
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub sendgrid_api_key: Option<String>,
    pub mail_from: String,
    pub status_policy: StatusPolicy,
    pub notify_poll_interval_secs: u64,
    pub notify_batch_size: usize,
    pub notify_max_attempts: u32,
    pub notify_retry_base_secs: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// missing, empty or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        fn parse<T: FromStr>(value: Option<String>) -> Option<T> {
            value.and_then(|v| v.trim().parse().ok())
        }

        Self {
            host: text("HOST").unwrap_or(defaults.host),
            port: parse(text("PORT")).unwrap_or(defaults.port),
            log_level: text("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parse(text("LOG_FORMAT")).unwrap_or(defaults.log_format),
            database_url: text("DATABASE_URL"),
            db_max_connections: parse(text("DB_MAX_CONNECTIONS")).unwrap_or(defaults.db_max_connections),
            sendgrid_api_key: text("SENDGRID_API_KEY"),
            mail_from: text("MAIL_FROM").unwrap_or(defaults.mail_from),
            status_policy: parse(text("STATUS_POLICY")).unwrap_or(defaults.status_policy),
            notify_poll_interval_secs: parse(text("NOTIFY_POLL_INTERVAL_SECS"))
                .unwrap_or(defaults.notify_poll_interval_secs),
            notify_batch_size: parse(text("NOTIFY_BATCH_SIZE")).unwrap_or(defaults.notify_batch_size),
            notify_max_attempts: parse(text("NOTIFY_MAX_ATTEMPTS"))
                .unwrap_or(defaults.notify_max_attempts),
            notify_retry_base_secs: parse(text("NOTIFY_RETRY_BASE_SECS"))
                .unwrap_or(defaults.notify_retry_base_secs),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Dispatcher settings derived from the `NOTIFY_*` variables.
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            poll_interval: Duration::from_secs(self.notify_poll_interval_secs.max(1)),
            batch_size: self.notify_batch_size.max(1),
            max_attempts: self.notify_max_attempts.max(1),
            retry_base: Duration::from_secs(self.notify_retry_base_secs),
            ..DispatcherConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            db_max_connections: 10,
            sendgrid_api_key: None,
            mail_from: "orders@storefront.example".to_string(),
            status_policy: StatusPolicy::Permissive,
            notify_poll_interval_secs: 5,
            notify_batch_size: 20,
            notify_max_attempts: 5,
            notify_retry_base_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.db_max_connections, 10);
        assert!(config.database_url.is_none());
        assert_eq!(config.status_policy, StatusPolicy::Permissive);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_lookup_overrides_defaults() {
        let config = from_pairs(&[
            ("PORT", "8081"),
            ("LOG_FORMAT", "json"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("STATUS_POLICY", "strict"),
            ("NOTIFY_MAX_ATTEMPTS", "7"),
        ]);

        assert_eq!(config.port, 8081);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/shop")
        );
        assert_eq!(config.status_policy, StatusPolicy::Strict);
        assert_eq!(config.dispatcher_config().max_attempts, 7);
    }

    #[test]
    fn test_bad_and_empty_values_fall_back() {
        let config = from_pairs(&[("PORT", "not-a-port"), ("DATABASE_URL", "  ")]);
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_dispatcher_config_uses_seconds() {
        let config = Config::default();
        let dispatcher = config.dispatcher_config();
        assert_eq!(dispatcher.poll_interval, Duration::from_secs(5));
        assert_eq!(dispatcher.batch_size, 20);
        assert_eq!(dispatcher.retry_base, Duration::from_secs(30));
    }
}
