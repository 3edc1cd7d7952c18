//! Service configuration.
//!
//! Values come from an optional TOML file layered under environment
//! variables prefixed with `DINNER_DONE_BETTER__` (sections separated by `__`,
//! e.g. `DINNER_DONE_BETTER__CACHE__PROVIDER=redis`).

use crate::cache::CacheConfig;
use crate::error::{Error, Result};
use crate::events::OverflowPolicy;
use crate::search::SearchConfig;

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "DINNER_DONE_BETTER";

/// Top-level configuration for the service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Upper bound on ids returned by one backlog query.
    #[serde(default = "default_indexing_batch_size")]
    pub indexing_batch_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            indexing_batch_size: default_indexing_batch_size(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://dinnerdonebetter.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_indexing_batch_size() -> u32 {
    100
}

/// Scheduler cadence and worker pool sizing for the indexing pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Deadline for one index request, end to end.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl IndexingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_workers() -> usize {
    4
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Outbound buffer for data-change events.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventsConfig {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// When set, logs are also written to daily-rolling files in this directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            directory: None,
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from an optional TOML file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let config: Config = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cache.redis.queue_addresses")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML document without consulting the environment.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config = ::config::Config::builder()
            .add_source(::config::File::from_str(raw, ::config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.search.validate()?;

        if self.database.max_connections == 0 {
            return Err(Error::Config(
                "database.max_connections must be positive".into(),
            ));
        }
        if self.database.indexing_batch_size == 0 {
            return Err(Error::Config(
                "database.indexing_batch_size must be positive".into(),
            ));
        }
        if self.indexing.workers == 0 {
            return Err(Error::Config("indexing.workers must be positive".into()));
        }
        if self.indexing.queue_capacity == 0 {
            return Err(Error::Config(
                "indexing.queue_capacity must be positive".into(),
            ));
        }
        if self.indexing.interval_secs == 0 {
            return Err(Error::Config(
                "indexing.interval_secs must be positive".into(),
            ));
        }
        if self.events.capacity == 0 {
            return Err(Error::Config("events.capacity must be positive".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheProvider;
    use crate::error::ErrorKind;
    use crate::search::SearchProvider;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_toml_str("").expect("defaults are valid");
        assert_eq!(config.server.bind, default_bind());
        assert_eq!(config.cache.provider, CacheProvider::Memory);
        assert_eq!(config.search.provider, SearchProvider::Noop);
        assert!(!config.search.use_search_service);
        assert_eq!(config.indexing.workers, 4);
        assert_eq!(config.events.overflow_policy, OverflowPolicy::DropNewest);
    }

    #[test]
    fn parses_full_document() {
        let raw = r#"
[server]
bind = "0.0.0.0:9000"

[database]
url = "sqlite::memory:"
indexing_batch_size = 25

[cache]
provider = "redis"

[cache.redis]
queue_addresses = ["10.0.0.1:6379", "10.0.0.2:6379"]
username = "kitchen"
password = "hunter2"
db = 2

[search]
provider = "lancedb"
use_search_service = true

[search.lancedb]
path = "/var/lib/dinnerdonebetter/search"

[indexing]
interval_secs = 5
workers = 2

[events]
capacity = 16
overflow_policy = "drop_oldest"
"#;

        let config = Config::from_toml_str(raw).expect("valid config");
        assert_eq!(config.server.bind.port(), 9000);
        assert_eq!(config.database.indexing_batch_size, 25);
        let redis = config.cache.redis.expect("redis options");
        assert_eq!(redis.queue_addresses.len(), 2);
        assert_eq!(redis.db, 2);
        assert_eq!(config.search.provider, SearchProvider::LanceDb);
        assert!(config.search.use_search_service);
        assert_eq!(config.indexing.interval(), Duration::from_secs(5));
        assert_eq!(config.events.overflow_policy, OverflowPolicy::DropOldest);
    }

    #[test]
    fn unknown_cache_provider_is_a_config_error() {
        let error = Config::from_toml_str("[cache]\nprovider = \"memcached\"\n").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn redis_provider_without_options_is_rejected() {
        let error = Config::from_toml_str("[cache]\nprovider = \"redis\"\n").unwrap_err();
        assert!(matches!(error, Error::Config(_)));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let error = Config::from_toml_str("[indexing]\nworkers = 0\n").unwrap_err();
        assert!(matches!(error, Error::Config(_)));
    }
}
