//! Key/value caching for short-lived, serializable values.
//!
//! Two providers sit behind the [`Cache`] trait: an in-process map for tests
//! and single-node deployments, and Redis (standalone or cluster) for
//! everything else. A miss is reported as [`Error::NotFound`] by both.

pub mod memory;
pub mod redis;

use crate::error::{Error, Result};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

/// A uniform key to `T` store.
#[async_trait::async_trait]
pub trait Cache<T>: Send + Sync {
    /// Fetch a copy of the value stored under `key`.
    async fn get(&self, key: &str) -> Result<T>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &T) -> Result<()>;

    /// Remove `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Which backend serves the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheProvider {
    #[default]
    Memory,
    Redis,
}

/// Options for the in-process provider. There are none today.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryCacheConfig {}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RedisConfig {
    /// `host:port` pairs. More than one address selects cluster mode.
    #[serde(default)]
    pub queue_addresses: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    pub provider: CacheProvider,
    #[serde(default)]
    pub memory: Option<MemoryCacheConfig>,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        match self.provider {
            CacheProvider::Memory => Ok(()),
            CacheProvider::Redis => {
                let redis = self.redis.as_ref().ok_or_else(|| {
                    Error::Config("cache.redis is required when cache.provider = \"redis\"".into())
                })?;
                if redis.queue_addresses.is_empty() {
                    return Err(Error::Config(
                        "cache.redis.queue_addresses must not be empty".into(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Build the configured cache provider for values of type `T`.
///
/// Redis connections are established lazily on first use, so this never
/// blocks on the network.
pub fn provide_cache<T>(config: &CacheConfig) -> Result<Arc<dyn Cache<T>>>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    config.validate()?;

    match config.provider {
        CacheProvider::Memory => Ok(Arc::new(MemoryCache::<T>::new())),
        CacheProvider::Redis => {
            let redis = config.redis.as_ref().ok_or_else(|| {
                Error::Config("cache.redis is required when cache.provider = \"redis\"".into())
            })?;
            Ok(Arc::new(RedisCache::<T>::new(redis)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_provider_is_selected_by_default() {
        let cache = provide_cache::<String>(&CacheConfig::default()).expect("memory cache");
        cache.set("greeting", &"hello".to_string()).await.expect("set");
        assert_eq!(cache.get("greeting").await.expect("get"), "hello");
    }

    #[test]
    fn redis_without_options_is_a_config_error() {
        let config = CacheConfig {
            provider: CacheProvider::Redis,
            memory: None,
            redis: None,
        };
        let error = provide_cache::<String>(&config).err().expect("must fail");
        assert!(matches!(error, Error::Config(_)));
    }

    #[test]
    fn redis_without_addresses_is_a_config_error() {
        let config = CacheConfig {
            provider: CacheProvider::Redis,
            memory: None,
            redis: Some(RedisConfig::default()),
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
