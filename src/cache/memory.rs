//! In-process cache provider.

use crate::cache::Cache;
use crate::error::{Error, Result};

use std::collections::HashMap;
use tokio::sync::RwLock;

/// A string-keyed map behind a reader/writer lock. Entries never expire.
pub struct MemoryCache<T> {
    entries: RwLock<HashMap<String, T>>,
}

impl<T> MemoryCache<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl<T> Default for MemoryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<T> Cache<T> for MemoryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<T> {
        self.entries
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("cache key {key}")))
    }

    async fn set(&self, key: &str, value: &T) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[derive(Debug, Clone, PartialEq)]
    struct Session {
        user_id: String,
        household_id: String,
    }

    fn session(user_id: &str) -> Session {
        Session {
            user_id: user_id.to_string(),
            household_id: "household-1".to_string(),
        }
    }

    #[tokio::test]
    async fn set_then_get_returns_the_value() {
        let cache = MemoryCache::new();
        cache.set("session:1", &session("user-1")).await.expect("set");
        assert_eq!(cache.get("session:1").await.expect("get"), session("user-1"));
    }

    #[tokio::test]
    async fn set_overwrites_previous_value() {
        let cache = MemoryCache::new();
        cache.set("session:1", &session("user-1")).await.expect("set");
        cache.set("session:1", &session("user-2")).await.expect("overwrite");
        assert_eq!(cache.get("session:1").await.expect("get").user_id, "user-2");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let cache = MemoryCache::<Session>::new();
        let error = cache.get("absent").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn delete_removes_and_is_idempotent() {
        let cache = MemoryCache::new();
        cache.set("session:1", &session("user-1")).await.expect("set");
        cache.delete("session:1").await.expect("delete");
        cache.delete("session:1").await.expect("second delete");
        assert!(cache.get("session:1").await.unwrap_err().is_not_found());
    }
}
