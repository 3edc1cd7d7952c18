//! Shared state for API handlers.

use crate::cache::Cache;
use crate::events::{ChangeEventPublisher, DataChange};
use crate::search::SearchIndexes;
use crate::types::Indexable;

use std::sync::Arc;
use std::time::Instant;

/// State shared across all API handlers.
pub struct ApiState<S> {
    pub store: Arc<S>,
    pub indexes: SearchIndexes,
    /// Read-through cache for single-entity reads, keyed `<index_type>:<id>`.
    pub cache: Arc<dyn Cache<serde_json::Value>>,
    pub publisher: ChangeEventPublisher,
    /// When false every search goes straight to the database.
    pub use_search_service: bool,
    pub started_at: Instant,
}

impl<S> ApiState<S> {
    pub fn new(
        store: Arc<S>,
        indexes: SearchIndexes,
        cache: Arc<dyn Cache<serde_json::Value>>,
        publisher: ChangeEventPublisher,
        use_search_service: bool,
    ) -> Self {
        Self {
            store,
            indexes,
            cache,
            publisher,
            use_search_service,
            started_at: Instant::now(),
        }
    }

    /// Hand a change to the publisher. Failures are logged, never returned.
    pub fn publish(&self, change: DataChange) {
        let event_type = change.event_type.clone();
        if let Err(error) = self.publisher.publish_async(change) {
            tracing::warn!(%error, %event_type, "failed to publish data change");
        }
    }

    /// Drop the cached copy of a single entity.
    pub async fn invalidate<K: Indexable>(&self, id: &str) {
        if let Err(error) = self.cache.delete(&cache_key::<K>(id)).await {
            tracing::warn!(%error, index_type = %K::INDEX_TYPE, id, "failed to invalidate cache entry");
        }
    }
}

pub fn cache_key<K: Indexable>(id: &str) -> String {
    format!("{}:{id}", K::INDEX_TYPE.as_str())
}
