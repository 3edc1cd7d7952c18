//! Source-of-truth datastore façade.
//!
//! Each indexable entity kind is served through [`EntityStore`]; a
//! [`DataStore`] is anything that serves all of them. The datastore is the
//! only writer of a row's `last_indexed_at` marker.

pub mod filter;
pub mod sqlite;

use crate::error::Result;
use chrono::{DateTime, Utc};
use crate::types::{
    Indexable, Meal, Recipe, ValidIngredient, ValidIngredientState, ValidInstrument,
    ValidMeasurementUnit, ValidPreparation, ValidVessel,
};

pub use filter::{Pagination, QueryFilter, QueryFilteredResult};
pub use sqlite::SqliteDataStore;

/// Read/write access to one entity kind, plus the indexing bookkeeping.
#[async_trait::async_trait]
pub trait EntityStore<K: Indexable>: Send + Sync {
    /// Insert a new row. A missing id is generated; timestamps are set here.
    async fn create(&self, input: K) -> Result<K>;

    /// Replace the stored fields of an existing, non-archived row.
    async fn update(&self, entity: K) -> Result<K>;

    async fn get(&self, id: &str) -> Result<K>;

    /// Non-archived rows among `ids`. Order is unspecified; missing ids are skipped.
    async fn get_with_ids(&self, ids: &[String]) -> Result<Vec<K>>;

    /// Case-insensitive name search, ordered by name.
    async fn search_for(&self, query: &str, filter: &QueryFilter)
    -> Result<QueryFilteredResult<K>>;

    /// Tombstone the row. Archived rows are hidden from reads and the backlog.
    async fn archive(&self, id: &str) -> Result<()>;

    /// Record that the row's content as of `indexed_version` is in the index.
    ///
    /// `indexed_version` is the [`RecordMetadata::version`] of the snapshot that
    /// was projected, so a write landing while the index call was in flight
    /// keeps the row in the backlog. Never moves the marker backwards.
    ///
    /// [`RecordMetadata::version`]: crate::types::RecordMetadata::version
    async fn mark_as_indexed(&self, id: &str, indexed_version: DateTime<Utc>) -> Result<()>;

    /// Ids whose `last_indexed_at` is null or older than their last write,
    /// oldest write first, bounded by the configured batch size.
    async fn ids_needing_search_indexing(&self) -> Result<Vec<String>>;

    /// Clear `last_indexed_at` for every row of this kind. Returns rows touched.
    async fn reset_search_indexing(&self) -> Result<u64>;
}

/// A store that serves every indexable entity kind.
pub trait DataStore:
    EntityStore<Recipe>
    + EntityStore<Meal>
    + EntityStore<ValidIngredient>
    + EntityStore<ValidInstrument>
    + EntityStore<ValidMeasurementUnit>
    + EntityStore<ValidPreparation>
    + EntityStore<ValidIngredientState>
    + EntityStore<ValidVessel>
    + Send
    + Sync
    + 'static
{
}

impl<S> DataStore for S where
    S: EntityStore<Recipe>
        + EntityStore<Meal>
        + EntityStore<ValidIngredient>
        + EntityStore<ValidInstrument>
        + EntityStore<ValidMeasurementUnit>
        + EntityStore<ValidPreparation>
        + EntityStore<ValidIngredientState>
        + EntityStore<ValidVessel>
        + Send
        + Sync
        + 'static
{
}
