//! Typed full-text indexes over entity projections.
//!
//! Every indexable entity kind gets its own [`Index`], holding the
//! [`SearchSubset`] projection of each row. Providers are selected by
//! [`SearchConfig`]: `noop` when search is disabled, `memory` for tests and
//! single-process deployments, `lancedb` for the on-disk full-text engine.

pub mod config;
pub mod memory;
pub mod noop;
pub mod table;

use crate::error::Result;
use crate::indexing::IndexType;
use crate::indexing::subsets::{
    MealSearchSubset, RecipeSearchSubset, ValidIngredientSearchSubset,
    ValidIngredientStateSearchSubset, ValidInstrumentSearchSubset,
    ValidMeasurementUnitSearchSubset, ValidPreparationSearchSubset, ValidVesselSearchSubset,
};

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub use config::{LanceDbConfig, SearchConfig, SearchProvider};
pub use memory::MemoryIndex;
pub use noop::NoopIndex;
pub use table::LanceIndex;

/// Read side of an index.
#[async_trait::async_trait]
pub trait IndexSearcher<T>: Send + Sync {
    /// Projections matching `query`, in the engine's ranked order, at most `limit` of them.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<T>>;
}

/// Read/write index for one entity kind.
#[async_trait::async_trait]
pub trait Index<T>: IndexSearcher<T> {
    /// Insert or replace the projection stored under `id`.
    async fn index(&self, id: &str, value: &T) -> Result<()>;

    /// Remove the projection stored under `id`. Missing ids succeed.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Remove every projection in this index.
    async fn wipe(&self) -> Result<()>;
}

/// A projection of an entity that can be stored in an index.
pub trait SearchSubset: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    /// Text the engine matches queries against: every string field except ids.
    fn searchable_text(&self) -> String {
        let mut parts = Vec::new();
        if let Ok(value) = serde_json::to_value(self) {
            collect_text(&value, &mut parts);
        }
        parts.join(" ")
    }
}

fn collect_text(value: &serde_json::Value, parts: &mut Vec<String>) {
    match value {
        serde_json::Value::String(text) if !text.is_empty() => parts.push(text.clone()),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_text(item, parts);
            }
        }
        serde_json::Value::Object(fields) => {
            for (key, field) in fields {
                if key != "id" {
                    collect_text(field, parts);
                }
            }
        }
        _ => {}
    }
}

/// Long-lived provider state. Holds the LanceDB connection when that engine is configured.
#[derive(Clone)]
pub enum SearchBackend {
    Noop,
    Memory,
    LanceDb(lancedb::Connection),
}

impl SearchBackend {
    pub async fn connect(config: &SearchConfig) -> Result<Self> {
        config.validate()?;

        match config.provider {
            SearchProvider::Noop => Ok(Self::Noop),
            SearchProvider::Memory => Ok(Self::Memory),
            SearchProvider::LanceDb => {
                let path = config
                    .lancedb
                    .as_ref()
                    .map(|lancedb| lancedb.path.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let connection = lancedb::connect(&path).execute().await.map_err(|error| {
                    crate::error::SearchError::Unavailable {
                        index: path.clone(),
                        reason: error.to_string(),
                    }
                })?;
                tracing::info!(%path, "connected to lancedb search backend");
                Ok(Self::LanceDb(connection))
            }
        }
    }

    /// Build the typed index for `index_type` on this backend.
    pub async fn provide_index<T: SearchSubset>(
        &self,
        index_type: IndexType,
    ) -> Result<Arc<dyn Index<T>>> {
        match self {
            Self::Noop => Ok(Arc::new(NoopIndex::<T>::new())),
            Self::Memory => Ok(Arc::new(MemoryIndex::<T>::new())),
            Self::LanceDb(connection) => {
                let index = LanceIndex::<T>::open_or_create(connection, index_type).await?;
                index.create_indexes().await?;
                Ok(Arc::new(index))
            }
        }
    }
}

/// One index per [`IndexType`], built once at start-up and shared by the
/// dispatcher and the HTTP handlers.
#[derive(Clone)]
pub struct SearchIndexes {
    pub recipes: Arc<dyn Index<RecipeSearchSubset>>,
    pub meals: Arc<dyn Index<MealSearchSubset>>,
    pub valid_ingredients: Arc<dyn Index<ValidIngredientSearchSubset>>,
    pub valid_instruments: Arc<dyn Index<ValidInstrumentSearchSubset>>,
    pub valid_measurement_units: Arc<dyn Index<ValidMeasurementUnitSearchSubset>>,
    pub valid_preparations: Arc<dyn Index<ValidPreparationSearchSubset>>,
    pub valid_ingredient_states: Arc<dyn Index<ValidIngredientStateSearchSubset>>,
    pub valid_vessels: Arc<dyn Index<ValidVesselSearchSubset>>,
}

impl SearchIndexes {
    pub async fn provide(backend: &SearchBackend) -> Result<Self> {
        Ok(Self {
            recipes: backend.provide_index(IndexType::Recipes).await?,
            meals: backend.provide_index(IndexType::Meals).await?,
            valid_ingredients: backend.provide_index(IndexType::ValidIngredients).await?,
            valid_instruments: backend.provide_index(IndexType::ValidInstruments).await?,
            valid_measurement_units: backend
                .provide_index(IndexType::ValidMeasurementUnits)
                .await?,
            valid_preparations: backend.provide_index(IndexType::ValidPreparations).await?,
            valid_ingredient_states: backend
                .provide_index(IndexType::ValidIngredientStates)
                .await?,
            valid_vessels: backend.provide_index(IndexType::ValidVessels).await?,
        })
    }

    /// Fresh in-process indexes for every entity kind.
    pub fn in_memory() -> Self {
        Self {
            recipes: Arc::new(MemoryIndex::new()),
            meals: Arc::new(MemoryIndex::new()),
            valid_ingredients: Arc::new(MemoryIndex::new()),
            valid_instruments: Arc::new(MemoryIndex::new()),
            valid_measurement_units: Arc::new(MemoryIndex::new()),
            valid_preparations: Arc::new(MemoryIndex::new()),
            valid_ingredient_states: Arc::new(MemoryIndex::new()),
            valid_vessels: Arc::new(MemoryIndex::new()),
        }
    }

    /// Drop every projection held for `index_type`.
    pub async fn wipe(&self, index_type: IndexType) -> Result<()> {
        match index_type {
            IndexType::Recipes => self.recipes.wipe().await,
            IndexType::Meals => self.meals.wipe().await,
            IndexType::ValidIngredients => self.valid_ingredients.wipe().await,
            IndexType::ValidInstruments => self.valid_instruments.wipe().await,
            IndexType::ValidMeasurementUnits => self.valid_measurement_units.wipe().await,
            IndexType::ValidPreparations => self.valid_preparations.wipe().await,
            IndexType::ValidIngredientStates => self.valid_ingredient_states.wipe().await,
            IndexType::ValidVessels => self.valid_vessels.wipe().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NamedId;

    #[test]
    fn searchable_text_skips_ids_and_empty_fields() {
        let subset = MealSearchSubset {
            id: "meal-1".into(),
            name: "Taco Night".into(),
            description: String::new(),
            recipes: vec![NamedId::new("recipe-1", "Carnitas")],
        };

        assert_eq!(subset.searchable_text(), "Taco Night Carnitas");
    }

    #[tokio::test]
    async fn wipe_clears_only_the_requested_index() {
        let indexes = SearchIndexes::in_memory();
        let ingredient = ValidIngredientSearchSubset {
            id: "ing-1".into(),
            name: "kale".into(),
            ..Default::default()
        };
        let vessel = ValidVesselSearchSubset {
            id: "vessel-1".into(),
            name: "kale bowl".into(),
            ..Default::default()
        };
        indexes.valid_ingredients.index("ing-1", &ingredient).await.expect("index");
        indexes.valid_vessels.index("vessel-1", &vessel).await.expect("index");

        indexes.wipe(IndexType::ValidIngredients).await.expect("wipe");

        assert!(indexes.valid_ingredients.search("kale", 10).await.expect("search").is_empty());
        assert_eq!(indexes.valid_vessels.search("kale", 10).await.expect("search").len(), 1);
    }
}
