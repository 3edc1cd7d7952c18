//! Domain entities that are stored in the datastore and projected into search indexes.

pub mod meals;
pub mod recipes;
pub mod valid_enumerations;

use crate::error::{Error, Result};
use crate::events::EntitySnapshot;
use crate::indexing::IndexType;
use crate::search::{Index, SearchIndexes, SearchSubset};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use meals::{Meal, MealComponent};
pub use recipes::{Recipe, RecipeStep, RecipeStepIngredient, RecipeStepInstrument, RecipeStepVessel};
pub use valid_enumerations::{
    ValidIngredient, ValidIngredientState, ValidInstrument, ValidMeasurementUnit,
    ValidPreparation, ValidVessel,
};

/// Identity and lifecycle timestamps shared by every stored entity.
///
/// `last_indexed_at` is absent here; only the datastore reads or writes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordMetadata {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl RecordMetadata {
    /// The time of the last write, which identifies this snapshot of the row.
    pub fn version(&self) -> DateTime<Utc> {
        self.last_updated_at.unwrap_or(self.created_at)
    }
}

/// An `{id, name}` pair used inside projections to reference related entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedId {
    pub id: String,
    pub name: String,
}

impl NamedId {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// An entity kind that has a search index.
pub trait Indexable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Subset: SearchSubset;

    const INDEX_TYPE: IndexType;

    fn metadata(&self) -> &RecordMetadata;

    fn metadata_mut(&mut self) -> &mut RecordMetadata;

    /// Human-readable name, used for database search and ordering.
    fn name(&self) -> &str;

    /// Project the entity onto the fields worth indexing. Must be pure.
    fn to_search_subset(&self) -> Self::Subset;

    /// The index holding this kind's projections.
    fn search_index(indexes: &SearchIndexes) -> &Arc<dyn Index<Self::Subset>>;

    fn into_snapshot(self) -> EntitySnapshot;

    fn id(&self) -> &str {
        &self.metadata().id
    }

    fn validate(&self) -> Result<()> {
        if self.name().trim().is_empty() {
            return Err(Error::InvalidRequest(format!(
                "{} entries require a name",
                Self::INDEX_TYPE
            )));
        }
        Ok(())
    }
}
