use crate::events::EntitySnapshot;
use crate::indexing::IndexType;
use crate::indexing::subsets::{self, MealSearchSubset};
use crate::search::{Index, SearchIndexes};
use crate::types::{Indexable, Recipe, RecordMetadata};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A named combination of recipes served together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Meal {
    #[serde(flatten)]
    pub metadata: RecordMetadata,
    pub name: String,
    pub description: String,
    pub min_estimated_portions: f32,
    pub max_estimated_portions: Option<f32>,
    pub eligible_for_meal_plans: bool,
    pub created_by_user: String,
    pub components: Vec<MealComponent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MealComponent {
    pub recipe: Recipe,
    /// e.g. `main`, `side`, `dessert`.
    pub component_type: String,
    pub recipe_scale: f32,
}

impl Indexable for Meal {
    type Subset = MealSearchSubset;

    const INDEX_TYPE: IndexType = IndexType::Meals;

    fn metadata(&self) -> &RecordMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut RecordMetadata {
        &mut self.metadata
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn to_search_subset(&self) -> Self::Subset {
        subsets::convert_meal_to_search_subset(self)
    }

    fn search_index(indexes: &SearchIndexes) -> &Arc<dyn Index<Self::Subset>> {
        &indexes.meals
    }

    fn into_snapshot(self) -> EntitySnapshot {
        EntitySnapshot::Meal(self)
    }
}
