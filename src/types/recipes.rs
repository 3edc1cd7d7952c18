use crate::events::EntitySnapshot;
use crate::indexing::IndexType;
use crate::indexing::subsets::{self, RecipeSearchSubset};
use crate::search::{Index, SearchIndexes};
use crate::types::{Indexable, RecordMetadata, ValidIngredient, ValidInstrument, ValidPreparation, ValidVessel};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Recipe {
    #[serde(flatten)]
    pub metadata: RecordMetadata,
    pub name: String,
    pub slug: String,
    pub source: String,
    pub description: String,
    #[serde(rename = "inspiredByRecipeID")]
    pub inspired_by_recipe_id: Option<String>,
    pub seal_of_approval: bool,
    pub created_by_user: String,
    /// Ordered by `index`.
    pub steps: Vec<RecipeStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecipeStep {
    pub id: String,
    pub index: u32,
    pub preparation: ValidPreparation,
    pub ingredients: Vec<RecipeStepIngredient>,
    pub instruments: Vec<RecipeStepInstrument>,
    pub vessels: Vec<RecipeStepVessel>,
    pub notes: String,
    pub explicit_instructions: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecipeStepIngredient {
    pub id: String,
    pub name: String,
    /// Unset for products of earlier steps.
    pub ingredient: Option<ValidIngredient>,
    pub minimum_quantity: f32,
    pub quantity_notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecipeStepInstrument {
    pub id: String,
    pub name: String,
    pub instrument: Option<ValidInstrument>,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecipeStepVessel {
    pub id: String,
    pub name: String,
    pub vessel: Option<ValidVessel>,
    pub notes: String,
}

impl Indexable for Recipe {
    type Subset = RecipeSearchSubset;

    const INDEX_TYPE: IndexType = IndexType::Recipes;

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
        subsets::convert_recipe_to_search_subset(self)
    }

    fn search_index(indexes: &SearchIndexes) -> &Arc<dyn Index<Self::Subset>> {
        &indexes.recipes
    }

    fn into_snapshot(self) -> EntitySnapshot {
        EntitySnapshot::Recipe(self)
    }
}
