//! Enumeration entities: the vocabulary recipes are written in.

use crate::events::EntitySnapshot;
use crate::indexing::IndexType;
use crate::indexing::subsets::{
    self, ValidIngredientSearchSubset, ValidIngredientStateSearchSubset,
    ValidInstrumentSearchSubset, ValidMeasurementUnitSearchSubset, ValidPreparationSearchSubset,
    ValidVesselSearchSubset,
};
use crate::search::{Index, SearchIndexes};
use crate::types::{Indexable, RecordMetadata};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidIngredient {
    #[serde(flatten)]
    pub metadata: RecordMetadata,
    pub name: String,
    pub plural_name: String,
    pub description: String,
    pub warning: String,
    pub icon_path: String,
    pub slug: String,
    pub storage_instructions: String,
    pub shopping_suggestions: String,
    pub contains_dairy: bool,
    pub contains_gluten: bool,
    pub contains_shellfish: bool,
    pub animal_derived: bool,
    pub is_liquid: bool,
    pub is_protein: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidInstrument {
    #[serde(flatten)]
    pub metadata: RecordMetadata,
    pub name: String,
    pub plural_name: String,
    pub description: String,
    pub icon_path: String,
    pub slug: String,
    pub usable_for_storage: bool,
    pub display_in_summary_lists: bool,
    pub include_in_generated_instructions: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidMeasurementUnit {
    #[serde(flatten)]
    pub metadata: RecordMetadata,
    pub name: String,
    pub plural_name: String,
    pub description: String,
    pub icon_path: String,
    pub slug: String,
    pub volumetric: bool,
    pub universal: bool,
    pub metric: bool,
    pub imperial: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidPreparation {
    #[serde(flatten)]
    pub metadata: RecordMetadata,
    pub name: String,
    pub past_tense: String,
    pub description: String,
    pub icon_path: String,
    pub slug: String,
    pub yields_nothing: bool,
    pub restrict_to_ingredients: bool,
    pub minimum_ingredient_count: i32,
    pub maximum_ingredient_count: Option<i32>,
    pub temperature_required: bool,
    pub time_estimate_required: bool,
    pub consumes_vessel: bool,
    pub only_for_vessels: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidIngredientState {
    #[serde(flatten)]
    pub metadata: RecordMetadata,
    pub name: String,
    pub plural_name: String,
    pub past_tense: String,
    pub description: String,
    pub icon_path: String,
    pub slug: String,
    /// e.g. `texture`, `consistency`, `temperature`.
    pub attribute_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidVessel {
    #[serde(flatten)]
    pub metadata: RecordMetadata,
    pub name: String,
    pub plural_name: String,
    pub description: String,
    pub icon_path: String,
    pub slug: String,
    pub shape: String,
    pub usable_for_storage: bool,
    pub display_in_summary_lists: bool,
    pub include_in_generated_instructions: bool,
    pub capacity: f32,
}

impl Indexable for ValidIngredient {
    type Subset = ValidIngredientSearchSubset;

    const INDEX_TYPE: IndexType = IndexType::ValidIngredients;

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
        subsets::convert_valid_ingredient_to_search_subset(self)
    }

    fn search_index(indexes: &SearchIndexes) -> &Arc<dyn Index<Self::Subset>> {
        &indexes.valid_ingredients
    }

    fn into_snapshot(self) -> EntitySnapshot {
        EntitySnapshot::ValidIngredient(self)
    }
}

impl Indexable for ValidInstrument {
    type Subset = ValidInstrumentSearchSubset;

    const INDEX_TYPE: IndexType = IndexType::ValidInstruments;

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
        subsets::convert_valid_instrument_to_search_subset(self)
    }

    fn search_index(indexes: &SearchIndexes) -> &Arc<dyn Index<Self::Subset>> {
        &indexes.valid_instruments
    }

    fn into_snapshot(self) -> EntitySnapshot {
        EntitySnapshot::ValidInstrument(self)
    }
}

impl Indexable for ValidMeasurementUnit {
    type Subset = ValidMeasurementUnitSearchSubset;

    const INDEX_TYPE: IndexType = IndexType::ValidMeasurementUnits;

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
        subsets::convert_valid_measurement_unit_to_search_subset(self)
    }

    fn search_index(indexes: &SearchIndexes) -> &Arc<dyn Index<Self::Subset>> {
        &indexes.valid_measurement_units
    }

    fn into_snapshot(self) -> EntitySnapshot {
        EntitySnapshot::ValidMeasurementUnit(self)
    }
}

impl Indexable for ValidPreparation {
    type Subset = ValidPreparationSearchSubset;

    const INDEX_TYPE: IndexType = IndexType::ValidPreparations;

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
        subsets::convert_valid_preparation_to_search_subset(self)
    }

    fn search_index(indexes: &SearchIndexes) -> &Arc<dyn Index<Self::Subset>> {
        &indexes.valid_preparations
    }

    fn into_snapshot(self) -> EntitySnapshot {
        EntitySnapshot::ValidPreparation(self)
    }
}

impl Indexable for ValidIngredientState {
    type Subset = ValidIngredientStateSearchSubset;

    const INDEX_TYPE: IndexType = IndexType::ValidIngredientStates;

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
        subsets::convert_valid_ingredient_state_to_search_subset(self)
    }

    fn search_index(indexes: &SearchIndexes) -> &Arc<dyn Index<Self::Subset>> {
        &indexes.valid_ingredient_states
    }

    fn into_snapshot(self) -> EntitySnapshot {
        EntitySnapshot::ValidIngredientState(self)
    }
}

impl Indexable for ValidVessel {
    type Subset = ValidVesselSearchSubset;

    const INDEX_TYPE: IndexType = IndexType::ValidVessels;

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
        subsets::convert_valid_vessel_to_search_subset(self)
    }

    fn search_index(indexes: &SearchIndexes) -> &Arc<dyn Index<Self::Subset>> {
        &indexes.valid_vessels
    }

    fn into_snapshot(self) -> EntitySnapshot {
        EntitySnapshot::ValidVessel(self)
    }
}
