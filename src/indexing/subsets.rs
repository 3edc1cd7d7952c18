//! Search projections: the fields of each entity worth matching on.
//!
//! Every `convert_*` function is pure. Nested lists keep the order of the
//! source collection, and empty optional text is left out of the serialized
//! projection.

use crate::search::SearchSubset;
use crate::types::{
    Meal, NamedId, Recipe, RecipeStep, ValidIngredient, ValidIngredientState, ValidInstrument,
    ValidMeasurementUnit, ValidPreparation, ValidVessel,
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidIngredientSearchSubset {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub plural_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub shopping_suggestions: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidInstrumentSearchSubset {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub plural_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidMeasurementUnitSearchSubset {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub plural_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidPreparationSearchSubset {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub past_tense: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidIngredientStateSearchSubset {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub plural_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub past_tense: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidVesselSearchSubset {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub plural_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecipeStepSearchSubset {
    pub preparation: NamedId,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ingredients: Vec<NamedId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub instruments: Vec<NamedId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vessels: Vec<NamedId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecipeSearchSubset {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<RecipeStepSearchSubset>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MealSearchSubset {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recipes: Vec<NamedId>,
}

macro_rules! impl_search_subset {
    ($($subset:ty),+ $(,)?) => {
        $(
            impl SearchSubset for $subset {
                fn id(&self) -> &str {
                    &self.id
                }
            }
        )+
    };
}

impl_search_subset!(
    ValidIngredientSearchSubset,
    ValidInstrumentSearchSubset,
    ValidMeasurementUnitSearchSubset,
    ValidPreparationSearchSubset,
    ValidIngredientStateSearchSubset,
    ValidVesselSearchSubset,
    RecipeSearchSubset,
    MealSearchSubset,
);

pub fn convert_valid_ingredient_to_search_subset(
    ingredient: &ValidIngredient,
) -> ValidIngredientSearchSubset {
    ValidIngredientSearchSubset {
        id: ingredient.metadata.id.clone(),
        name: ingredient.name.clone(),
        plural_name: ingredient.plural_name.clone(),
        description: ingredient.description.clone(),
        shopping_suggestions: ingredient.shopping_suggestions.clone(),
    }
}

pub fn convert_valid_instrument_to_search_subset(
    instrument: &ValidInstrument,
) -> ValidInstrumentSearchSubset {
    ValidInstrumentSearchSubset {
        id: instrument.metadata.id.clone(),
        name: instrument.name.clone(),
        plural_name: instrument.plural_name.clone(),
        description: instrument.description.clone(),
    }
}

pub fn convert_valid_measurement_unit_to_search_subset(
    unit: &ValidMeasurementUnit,
) -> ValidMeasurementUnitSearchSubset {
    ValidMeasurementUnitSearchSubset {
        id: unit.metadata.id.clone(),
        name: unit.name.clone(),
        plural_name: unit.plural_name.clone(),
        description: unit.description.clone(),
    }
}

pub fn convert_valid_preparation_to_search_subset(
    preparation: &ValidPreparation,
) -> ValidPreparationSearchSubset {
    ValidPreparationSearchSubset {
        id: preparation.metadata.id.clone(),
        name: preparation.name.clone(),
        past_tense: preparation.past_tense.clone(),
        description: preparation.description.clone(),
    }
}

pub fn convert_valid_ingredient_state_to_search_subset(
    state: &ValidIngredientState,
) -> ValidIngredientStateSearchSubset {
    ValidIngredientStateSearchSubset {
        id: state.metadata.id.clone(),
        name: state.name.clone(),
        plural_name: state.plural_name.clone(),
        past_tense: state.past_tense.clone(),
        description: state.description.clone(),
    }
}

pub fn convert_valid_vessel_to_search_subset(vessel: &ValidVessel) -> ValidVesselSearchSubset {
    ValidVesselSearchSubset {
        id: vessel.metadata.id.clone(),
        name: vessel.name.clone(),
        plural_name: vessel.plural_name.clone(),
        description: vessel.description.clone(),
    }
}

fn convert_recipe_step_to_search_subset(step: &RecipeStep) -> RecipeStepSearchSubset {
    // Step items reference a valid entity when one exists; products of
    // earlier steps only carry their own id and name.
    RecipeStepSearchSubset {
        preparation: NamedId::new(&step.preparation.metadata.id, &step.preparation.name),
        ingredients: step
            .ingredients
            .iter()
            .map(|item| match &item.ingredient {
                Some(ingredient) => NamedId::new(&ingredient.metadata.id, &ingredient.name),
                None => NamedId::new(&item.id, &item.name),
            })
            .collect(),
        instruments: step
            .instruments
            .iter()
            .map(|item| match &item.instrument {
                Some(instrument) => NamedId::new(&instrument.metadata.id, &instrument.name),
                None => NamedId::new(&item.id, &item.name),
            })
            .collect(),
        vessels: step
            .vessels
            .iter()
            .map(|item| match &item.vessel {
                Some(vessel) => NamedId::new(&vessel.metadata.id, &vessel.name),
                None => NamedId::new(&item.id, &item.name),
            })
            .collect(),
    }
}

pub fn convert_recipe_to_search_subset(recipe: &Recipe) -> RecipeSearchSubset {
    RecipeSearchSubset {
        id: recipe.metadata.id.clone(),
        name: recipe.name.clone(),
        description: recipe.description.clone(),
        steps: recipe
            .steps
            .iter()
            .map(convert_recipe_step_to_search_subset)
            .collect(),
    }
}

pub fn convert_meal_to_search_subset(meal: &Meal) -> MealSearchSubset {
    MealSearchSubset {
        id: meal.metadata.id.clone(),
        name: meal.name.clone(),
        description: meal.description.clone(),
        recipes: meal
            .components
            .iter()
            .map(|component| {
                NamedId::new(&component.recipe.metadata.id, &component.recipe.name)
            })
            .collect(),
    }
}
