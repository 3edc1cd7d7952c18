//! Data-change events published after every successful mutation.
//!
//! Events are hints to reconcile, not authoritative state: ordering across
//! events is not guaranteed and a dropped event is recovered by the indexing
//! backlog.

pub mod publisher;
pub mod subscriber;

use crate::indexing::IndexType;
use crate::types::{
    Indexable, Meal, Recipe, ValidIngredient, ValidIngredientState, ValidInstrument,
    ValidMeasurementUnit, ValidPreparation, ValidVessel,
};

use serde::{Deserialize, Serialize};
use std::fmt;

pub use publisher::ChangeEventPublisher;
pub use subscriber::{DataChangeSubscriber, IndexingSubscriber};

/// What happens to new events when the outbound buffer is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject the new event; the publisher's caller logs it.
    #[default]
    DropNewest,
    /// Evict the oldest buffered event to make room.
    DropOldest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Created,
    Updated,
    Archived,
}

impl ChangeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeAction::Created => "created",
            ChangeAction::Updated => "updated",
            ChangeAction::Archived => "archived",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The entity a change event carries, keyed by its kind on the wire
/// (e.g. `"validIngredient": {...}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntitySnapshot {
    Recipe(Recipe),
    Meal(Meal),
    ValidIngredient(ValidIngredient),
    ValidInstrument(ValidInstrument),
    ValidMeasurementUnit(ValidMeasurementUnit),
    ValidPreparation(ValidPreparation),
    ValidIngredientState(ValidIngredientState),
    ValidVessel(ValidVessel),
}

impl EntitySnapshot {
    pub fn index_type(&self) -> IndexType {
        match self {
            EntitySnapshot::Recipe(_) => IndexType::Recipes,
            EntitySnapshot::Meal(_) => IndexType::Meals,
            EntitySnapshot::ValidIngredient(_) => IndexType::ValidIngredients,
            EntitySnapshot::ValidInstrument(_) => IndexType::ValidInstruments,
            EntitySnapshot::ValidMeasurementUnit(_) => IndexType::ValidMeasurementUnits,
            EntitySnapshot::ValidPreparation(_) => IndexType::ValidPreparations,
            EntitySnapshot::ValidIngredientState(_) => IndexType::ValidIngredientStates,
            EntitySnapshot::ValidVessel(_) => IndexType::ValidVessels,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            EntitySnapshot::Recipe(entity) => entity.id(),
            EntitySnapshot::Meal(entity) => entity.id(),
            EntitySnapshot::ValidIngredient(entity) => entity.id(),
            EntitySnapshot::ValidInstrument(entity) => entity.id(),
            EntitySnapshot::ValidMeasurementUnit(entity) => entity.id(),
            EntitySnapshot::ValidPreparation(entity) => entity.id(),
            EntitySnapshot::ValidIngredientState(entity) => entity.id(),
            EntitySnapshot::ValidVessel(entity) => entity.id(),
        }
    }

    /// Singular snake_case kind used to build event type names.
    pub fn kind(&self) -> &'static str {
        match self {
            EntitySnapshot::Recipe(_) => "recipe",
            EntitySnapshot::Meal(_) => "meal",
            EntitySnapshot::ValidIngredient(_) => "valid_ingredient",
            EntitySnapshot::ValidInstrument(_) => "valid_instrument",
            EntitySnapshot::ValidMeasurementUnit(_) => "valid_measurement_unit",
            EntitySnapshot::ValidPreparation(_) => "valid_preparation",
            EntitySnapshot::ValidIngredientState(_) => "valid_ingredient_state",
            EntitySnapshot::ValidVessel(_) => "valid_vessel",
        }
    }
}

/// `{"eventType": ..., "<entityKind>": {...}, "userID": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataChange {
    #[serde(rename = "eventType")]
    pub event_type: String,
    #[serde(flatten)]
    pub entity: EntitySnapshot,
    #[serde(rename = "userID", default)]
    pub user_id: String,
}

impl DataChange {
    pub fn new<K: Indexable>(action: ChangeAction, entity: K, user_id: impl Into<String>) -> Self {
        let entity = entity.into_snapshot();
        Self {
            event_type: format!("{}_{}", entity.kind(), action),
            entity,
            user_id: user_id.into(),
        }
    }

    /// The action encoded in the event type suffix, if it is one we know.
    pub fn action(&self) -> Option<ChangeAction> {
        let (_, suffix) = self.event_type.rsplit_once('_')?;
        match suffix {
            "created" => Some(ChangeAction::Created),
            "updated" => Some(ChangeAction::Updated),
            "archived" => Some(ChangeAction::Archived),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordMetadata;

    fn kale() -> ValidIngredient {
        ValidIngredient {
            metadata: RecordMetadata {
                id: "ing-1".into(),
                ..Default::default()
            },
            name: "kale".into(),
            ..Default::default()
        }
    }

    #[test]
    fn event_type_combines_kind_and_action() {
        let change = DataChange::new(ChangeAction::Archived, kale(), "user-1");
        assert_eq!(change.event_type, "valid_ingredient_archived");
        assert_eq!(change.action(), Some(ChangeAction::Archived));
        assert_eq!(change.entity.index_type(), IndexType::ValidIngredients);
        assert_eq!(change.entity.id(), "ing-1");
    }

    #[test]
    fn wire_form_embeds_the_snapshot_under_its_kind() {
        let change = DataChange::new(ChangeAction::Created, kale(), "user-1");
        let json = serde_json::to_value(&change).expect("serialize");

        assert_eq!(json["eventType"], "valid_ingredient_created");
        assert_eq!(json["userID"], "user-1");
        assert_eq!(json["validIngredient"]["id"], "ing-1");
        assert_eq!(json["validIngredient"]["name"], "kale");

        let decoded: DataChange = serde_json::from_value(json).expect("deserialize");
        assert_eq!(decoded, change);
    }

    #[test]
    fn unknown_suffixes_have_no_action() {
        let mut change = DataChange::new(ChangeAction::Created, kale(), "user-1");
        change.event_type = "valid_ingredient_reticulated".into();
        assert_eq!(change.action(), None);
    }

    #[test]
    fn overflow_policy_parses_snake_case() {
        let policy: OverflowPolicy = serde_json::from_str("\"drop_oldest\"").expect("parse");
        assert_eq!(policy, OverflowPolicy::DropOldest);
        assert_eq!(OverflowPolicy::default(), OverflowPolicy::DropNewest);
    }
}
