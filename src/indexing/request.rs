//! The index request envelope carried on the indexing queue.

use crate::error::{Error, Result};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of search indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    Recipes,
    Meals,
    ValidIngredients,
    ValidInstruments,
    ValidMeasurementUnits,
    ValidPreparations,
    ValidIngredientStates,
    #[serde(rename = "vessels")]
    ValidVessels,
}

impl IndexType {
    pub const ALL: [IndexType; 8] = [
        IndexType::Recipes,
        IndexType::Meals,
        IndexType::ValidIngredients,
        IndexType::ValidInstruments,
        IndexType::ValidMeasurementUnits,
        IndexType::ValidPreparations,
        IndexType::ValidIngredientStates,
        IndexType::ValidVessels,
    ];

    /// The wire tag, also used as the index and table name.
    pub fn as_str(self) -> &'static str {
        match self {
            IndexType::Recipes => "recipes",
            IndexType::Meals => "meals",
            IndexType::ValidIngredients => "valid_ingredients",
            IndexType::ValidInstruments => "valid_instruments",
            IndexType::ValidMeasurementUnits => "valid_measurement_units",
            IndexType::ValidPreparations => "valid_preparations",
            IndexType::ValidIngredientStates => "valid_ingredient_states",
            IndexType::ValidVessels => "vessels",
        }
    }

    /// Path segment of the HTTP collection for this kind.
    pub fn route_segment(self) -> &'static str {
        match self {
            IndexType::ValidVessels => "valid_vessels",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        IndexType::ALL
            .into_iter()
            .find(|index_type| index_type.as_str() == value)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown index type: {value}")))
    }
}

/// Instruction to (re)index or delete one row.
///
/// `index_type` stays a raw string so that unknown tags survive decoding and
/// can be dropped by the dispatcher instead of poisoning the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRequest {
    #[serde(rename = "id", default)]
    pub request_id: String,
    #[serde(rename = "rowID")]
    pub row_id: String,
    #[serde(rename = "type")]
    pub index_type: String,
    #[serde(default)]
    pub delete: bool,
}

impl IndexRequest {
    pub fn new(index_type: IndexType, row_id: impl Into<String>, delete: bool) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().simple().to_string(),
            row_id: row_id.into(),
            index_type: index_type.as_str().to_string(),
            delete,
        }
    }

    pub fn parsed_index_type(&self) -> Result<IndexType> {
        self.index_type.parse()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload)
            .map_err(|error| Error::InvalidRequest(format!("malformed index request: {error}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_tags_round_trip_through_from_str() {
        for index_type in IndexType::ALL {
            assert_eq!(index_type.as_str().parse::<IndexType>().expect("parse"), index_type);
        }
        assert!("blurgh".parse::<IndexType>().is_err());
    }

    #[test]
    fn vessels_use_a_short_tag_but_a_prefixed_route() {
        assert_eq!(IndexType::ValidVessels.as_str(), "vessels");
        assert_eq!(IndexType::ValidVessels.route_segment(), "valid_vessels");
        assert_eq!(
            serde_json::to_value(IndexType::ValidVessels).expect("serialize"),
            serde_json::json!("vessels")
        );
    }

    #[test]
    fn decodes_the_queue_wire_format() {
        let request = IndexRequest::from_bytes(
            br#"{"id":"req-1","rowID":"ing-1","type":"valid_ingredients","delete":true}"#,
        )
        .expect("decode");

        assert_eq!(request.request_id, "req-1");
        assert_eq!(request.row_id, "ing-1");
        assert_eq!(request.parsed_index_type().expect("type"), IndexType::ValidIngredients);
        assert!(request.delete);
    }

    #[test]
    fn unknown_types_still_decode() {
        let request =
            IndexRequest::from_bytes(br#"{"rowID":"x","type":"blurgh"}"#).expect("decode");
        assert_eq!(request.index_type, "blurgh");
        assert!(!request.delete);
        assert!(request.parsed_index_type().is_err());
    }

    #[test]
    fn malformed_payloads_are_invalid_requests() {
        let error = IndexRequest::from_bytes(b"not json").unwrap_err();
        assert!(matches!(error, Error::InvalidRequest(_)));
    }

    #[test]
    fn encoded_requests_use_camel_case_keys() {
        let request = IndexRequest::new(IndexType::Meals, "meal-1", false);
        let value: serde_json::Value =
            serde_json::from_slice(&request.to_bytes().expect("encode")).expect("json");

        assert_eq!(value["rowID"], "meal-1");
        assert_eq!(value["type"], "meals");
        assert_eq!(value["delete"], false);
        assert!(!value["id"].as_str().expect("id").is_empty());
    }
}
