//! Catch record model

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::entity::{require_non_negative, require_text, require_trip_id};
use super::ids::new_uuid_string;
use super::{Collection, Entity, LocalIdGenerator};
use crate::error::{Error, Result};

/// A fish landed during a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FishCaught {
    /// UUID v7 string; empty until assigned
    #[serde(default)]
    pub id: String,
    pub trip_id: i64,
    pub species: String,
    /// Length in centimetres
    #[serde(default)]
    pub length: Option<f64>,
    /// Weight in kilograms
    #[serde(default)]
    pub weight: Option<f64>,
    /// Time of catch, `HH:MM`
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub gear: Vec<String>,
    #[serde(default)]
    pub details: Option<String>,
}

impl FishCaught {
    /// Create an unsaved catch record for `trip_id`
    #[must_use]
    pub fn new(trip_id: i64, species: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            trip_id,
            species: species.into(),
            length: None,
            weight: None,
            time: None,
            gear: Vec::new(),
            details: None,
        }
    }
}

impl Entity for FishCaught {
    const COLLECTION: Collection = Collection::FishCaught;

    fn local_id(&self) -> String {
        self.id.clone()
    }

    fn has_local_id(&self) -> bool {
        !self.id.trim().is_empty()
    }

    fn ensure_local_id(&mut self, _ids: &LocalIdGenerator) {
        if !self.has_local_id() {
            self.id = new_uuid_string();
        }
    }

    fn trip_id(&self) -> Option<i64> {
        Some(self.trip_id)
    }

    fn validate(&self) -> Result<()> {
        require_trip_id(self.trip_id)?;
        require_text(&self.species, "species")?;
        require_non_negative(self.length, "length")?;
        require_non_negative(self.weight, "weight")?;
        if let Some(time) = self.time.as_deref().map(str::trim) {
            if !time.is_empty() && NaiveTime::parse_from_str(time, "%H:%M").is_err() {
                return Err(Error::Validation(format!(
                    "time '{time}' must be HH:MM"
                )));
            }
        }
        if self.gear.iter().any(|item| item.trim().is_empty()) {
            return Err(Error::Validation(
                "gear entries must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rainbow() -> FishCaught {
        FishCaught {
            length: Some(45.0),
            weight: Some(1.2),
            time: Some("06:45".to_string()),
            gear: vec!["Woolly bugger".to_string()],
            ..FishCaught::new(7, "Rainbow trout")
        }
    }

    #[test]
    fn valid_catch_passes() {
        assert!(rainbow().validate().is_ok());
    }

    #[test]
    fn negative_weight_is_rejected() {
        let fish = FishCaught {
            weight: Some(-0.1),
            ..rainbow()
        };
        assert!(matches!(fish.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn malformed_time_is_rejected() {
        let fish = FishCaught {
            time: Some("dawn".to_string()),
            ..rainbow()
        };
        assert!(fish.validate().is_err());
    }

    #[test]
    fn missing_species_is_rejected() {
        assert!(FishCaught::new(7, "").validate().is_err());
    }

    #[test]
    fn deserializes_without_optional_fields() {
        let fish: FishCaught =
            serde_json::from_str(r#"{"id":"f1","tripId":7,"species":"Brown trout"}"#).unwrap();
        assert!(fish.gear.is_empty());
        assert_eq!(fish.length, None);
    }
}
