//! Weather observation model

use serde::{Deserialize, Serialize};

use super::entity::{require_text, require_trip_id};
use super::{Collection, Entity, LocalIdGenerator};
use crate::error::{Error, Result};

/// Weather conditions recorded during a trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherLog {
    /// `"{tripId}-{generated}"`; empty until assigned
    #[serde(default)]
    pub id: String,
    pub trip_id: i64,
    pub time_of_day: String,
    pub sky: String,
    pub wind_condition: String,
    pub wind_direction: String,
    /// Water temperature as entered (degrees, may be blank)
    #[serde(default)]
    pub water_temp: String,
    /// Air temperature as entered (degrees, may be blank)
    #[serde(default)]
    pub air_temp: String,
}

impl WeatherLog {
    /// Create an unsaved observation for `trip_id`
    #[must_use]
    pub fn new(
        trip_id: i64,
        time_of_day: impl Into<String>,
        sky: impl Into<String>,
        wind_condition: impl Into<String>,
        wind_direction: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            trip_id,
            time_of_day: time_of_day.into(),
            sky: sky.into(),
            wind_condition: wind_condition.into(),
            wind_direction: wind_direction.into(),
            water_temp: String::new(),
            air_temp: String::new(),
        }
    }

    #[must_use]
    pub fn with_temperatures(
        mut self,
        water_temp: impl Into<String>,
        air_temp: impl Into<String>,
    ) -> Self {
        self.water_temp = water_temp.into();
        self.air_temp = air_temp.into();
        self
    }
}

fn validate_temperature(value: &str, field: &str) -> Result<()> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(()),
        _ => Err(Error::Validation(format!(
            "{field} '{value}' is not a number"
        ))),
    }
}

impl Entity for WeatherLog {
    const COLLECTION: Collection = Collection::WeatherLogs;

    fn local_id(&self) -> String {
        self.id.clone()
    }

    fn has_local_id(&self) -> bool {
        !self.id.trim().is_empty()
    }

    fn ensure_local_id(&mut self, ids: &LocalIdGenerator) {
        if !self.has_local_id() {
            self.id = ids.next_child_id(self.trip_id);
        }
    }

    fn trip_id(&self) -> Option<i64> {
        Some(self.trip_id)
    }

    fn validate(&self) -> Result<()> {
        require_trip_id(self.trip_id)?;
        require_text(&self.time_of_day, "timeOfDay")?;
        require_text(&self.sky, "sky")?;
        require_text(&self.wind_condition, "windCondition")?;
        require_text(&self.wind_direction, "windDirection")?;
        validate_temperature(&self.water_temp, "waterTemp")?;
        validate_temperature(&self.air_temp, "airTemp")
    }
}
