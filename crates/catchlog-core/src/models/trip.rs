//! Trip model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::entity::{require_non_negative, require_text};
use super::{Collection, Entity, LocalIdGenerator};
use crate::error::{Error, Result};

/// Date format used for trip dates (`2024-01-15`)
pub const TRIP_DATE_FORMAT: &str = "%Y-%m-%d";

/// A fishing trip. Owns weather logs and catches through their `tripId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    /// Locally generated id; `0` until assigned
    #[serde(default)]
    pub id: i64,
    /// Calendar date, `YYYY-MM-DD`
    pub date: String,
    pub water: String,
    pub location: String,
    /// Hours fished
    #[serde(default)]
    pub hours: Option<f64>,
    #[serde(default)]
    pub companions: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Trip {
    /// Create an unsaved trip with the required fields
    #[must_use]
    pub fn new(
        date: impl Into<String>,
        water: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            date: date.into(),
            water: water.into(),
            location: location.into(),
            hours: None,
            companions: None,
            notes: None,
        }
    }

    #[must_use]
    pub fn with_hours(mut self, hours: f64) -> Self {
        self.hours = Some(hours);
        self
    }

    /// Parsed trip date
    pub fn parsed_date(&self) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), TRIP_DATE_FORMAT).map_err(|_| {
            Error::Validation(format!(
                "date '{}' is not a valid YYYY-MM-DD date",
                self.date
            ))
        })
    }
}

impl Entity for Trip {
    const COLLECTION: Collection = Collection::Trips;

    fn local_id(&self) -> String {
        self.id.to_string()
    }

    fn has_local_id(&self) -> bool {
        self.id > 0
    }

    fn ensure_local_id(&mut self, ids: &LocalIdGenerator) {
        if !self.has_local_id() {
            self.id = ids.next_id();
        }
    }

    fn date(&self) -> Option<&str> {
        Some(self.date.as_str())
    }

    fn validate(&self) -> Result<()> {
        require_text(&self.date, "date")?;
        self.parsed_date()?;
        require_text(&self.water, "water")?;
        require_text(&self.location, "location")?;
        require_non_negative(self.hours, "hours")
    }
}
