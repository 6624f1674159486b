//! Import batches handed to the sync engine.
//!
//! An importer parses an archive into an [`ImportBatch`] and chooses whether
//! the batch replaces existing records or is merged into them.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{Entity, FishCaught, Trip, WeatherLog};
use crate::{Error, Result};

/// How an import treats records that already exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStrategy {
    /// Delete every existing record first
    Wipe,
    /// Upsert by id; importing the same batch twice changes nothing
    #[default]
    Merge,
}

impl FromStr for ImportStrategy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "wipe" => Ok(Self::Wipe),
            "merge" => Ok(Self::Merge),
            other => Err(format!("unknown import strategy '{other}' (expected wipe or merge)")),
        }
    }
}

/// Records to import, grouped by collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatch {
    #[serde(default)]
    pub trips: Vec<Trip>,
    #[serde(default)]
    pub weather_logs: Vec<WeatherLog>,
    #[serde(default)]
    pub fish_caught: Vec<FishCaught>,
}

impl ImportBatch {
    pub fn len(&self) -> usize {
        self.trips.len() + self.weather_logs.len() + self.fish_caught.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate every record, naming the first bad one
    pub fn validate(&self) -> Result<()> {
        validate_all("trips", &self.trips)?;
        validate_all("weatherLogs", &self.weather_logs)?;
        validate_all("fishCaught", &self.fish_caught)
    }
}

/// Counts from an applied import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub trips: usize,
    pub weather_logs: usize,
    pub fish_caught: usize,
    /// Children whose trip is neither in the batch nor stored
    pub skipped_orphans: usize,
    /// Trips removed before importing, for [`ImportStrategy::Wipe`]
    pub wiped: usize,
}

pub fn parse_import_batch(payload: &str) -> Result<ImportBatch> {
    serde_json::from_str(payload)
        .map_err(|error| Error::InvalidInput(format!("invalid import batch JSON: {error}")))
}

fn validate_all<E: Entity>(label: &str, entities: &[E]) -> Result<()> {
    for (index, entity) in entities.iter().enumerate() {
        entity.validate().map_err(|error| match error {
            Error::Validation(message) => Error::Validation(format!("{label}[{index}]: {message}")),
            other => other,
        })?;
    }
    Ok(())
}
