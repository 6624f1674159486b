//! Common behaviour of the persisted record kinds

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Collection, LocalIdGenerator};
use crate::error::{Error, Result};

/// A record that lives in both the local store and the remote document store.
pub trait Entity: Clone + std::fmt::Debug + Serialize + DeserializeOwned {
    /// Collection the record is stored in
    const COLLECTION: Collection;

    /// Local id in its string form (the key used by stores and mappings)
    fn local_id(&self) -> String;

    /// Whether a local id has been assigned yet
    fn has_local_id(&self) -> bool;

    /// Assign a fresh local id when none is set
    fn ensure_local_id(&mut self, ids: &LocalIdGenerator);

    /// Owning trip, for child records
    fn trip_id(&self) -> Option<i64> {
        None
    }

    /// Calendar date, for records that are looked up by date
    fn date(&self) -> Option<&str> {
        None
    }

    /// Schema checks performed before any I/O
    fn validate(&self) -> Result<()>;
}

/// Row selection shared by the local and remote stores
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityFilter {
    All,
    TripId(i64),
    Date(String),
}

pub(crate) fn require_text(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::Validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}

pub(crate) fn require_non_negative(value: Option<f64>, field: &str) -> Result<()> {
    match value {
        Some(number) if !number.is_finite() => {
            Err(Error::Validation(format!("{field} must be a finite number")))
        }
        Some(number) if number < 0.0 => {
            Err(Error::Validation(format!("{field} must not be negative")))
        }
        _ => Ok(()),
    }
}

pub(crate) fn require_trip_id(trip_id: i64) -> Result<()> {
    if trip_id > 0 {
        Ok(())
    } else {
        Err(Error::Validation("tripId must reference a trip".to_string()))
    }
}
