//! Collection names shared by the local and remote stores

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three persisted record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Collection {
    #[serde(rename = "trips")]
    Trips,
    #[serde(rename = "weatherLogs")]
    WeatherLogs,
    #[serde(rename = "fishCaught")]
    FishCaught,
}

impl Collection {
    /// All collections, parents first.
    pub const ALL: [Self; 3] = [Self::Trips, Self::WeatherLogs, Self::FishCaught];

    /// Collections whose records belong to a trip.
    pub const CHILDREN: [Self; 2] = [Self::WeatherLogs, Self::FishCaught];

    /// Wire name used for table rows, remote collections and key namespaces
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trips => "trips",
            Self::WeatherLogs => "weatherLogs",
            Self::FishCaught => "fishCaught",
        }
    }

    /// Whether records in this collection carry a `tripId` parent reference
    #[must_use]
    pub const fn is_child(self) -> bool {
        !matches!(self, Self::Trips)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trips" => Ok(Self::Trips),
            "weatherLogs" => Ok(Self::WeatherLogs),
            "fishCaught" => Ok(Self::FishCaught),
            other => Err(format!("unknown collection '{other}'")),
        }
    }
}
