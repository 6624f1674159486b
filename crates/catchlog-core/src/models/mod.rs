//! Data models for Catchlog

mod collection;
mod entity;
mod fish_caught;
mod id_mapping;
mod ids;
mod trip;
mod weather_log;

pub use collection::Collection;
pub use entity::{Entity, EntityFilter};
pub use fish_caught::FishCaught;
pub use id_mapping::IdMapping;
pub use ids::{new_uuid_string, LocalIdGenerator};
pub use trip::{Trip, TRIP_DATE_FORMAT};
pub use weather_log::WeatherLog;
