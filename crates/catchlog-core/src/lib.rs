//! catchlog-core - Core library for Catchlog
//!
//! This crate contains the record models, local database layer, remote
//! document store clients and the offline-first sync engine shared by every
//! Catchlog front end.

pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod models;
pub mod remote;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Collection, FishCaught, Trip, WeatherLog};
pub use sync::SyncService;
