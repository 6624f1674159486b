//! Database layer for Catchlog

mod connection;
mod entity_repository;
mod kv_repository;
mod migrations;

pub use connection::Database;
pub use entity_repository::{EntityRepository, LibSqlEntityRepository, StoredEntity};
pub use kv_repository::{KeyValueRepository, LibSqlKeyValueRepository};
