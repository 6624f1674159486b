use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] catchlog_core::Error),
    #[error(transparent)]
    Remote(#[from] catchlog_core::remote::RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Nothing to change; pass at least one field to edit")]
    NoChanges,
    #[error("Configuration error: {0}")]
    Config(String),
}
