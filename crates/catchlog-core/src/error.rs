//! Error types for catchlog-core

use thiserror::Error;

use crate::models::Collection;
use crate::remote::RemoteError;

/// Result type alias using catchlog-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in catchlog-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed entity, rejected before any I/O
    #[error("Validation error: {0}")]
    Validation(String),

    /// Sync service used before `initialize`
    #[error("Sync service is not initialized")]
    NotInitialized,

    /// Network or remote service failure
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// Mapping points at a remote document that no longer exists
    #[error("Stale id mapping for {collection}/{local_id}")]
    StaleMapping {
        collection: Collection,
        local_id: String,
    },

    /// Too many orphaned child records to prune safely
    #[error("{count} orphaned {collection} records exceed safety cap of {cap}; nothing deleted")]
    OrphanData {
        collection: Collection,
        count: usize,
        cap: usize,
    },

    /// A queued operation could not be reapplied to the remote store
    #[error("Queued operation {op_id} could not be replayed: {reason}")]
    QueueReplay { op_id: String, reason: String },

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not allowed in the current service mode
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error came from the remote side and should be absorbed
    /// by falling back to the local store.
    pub const fn is_remote_failure(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_))
    }

    /// Whether running the same operation again could succeed. Anything
    /// else is a property of the operation itself.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable(_) | Self::LibSql(_) | Self::Io(_)
        )
    }
}

impl From<RemoteError> for Error {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::NotFound {
                collection,
                remote_id,
            } => Self::NotFound(format!("{collection}/{remote_id}")),
            other => Self::RemoteUnavailable(other.to_string()),
        }
    }
}
