//! Remote document store abstraction.
//!
//! The authoritative copy of a signed-in user's records lives in a
//! network-accessible document database organised in collections. This
//! module defines the operations the sync engine needs from it, a timeout
//! wrapper applied to every call, and two implementations: a REST/JSON
//! client and an in-process store.

mod document;
mod gateway;
mod http;
mod memory;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{new_uuid_string, Collection};

pub use document::{
    embedded_local_id, entity_from_document, entity_to_document, LOCAL_ID_FIELD, TRIP_ID_FIELD,
    USER_ID_FIELD,
};
pub use gateway::RemoteGateway;
pub use http::HttpDocumentStore;
pub use memory::MemoryDocumentStore;

/// Document body: a JSON object
pub type Document = Map<String, Value>;

/// A stored document and its server-assigned id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    pub data: Document,
}

/// Equality filter on a top-level document field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether `document` satisfies this filter
    pub fn matches(&self, document: &Document) -> bool {
        document.get(&self.field) == Some(&self.value)
    }
}

/// One write inside an atomic batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BatchOp {
    /// Create or fully replace the document
    Set {
        collection: Collection,
        remote_id: String,
        data: Document,
    },
    /// Merge fields into an existing document
    Update {
        collection: Collection,
        remote_id: String,
        patch: Document,
    },
    /// Remove a document; missing documents are ignored
    Delete {
        collection: Collection,
        remote_id: String,
    },
}

/// Writes that are committed together or not at all
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteBatch {
    operations: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: Collection, remote_id: impl Into<String>, data: Document) {
        self.operations.push(BatchOp::Set {
            collection,
            remote_id: remote_id.into(),
            data,
        });
    }

    /// Add a new document under a client-allocated id and return that id
    pub fn create(&mut self, collection: Collection, data: Document) -> String {
        let remote_id = new_uuid_string();
        self.set(collection, remote_id.clone(), data);
        remote_id
    }

    pub fn update(&mut self, collection: Collection, remote_id: impl Into<String>, patch: Document) {
        self.operations.push(BatchOp::Update {
            collection,
            remote_id: remote_id.into(),
            patch,
        });
    }

    pub fn delete(&mut self, collection: Collection, remote_id: impl Into<String>) {
        self.operations.push(BatchOp::Delete {
            collection,
            remote_id: remote_id.into(),
        });
    }

    pub fn operations(&self) -> &[BatchOp] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Errors reported by remote stores
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote store unreachable: {0}")]
    Unavailable(String),
    #[error("remote request timed out after {0:?}")]
    Timeout(Duration),
    #[error("document {collection}/{remote_id} not found")]
    NotFound {
        collection: Collection,
        remote_id: String,
    },
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote API error: {0}")]
    Api(String),
    #[error("invalid remote payload: {0}")]
    InvalidPayload(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Operations the sync engine needs from the authoritative document store.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Create a document and return its server-assigned id
    async fn add(&self, collection: Collection, data: Document) -> RemoteResult<String>;

    /// Fetch a document; `None` when it does not exist
    async fn get(&self, collection: Collection, remote_id: &str)
        -> RemoteResult<Option<RemoteDocument>>;

    /// Documents matching every filter
    async fn query(&self, collection: Collection, filters: &[Filter])
        -> RemoteResult<Vec<RemoteDocument>>;

    /// Merge `patch` into an existing document; `NotFound` when missing
    async fn update(&self, collection: Collection, remote_id: &str, patch: Document)
        -> RemoteResult<()>;

    /// Delete a document; deleting a missing document succeeds
    async fn delete(&self, collection: Collection, remote_id: &str) -> RemoteResult<()>;

    /// Apply every operation in `batch` atomically
    async fn commit(&self, batch: WriteBatch) -> RemoteResult<()>;
}
