//! Local-to-remote identifier mapping model

use serde::{Deserialize, Serialize};

use super::Collection;

/// Translation of one local id into the remote document id that stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdMapping {
    pub scope_user_id: String,
    pub collection: Collection,
    pub local_id: String,
    pub remote_id: String,
}
