//! Identifier mapping registry

use crate::models::{Collection, IdMapping};
use crate::services::LocalStore;
use crate::Result;

const KEY_PREFIX: &str = "idmap";

/// Persistent `(collection, local id) -> remote id` table for one user.
///
/// Entries live in the key-value store under `idmap:{user}:{collection}:{local id}`
/// so two accounts on the same device never see each other's mappings.
/// A returned remote id is provisional until a remote read confirms it.
#[derive(Clone)]
pub struct IdMappingRegistry {
    store: LocalStore,
    user_id: String,
}

impl IdMappingRegistry {
    pub fn new(store: LocalStore, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn put(&self, collection: Collection, local_id: &str, remote_id: &str) -> Result<()> {
        self.store
            .kv_set(&self.key(collection, local_id), remote_id)
            .await
    }

    pub async fn get(&self, collection: Collection, local_id: &str) -> Result<Option<String>> {
        self.store.kv_get(&self.key(collection, local_id)).await
    }

    pub async fn remove(&self, collection: Collection, local_id: &str) -> Result<bool> {
        self.store.kv_delete(&self.key(collection, local_id)).await
    }

    /// Every mapping owned by this user
    pub async fn list(&self) -> Result<Vec<IdMapping>> {
        let prefix = self.prefix();
        let entries = self.store.kv_list_prefix(&prefix).await?;

        let mut mappings = Vec::with_capacity(entries.len());
        for (key, remote_id) in entries {
            let Some((collection, local_id)) = key
                .strip_prefix(&prefix)
                .and_then(|rest| rest.split_once(':'))
            else {
                continue;
            };
            let Ok(collection) = collection.parse::<Collection>() else {
                tracing::debug!(key = %key, "Skipping mapping with unknown collection");
                continue;
            };
            mappings.push(IdMapping {
                scope_user_id: self.user_id.clone(),
                collection,
                local_id: local_id.to_string(),
                remote_id,
            });
        }
        Ok(mappings)
    }

    /// Drop every mapping owned by this user
    pub async fn clear(&self) -> Result<u64> {
        self.store.kv_delete_prefix(&self.prefix()).await
    }

    fn prefix(&self) -> String {
        format!("{KEY_PREFIX}:{}:", self.user_id)
    }

    fn key(&self, collection: Collection, local_id: &str) -> String {
        format!("{}{collection}:{local_id}", self.prefix())
    }
}
