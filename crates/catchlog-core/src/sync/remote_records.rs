//! Remote reads and writes for one signed-in user

use serde_json::Value;

use super::queue::{OpType, OperationReplayer, QueuedOperation};
use super::registry::IdMappingRegistry;
use crate::models::{Collection, Entity, EntityFilter};
use crate::remote::{
    embedded_local_id, entity_from_document, Document, Filter, RemoteDocument, RemoteError,
    RemoteGateway, RemoteStore, WriteBatch, LOCAL_ID_FIELD, TRIP_ID_FIELD, USER_ID_FIELD,
};
use crate::{Error, Result};

/// Remote side of the sync engine, scoped to one user.
///
/// Every document it writes carries `userId` and `localId`, which is what
/// makes upserts and cascading deletes resolvable without a mapping.
pub struct RemoteRecords<R> {
    remote: RemoteGateway<R>,
    registry: IdMappingRegistry,
}

impl<R> Clone for RemoteRecords<R> {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<R: RemoteStore> RemoteRecords<R> {
    pub const fn new(remote: RemoteGateway<R>, registry: IdMappingRegistry) -> Self {
        Self { remote, registry }
    }

    pub fn user_id(&self) -> &str {
        self.registry.user_id()
    }

    pub const fn registry(&self) -> &IdMappingRegistry {
        &self.registry
    }

    pub const fn gateway(&self) -> &RemoteGateway<R> {
        &self.remote
    }

    fn owner_filter(&self) -> Filter {
        Filter::equals(USER_ID_FIELD, self.user_id())
    }

    /// Documents of this user that embed `local_id`
    pub async fn find_all_by_local_id(
        &self,
        collection: Collection,
        local_id: &str,
    ) -> Result<Vec<RemoteDocument>> {
        let filters = [self.owner_filter(), Filter::equals(LOCAL_ID_FIELD, local_id)];
        Ok(self.remote.query(collection, &filters).await?)
    }

    pub async fn find_by_local_id(
        &self,
        collection: Collection,
        local_id: &str,
    ) -> Result<Option<RemoteDocument>> {
        let mut documents = self.find_all_by_local_id(collection, local_id).await?;
        if documents.len() > 1 {
            tracing::warn!(
                %collection,
                local_id,
                count = documents.len(),
                "Several remote documents embed the same local id"
            );
        }
        Ok(if documents.is_empty() {
            None
        } else {
            Some(documents.swap_remove(0))
        })
    }

    /// Mapped remote id, confirmed to still exist.
    ///
    /// Fails with [`Error::StaleMapping`] when the mapped document is gone.
    pub async fn verified_mapping(
        &self,
        collection: Collection,
        local_id: &str,
    ) -> Result<Option<RemoteDocument>> {
        let Some(remote_id) = self.registry.get(collection, local_id).await? else {
            return Ok(None);
        };
        match self.remote.get(collection, &remote_id).await? {
            Some(document) => Ok(Some(document)),
            None => Err(Error::StaleMapping {
                collection,
                local_id: local_id.to_string(),
            }),
        }
    }

    /// Locate the document that stores `local_id`, healing stale mappings.
    pub async fn resolve(
        &self,
        collection: Collection,
        local_id: &str,
    ) -> Result<Option<RemoteDocument>> {
        match self.verified_mapping(collection, local_id).await {
            Ok(Some(document)) => return Ok(Some(document)),
            Ok(None) => {}
            Err(error @ Error::StaleMapping { .. }) => {
                tracing::warn!(%error, "Discarding stale id mapping");
                self.registry.remove(collection, local_id).await?;
            }
            Err(error) => return Err(error),
        }

        let found = self.find_by_local_id(collection, local_id).await?;
        if let Some(document) = &found {
            self.registry.put(collection, local_id, &document.id).await?;
        }
        Ok(found)
    }

    /// Create a document and remember its id
    pub async fn create(
        &self,
        collection: Collection,
        local_id: &str,
        document: Document,
    ) -> Result<String> {
        let remote_id = self.remote.add(collection, document).await?;
        self.registry.put(collection, local_id, &remote_id).await?;
        tracing::debug!(
            %collection,
            local_id,
            remote_id = remote_id.as_str(),
            "Created remote document"
        );
        Ok(remote_id)
    }

    /// Write `document` as the current state of `local_id`.
    ///
    /// Tries the mapped id first; a missing document drops the mapping and
    /// falls back to a lookup by embedded local id before creating anew.
    pub async fn upsert(
        &self,
        collection: Collection,
        local_id: &str,
        document: Document,
    ) -> Result<String> {
        if let Some(remote_id) = self.registry.get(collection, local_id).await? {
            match self
                .remote
                .update(collection, &remote_id, document.clone())
                .await
            {
                Ok(()) => return Ok(remote_id),
                Err(RemoteError::NotFound { .. }) => {
                    let error = Error::StaleMapping {
                        collection,
                        local_id: local_id.to_string(),
                    };
                    tracing::warn!(%error, remote_id = remote_id.as_str(), "Mapped document is gone");
                    self.registry.remove(collection, local_id).await?;
                }
                Err(error) => return Err(error.into()),
            }
        }

        if let Some(existing) = self.find_by_local_id(collection, local_id).await? {
            self.remote
                .update(collection, &existing.id, document)
                .await?;
            self.registry.put(collection, local_id, &existing.id).await?;
            return Ok(existing.id);
        }

        self.create(collection, local_id, document).await
    }

    /// Delete the document for `local_id` and, for trips, every child
    /// document, in one batch. Returns the number of documents targeted.
    pub async fn delete_cascade(&self, collection: Collection, local_id: &str) -> Result<usize> {
        let mut batch = WriteBatch::new();
        let mut forgotten = vec![(collection, local_id.to_string())];

        let mut targets: Vec<String> = self
            .find_all_by_local_id(collection, local_id)
            .await?
            .into_iter()
            .map(|document| document.id)
            .collect();
        if let Some(mapped) = self.registry.get(collection, local_id).await? {
            if !targets.contains(&mapped) {
                targets.push(mapped);
            }
        }
        for remote_id in targets {
            batch.delete(collection, remote_id);
        }

        if collection == Collection::Trips {
            if let Ok(trip_id) = local_id.parse::<i64>() {
                let filters = [self.owner_filter(), Filter::equals(TRIP_ID_FIELD, trip_id)];
                for child in Collection::CHILDREN {
                    for document in self.remote.query(child, &filters).await? {
                        if let Some(child_local_id) = embedded_local_id(&document) {
                            forgotten.push((child, child_local_id));
                        }
                        batch.delete(child, document.id);
                    }
                }
            }
        }

        let targeted = batch.len();
        if !batch.is_empty() {
            self.remote.commit(batch).await?;
        }
        for (collection, local_id) in forgotten {
            self.registry.remove(collection, &local_id).await?;
        }
        tracing::debug!(%collection, local_id, targeted, "Deleted remote documents");
        Ok(targeted)
    }

    /// Fetch one record, registering its remote id
    pub async fn fetch<E: Entity>(&self, local_id: &str) -> Result<Option<E>> {
        let Some(document) = self.resolve(E::COLLECTION, local_id).await? else {
            return Ok(None);
        };
        match entity_from_document::<E>(&document) {
            Ok(entity) => Ok(Some(entity)),
            Err(error) => {
                tracing::warn!(
                    collection = %E::COLLECTION,
                    remote_id = document.id.as_str(),
                    %error,
                    "Skipping malformed remote document"
                );
                Ok(None)
            }
        }
    }

    /// Fetch every record of this user matching `filter`, registering each
    /// remote id as it goes.
    pub async fn fetch_all<E: Entity>(&self, filter: &EntityFilter) -> Result<Vec<E>> {
        let mut filters = vec![self.owner_filter()];
        match filter {
            EntityFilter::All => {}
            EntityFilter::TripId(trip_id) => filters.push(Filter::equals(TRIP_ID_FIELD, *trip_id)),
            EntityFilter::Date(date) => filters.push(Filter::equals("date", date.as_str())),
        }

        let documents = self.remote.query(E::COLLECTION, &filters).await?;
        let mut entities = Vec::with_capacity(documents.len());
        for document in documents {
            let entity = match entity_from_document::<E>(&document) {
                Ok(entity) => entity,
                Err(error) => {
                    tracing::warn!(
                        collection = %E::COLLECTION,
                        remote_id = document.id.as_str(),
                        %error,
                        "Skipping malformed remote document"
                    );
                    continue;
                }
            };
            self.registry
                .put(E::COLLECTION, &entity.local_id(), &document.id)
                .await?;
            entities.push(entity);
        }
        Ok(entities)
    }
}

impl<R: RemoteStore> OperationReplayer for RemoteRecords<R> {
    async fn replay(&self, operation: &QueuedOperation) -> Result<()> {
        match operation.op_type {
            OpType::Create | OpType::Update => {
                let Some(Value::Object(mut document)) = operation.payload.clone() else {
                    return Err(Error::InvalidInput(format!(
                        "queued {} for {}/{} has no document",
                        operation.op_type, operation.collection, operation.local_id
                    )));
                };
                document.insert(USER_ID_FIELD.to_string(), Value::from(self.user_id()));
                document.insert(
                    LOCAL_ID_FIELD.to_string(),
                    Value::from(operation.local_id.as_str()),
                );
                self.upsert(operation.collection, &operation.local_id, document)
                    .await?;
            }
            OpType::Delete => {
                self.delete_cascade(operation.collection, &operation.local_id)
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{FishCaught, Trip, WeatherLog};
    use crate::remote::{entity_to_document, MemoryDocumentStore};
    use crate::services::LocalStore;
    use pretty_assertions::assert_eq;

    async fn records(user: &str) -> (RemoteRecords<MemoryDocumentStore>, MemoryDocumentStore) {
        let store = MemoryDocumentStore::new();
        let local = LocalStore::open_in_memory().await.unwrap();
        let gateway = RemoteGateway::new(store.clone(), Duration::from_secs(5));
        (
            RemoteRecords::new(gateway, IdMappingRegistry::new(local, user)),
            store,
        )
    }

    fn trip(id: i64) -> Trip {
        Trip {
            id,
            ..Trip::new("2024-01-15", "Lake Taupo", "Western Bay")
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_is_idempotent_per_local_id() {
        let (records, store) = records("user-1").await;
        let document = entity_to_document(&trip(1), "user-1").unwrap();

        let first = records
            .upsert(Collection::Trips, "1", document.clone())
            .await
            .unwrap();
        let second = records
            .upsert(Collection::Trips, "1", document)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(store.count(Collection::Trips), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_recovers_from_lost_mapping() {
        let (records, store) = records("user-1").await;
        let document = entity_to_document(&trip(1), "user-1").unwrap();
        let remote_id = records
            .create(Collection::Trips, "1", document.clone())
            .await
            .unwrap();

        records.registry().clear().await.unwrap();
        let again = records
            .upsert(Collection::Trips, "1", document)
            .await
            .unwrap();
        assert_eq!(again, remote_id);
        assert_eq!(store.count(Collection::Trips), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_mapping_is_discarded_and_recreated() {
        let (records, store) = records("user-1").await;
        let document = entity_to_document(&trip(1), "user-1").unwrap();
        let remote_id = records
            .create(Collection::Trips, "1", document.clone())
            .await
            .unwrap();
        store.remove_document(Collection::Trips, &remote_id);

        let verified = records.verified_mapping(Collection::Trips, "1").await;
        assert!(matches!(verified, Err(Error::StaleMapping { .. })));

        let recreated = records
            .upsert(Collection::Trips, "1", document)
            .await
            .unwrap();
        assert_ne!(recreated, remote_id);
        assert_eq!(
            records
                .registry()
                .get(Collection::Trips, "1")
                .await
                .unwrap()
                .as_deref(),
            Some(recreated.as_str())
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn trip_delete_takes_children_in_one_batch() {
        let (records, store) = records("user-1").await;
        records
            .create(
                Collection::Trips,
                "1",
                entity_to_document(&trip(1), "user-1").unwrap(),
            )
            .await
            .unwrap();

        let mut log = WeatherLog::new(1, "Morning", "Clear", "Calm", "N");
        log.id = "1-1".to_string();
        let mut fish = FishCaught::new(1, "Rainbow trout");
        fish.id = "f1".to_string();
        records
            .create(
                Collection::WeatherLogs,
                "1-1",
                entity_to_document(&log, "user-1").unwrap(),
            )
            .await
            .unwrap();
        records
            .create(
                Collection::FishCaught,
                "f1",
                entity_to_document(&fish, "user-1").unwrap(),
            )
            .await
            .unwrap();

        let targeted = records.delete_cascade(Collection::Trips, "1").await.unwrap();
        assert_eq!(targeted, 3);
        assert_eq!(store.commit_count(), 1);
        for collection in Collection::ALL {
            assert_eq!(store.count(collection), 0);
        }
        assert!(records.registry().list().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_all_only_returns_owned_documents() {
        let (records, store) = records("user-1").await;
        store.insert_document(
            Collection::Trips,
            "theirs",
            entity_to_document(&trip(9), "user-2").unwrap(),
        );
        records
            .create(
                Collection::Trips,
                "1",
                entity_to_document(&trip(1), "user-1").unwrap(),
            )
            .await
            .unwrap();

        let trips: Vec<Trip> = records.fetch_all(&EntityFilter::All).await.unwrap();
        assert_eq!(trips, vec![trip(1)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replay_without_document_is_rejected() {
        let (records, _store) = records("user-1").await;
        let operation = QueuedOperation {
            id: "op".to_string(),
            op_type: OpType::Create,
            collection: Collection::Trips,
            local_id: "1".to_string(),
            payload: None,
            enqueued_at: chrono::Utc::now(),
            attempts: 0,
            last_error: None,
        };
        assert!(matches!(
            records.replay(&operation).await,
            Err(Error::InvalidInput(_))
        ));
    }
}
