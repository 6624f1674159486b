//! Where reads and writes go in each service mode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;

use super::queue::{OfflineQueue, OpType};
use super::remote_records::RemoteRecords;
use crate::models::{Entity, EntityFilter};
use crate::remote::{entity_to_document, RemoteStore};
use crate::services::LocalStore;
use crate::Result;

/// Shared online/offline flag
#[derive(Debug, Clone)]
pub struct Connectivity(Arc<AtomicBool>);

impl Connectivity {
    pub fn new(online: bool) -> Self {
        Self(Arc::new(AtomicBool::new(online)))
    }

    pub fn is_online(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Store `online` and return the previous value
    pub fn set(&self, online: bool) -> bool {
        self.0.swap(online, Ordering::AcqRel)
    }
}

/// Record operations shared by guest and signed-in storage.
///
/// Records passed in already carry their local id and have been validated.
#[allow(async_fn_in_trait)]
pub trait StorageStrategy {
    async fn create<E: Entity>(&self, entity: &E) -> Result<String>;

    async fn get<E: Entity>(&self, local_id: &str) -> Result<Option<E>>;

    async fn list<E: Entity>(&self, filter: &EntityFilter) -> Result<Vec<E>>;

    async fn update<E: Entity>(&self, entity: &E) -> Result<()>;

    /// Insert or replace by local id
    async fn upsert<E: Entity>(&self, entity: &E) -> Result<()>;

    async fn delete<E: Entity>(&self, local_id: &str) -> Result<()>;
}

/// Local-only storage for anonymous use
#[derive(Clone)]
pub struct GuestStorage {
    local: LocalStore,
}

impl GuestStorage {
    pub const fn new(local: LocalStore) -> Self {
        Self { local }
    }

    pub const fn local(&self) -> &LocalStore {
        &self.local
    }
}

impl StorageStrategy for GuestStorage {
    async fn create<E: Entity>(&self, entity: &E) -> Result<String> {
        self.local.create(entity).await?;
        Ok(entity.local_id())
    }

    async fn get<E: Entity>(&self, local_id: &str) -> Result<Option<E>> {
        self.local.get(local_id).await
    }

    async fn list<E: Entity>(&self, filter: &EntityFilter) -> Result<Vec<E>> {
        self.local.list(filter).await
    }

    async fn update<E: Entity>(&self, entity: &E) -> Result<()> {
        self.local.update(entity).await
    }

    async fn upsert<E: Entity>(&self, entity: &E) -> Result<()> {
        self.local.upsert(entity).await
    }

    async fn delete<E: Entity>(&self, local_id: &str) -> Result<()> {
        self.local.delete(E::COLLECTION, local_id).await?;
        Ok(())
    }
}

/// Remote-first storage for a signed-in user.
///
/// Remote failures never reach the caller: writes land locally and are
/// queued, reads fall back to the local store.
pub struct AuthenticatedStorage<R> {
    local: LocalStore,
    remote: RemoteRecords<R>,
    queue: OfflineQueue,
    connectivity: Connectivity,
}

impl<R> Clone for AuthenticatedStorage<R> {
    fn clone(&self) -> Self {
        Self {
            local: self.local.clone(),
            remote: self.remote.clone(),
            queue: self.queue.clone(),
            connectivity: self.connectivity.clone(),
        }
    }
}

impl<R: RemoteStore> AuthenticatedStorage<R> {
    pub const fn new(
        local: LocalStore,
        remote: RemoteRecords<R>,
        queue: OfflineQueue,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            local,
            remote,
            queue,
            connectivity,
        }
    }

    pub fn user_id(&self) -> &str {
        self.remote.user_id()
    }

    pub const fn remote(&self) -> &RemoteRecords<R> {
        &self.remote
    }

    pub const fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    pub const fn local(&self) -> &LocalStore {
        &self.local
    }

    /// Whether a write may go straight to the remote store.
    ///
    /// Older queued writes are replayed first. If any remain, the new write
    /// has to queue behind them.
    async fn backlog_cleared(&self) -> Result<bool> {
        if self.queue.is_empty().await? {
            return Ok(true);
        }
        let report = self.queue.drain(&self.remote).await?;
        if report.remaining > 0 {
            tracing::debug!(
                remaining = report.remaining,
                "Queued writes still pending; new write goes behind them"
            );
        }
        Ok(report.remaining == 0)
    }

    async fn enqueue<E: Entity>(&self, op_type: OpType, entity: &E) -> Result<()> {
        let document = entity_to_document(entity, self.user_id())?;
        self.queue
            .enqueue(
                op_type,
                E::COLLECTION,
                &entity.local_id(),
                Some(Value::Object(document)),
            )
            .await?;
        Ok(())
    }
}

impl<R: RemoteStore> StorageStrategy for AuthenticatedStorage<R> {
    async fn create<E: Entity>(&self, entity: &E) -> Result<String> {
        let local_id = entity.local_id();
        if self.connectivity.is_online() && self.backlog_cleared().await? {
            let document = entity_to_document(entity, self.user_id())?;
            match self.remote.create(E::COLLECTION, &local_id, document).await {
                Ok(_) => {
                    self.local.upsert(entity).await?;
                    return Ok(local_id);
                }
                Err(error) if error.is_remote_failure() => {
                    tracing::warn!(
                        collection = %E::COLLECTION,
                        local_id = local_id.as_str(),
                        %error,
                        "Remote create failed; saving locally"
                    );
                }
                Err(error) => return Err(error),
            }
        }

        self.local.upsert(entity).await?;
        self.enqueue(OpType::Create, entity).await?;
        Ok(local_id)
    }

    async fn get<E: Entity>(&self, local_id: &str) -> Result<Option<E>> {
        if self.connectivity.is_online() {
            match self.remote.fetch::<E>(local_id).await {
                Ok(Some(entity)) => return Ok(Some(entity)),
                Ok(None) => {}
                Err(error) if error.is_remote_failure() => {
                    tracing::warn!(
                        collection = %E::COLLECTION,
                        local_id,
                        %error,
                        "Remote read failed; using local copy"
                    );
                }
                Err(error) => return Err(error),
            }
        }
        self.local.get(local_id).await
    }

    async fn list<E: Entity>(&self, filter: &EntityFilter) -> Result<Vec<E>> {
        if self.connectivity.is_online() {
            match self.remote.fetch_all::<E>(filter).await {
                Ok(entities) => return Ok(entities),
                Err(error) if error.is_remote_failure() => {
                    tracing::warn!(
                        collection = %E::COLLECTION,
                        %error,
                        "Remote query failed; using local copies"
                    );
                }
                Err(error) => return Err(error),
            }
        }
        self.local.list(filter).await
    }

    async fn update<E: Entity>(&self, entity: &E) -> Result<()> {
        self.upsert(entity).await
    }

    async fn upsert<E: Entity>(&self, entity: &E) -> Result<()> {
        self.local.upsert(entity).await?;

        if self.connectivity.is_online() && self.backlog_cleared().await? {
            let local_id = entity.local_id();
            let document = entity_to_document(entity, self.user_id())?;
            match self.remote.upsert(E::COLLECTION, &local_id, document).await {
                Ok(_) => return Ok(()),
                Err(error) if error.is_remote_failure() => {
                    tracing::warn!(
                        collection = %E::COLLECTION,
                        local_id = local_id.as_str(),
                        %error,
                        "Remote update failed; queued for retry"
                    );
                }
                Err(error) => return Err(error),
            }
        }

        self.enqueue(OpType::Update, entity).await?;
        Ok(())
    }

    async fn delete<E: Entity>(&self, local_id: &str) -> Result<()> {
        self.local.delete(E::COLLECTION, local_id).await?;

        if self.connectivity.is_online() && self.backlog_cleared().await? {
            match self.remote.delete_cascade(E::COLLECTION, local_id).await {
                Ok(_) => return Ok(()),
                Err(error) if error.is_remote_failure() => {
                    tracing::warn!(
                        collection = %E::COLLECTION,
                        local_id,
                        %error,
                        "Remote delete failed; queued for retry"
                    );
                }
                Err(error) => return Err(error),
            }
        }

        self.queue
            .enqueue(OpType::Delete, E::COLLECTION, local_id, None)
            .await?;
        Ok(())
    }
}

/// Storage selected once per mode transition
pub enum ActiveStorage<R> {
    Guest(GuestStorage),
    Authenticated(AuthenticatedStorage<R>),
}

impl<R: RemoteStore> ActiveStorage<R> {
    pub const fn authenticated(&self) -> Option<&AuthenticatedStorage<R>> {
        match self {
            Self::Guest(_) => None,
            Self::Authenticated(storage) => Some(storage),
        }
    }

    /// Local store scoped to the active owner
    pub const fn local(&self) -> &LocalStore {
        match self {
            Self::Guest(storage) => storage.local(),
            Self::Authenticated(storage) => storage.local(),
        }
    }
}

impl<R: RemoteStore> StorageStrategy for ActiveStorage<R> {
    async fn create<E: Entity>(&self, entity: &E) -> Result<String> {
        match self {
            Self::Guest(storage) => storage.create(entity).await,
            Self::Authenticated(storage) => storage.create(entity).await,
        }
    }

    async fn get<E: Entity>(&self, local_id: &str) -> Result<Option<E>> {
        match self {
            Self::Guest(storage) => storage.get(local_id).await,
            Self::Authenticated(storage) => storage.get(local_id).await,
        }
    }

    async fn list<E: Entity>(&self, filter: &EntityFilter) -> Result<Vec<E>> {
        match self {
            Self::Guest(storage) => storage.list(filter).await,
            Self::Authenticated(storage) => storage.list(filter).await,
        }
    }

    async fn update<E: Entity>(&self, entity: &E) -> Result<()> {
        match self {
            Self::Guest(storage) => storage.update(entity).await,
            Self::Authenticated(storage) => storage.update(entity).await,
        }
    }

    async fn upsert<E: Entity>(&self, entity: &E) -> Result<()> {
        match self {
            Self::Guest(storage) => storage.upsert(entity).await,
            Self::Authenticated(storage) => storage.upsert(entity).await,
        }
    }

    async fn delete<E: Entity>(&self, local_id: &str) -> Result<()> {
        match self {
            Self::Guest(storage) => storage.delete::<E>(local_id).await,
            Self::Authenticated(storage) => storage.delete::<E>(local_id).await,
        }
    }
}
