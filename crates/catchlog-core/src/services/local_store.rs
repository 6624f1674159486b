//! Shared local store service used by the sync engine and clients.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    Database, EntityRepository, KeyValueRepository, LibSqlEntityRepository,
    LibSqlKeyValueRepository, StoredEntity,
};
use crate::models::{Collection, Entity, EntityFilter};
use crate::{Error, Result};

/// Session that owns a set of local records.
///
/// Guest records and each signed-in user's mirrored records live side by
/// side in one database but are never visible to each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Guest,
    User(String),
}

impl Owner {
    /// Value stored in the `owner` column
    pub fn key(&self) -> String {
        match self {
            Self::Guest => "guest".to_string(),
            Self::User(user_id) => format!("user:{user_id}"),
        }
    }
}

/// Thread-safe handle to the on-device record store and key-value store.
///
/// Record operations are scoped to one [`Owner`]; a freshly opened store
/// is scoped to the guest. Key-value entries are shared by every scope.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
    owner: Arc<str>,
}

impl LocalStore {
    /// Open a local store at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        Ok(Self::with_database(db, Some(db_path)))
    }

    /// Open an in-memory local store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self::with_database(db, None))
    }

    fn with_database(db: Database, db_path: Option<PathBuf>) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            db_path,
            owner: Arc::from(Owner::Guest.key()),
        }
    }

    /// Handle on the same database scoped to `owner`'s records.
    pub fn scoped(&self, owner: &Owner) -> Self {
        Self {
            db: Arc::clone(&self.db),
            db_path: self.db_path.clone(),
            owner: Arc::from(owner.key()),
        }
    }

    /// Owner key this handle reads and writes
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Path of the backing file, if any.
    pub fn db_path(&self) -> Option<&std::path::Path> {
        self.db_path.as_deref()
    }

    /// Insert a new record.
    pub async fn create<E: Entity>(&self, entity: &E) -> Result<()> {
        let row = self.to_row(entity)?;
        let db = self.db.lock().await;
        let repo = LibSqlEntityRepository::new(db.connection());
        repo.insert(&row).await
    }

    /// Insert or replace a record.
    pub async fn upsert<E: Entity>(&self, entity: &E) -> Result<()> {
        let row = self.to_row(entity)?;
        let db = self.db.lock().await;
        let repo = LibSqlEntityRepository::new(db.connection());
        repo.upsert(&row).await
    }

    /// Fetch a record by local id.
    pub async fn get<E: Entity>(&self, local_id: &str) -> Result<Option<E>> {
        let payload = {
            let db = self.db.lock().await;
            let repo = LibSqlEntityRepository::new(db.connection());
            repo.get(&self.owner, E::COLLECTION, local_id).await?
        };
        payload
            .map(|payload| serde_json::from_str(&payload).map_err(Error::from))
            .transpose()
    }

    /// List records matching `filter`, oldest first.
    pub async fn list<E: Entity>(&self, filter: &EntityFilter) -> Result<Vec<E>> {
        let payloads = {
            let db = self.db.lock().await;
            let repo = LibSqlEntityRepository::new(db.connection());
            repo.list(&self.owner, E::COLLECTION, filter).await?
        };
        payloads
            .iter()
            .map(|payload| serde_json::from_str(payload).map_err(Error::from))
            .collect()
    }

    /// Replace an existing record.
    pub async fn update<E: Entity>(&self, entity: &E) -> Result<()> {
        let row = self.to_row(entity)?;
        let db = self.db.lock().await;
        let updated = LibSqlEntityRepository::new(db.connection())
            .update(&row)
            .await?;
        if updated {
            Ok(())
        } else {
            Err(Error::NotFound(format!("{}/{}", row.collection, row.local_id)))
        }
    }

    /// Delete a record; trips also take their weather logs and catches.
    ///
    /// The cascade runs in one transaction. Returns the number of rows
    /// removed.
    pub async fn delete(&self, collection: Collection, local_id: &str) -> Result<u64> {
        let db = self.db.lock().await;
        let tx = db.connection().transaction().await?;

        let result = {
            let repo = LibSqlEntityRepository::new(&tx);
            self.delete_cascade(&repo, collection, local_id).await
        };
        match result {
            Ok(removed) => {
                tx.commit().await?;
                Ok(removed)
            }
            Err(error) => {
                tx.rollback().await.ok();
                Err(error)
            }
        }
    }

    async fn delete_cascade(
        &self,
        repo: &LibSqlEntityRepository<'_>,
        collection: Collection,
        local_id: &str,
    ) -> Result<u64> {
        let mut removed = u64::from(repo.delete(&self.owner, collection, local_id).await?);
        if collection == Collection::Trips {
            if let Ok(trip_id) = local_id.parse::<i64>() {
                for child in Collection::CHILDREN {
                    removed += repo.delete_by_trip(&self.owner, child, trip_id).await?;
                }
            }
        }
        Ok(removed)
    }

    /// Number of records in a collection.
    pub async fn count(&self, collection: Collection) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlEntityRepository::new(db.connection());
        repo.count(&self.owner, collection).await
    }

    /// Whether this owner has any record in any collection.
    pub async fn has_data(&self) -> Result<bool> {
        for collection in Collection::ALL {
            if self.count(collection).await? > 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Delete every record of this owner. Key-value entries are kept.
    pub async fn clear_all(&self) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlEntityRepository::new(db.connection());
        repo.clear_all(&self.owner).await
    }

    /// Read a key-value entry.
    pub async fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let repo = LibSqlKeyValueRepository::new(db.connection());
        repo.get(key).await
    }

    /// Write a key-value entry.
    pub async fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlKeyValueRepository::new(db.connection());
        repo.set(key, value).await
    }

    /// Remove a key-value entry.
    pub async fn kv_delete(&self, key: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlKeyValueRepository::new(db.connection());
        repo.delete(key).await
    }

    /// List key-value entries under a prefix.
    pub async fn kv_list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let db = self.db.lock().await;
        let repo = LibSqlKeyValueRepository::new(db.connection());
        repo.list_prefix(prefix).await
    }

    /// Remove key-value entries under a prefix.
    pub async fn kv_delete_prefix(&self, prefix: &str) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlKeyValueRepository::new(db.connection());
        repo.delete_prefix(prefix).await
    }

    fn to_row<E: Entity>(&self, entity: &E) -> Result<StoredEntity> {
        Ok(StoredEntity {
            owner: self.owner.to_string(),
            collection: E::COLLECTION,
            local_id: entity.local_id(),
            trip_id: entity.trip_id(),
            date: entity.date().map(str::to_string),
            payload: serde_json::to_string(entity)?,
        })
    }
}
