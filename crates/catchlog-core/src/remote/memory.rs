//! In-process document store used by tests and offline demos

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    BatchOp, Document, Filter, RemoteDocument, RemoteError, RemoteResult, RemoteStore, WriteBatch,
};
use crate::models::{new_uuid_string, Collection};

#[derive(Debug, Default)]
struct Inner {
    collections: BTreeMap<Collection, BTreeMap<String, Document>>,
    offline: bool,
    failing_commits: usize,
    add_count: usize,
    commit_count: usize,
}

/// Document store held in memory.
///
/// Cloned handles share state, so a test can keep one handle to inspect or
/// tamper with documents while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate network loss; every call fails while offline
    pub fn set_online(&self, online: bool) {
        self.lock().offline = !online;
    }

    /// Make the next `count` batch commits fail without applying anything
    pub fn fail_next_commits(&self, count: usize) {
        self.lock().failing_commits = count;
    }

    /// Number of successful `add` calls
    pub fn add_count(&self) -> usize {
        self.lock().add_count
    }

    /// Number of successful batch commits
    pub fn commit_count(&self) -> usize {
        self.lock().commit_count
    }

    /// Snapshot of every document in a collection
    pub fn documents(&self, collection: Collection) -> Vec<RemoteDocument> {
        self.lock()
            .collections
            .get(&collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, data)| RemoteDocument {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn count(&self, collection: Collection) -> usize {
        self.lock()
            .collections
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }

    /// Write a document directly, bypassing the offline switch
    pub fn insert_document(&self, collection: Collection, remote_id: &str, data: Document) {
        self.lock()
            .collections
            .entry(collection)
            .or_default()
            .insert(remote_id.to_string(), data);
    }

    /// Remove a document directly, bypassing the offline switch
    pub fn remove_document(&self, collection: Collection, remote_id: &str) -> bool {
        self.lock()
            .collections
            .get_mut(&collection)
            .is_some_and(|documents| documents.remove(remote_id).is_some())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn connected(&self) -> RemoteResult<MutexGuard<'_, Inner>> {
        let inner = self.lock();
        if inner.offline {
            Err(RemoteError::Unavailable("network is offline".to_string()))
        } else {
            Ok(inner)
        }
    }
}

impl Inner {
    fn exists(&self, collection: Collection, remote_id: &str) -> bool {
        self.collections
            .get(&collection)
            .is_some_and(|documents| documents.contains_key(remote_id))
    }

    fn merge(&mut self, collection: Collection, remote_id: &str, patch: Document) -> bool {
        let Some(document) = self
            .collections
            .get_mut(&collection)
            .and_then(|documents| documents.get_mut(remote_id))
        else {
            return false;
        };
        document.extend(patch);
        true
    }
}

impl RemoteStore for MemoryDocumentStore {
    async fn add(&self, collection: Collection, data: Document) -> RemoteResult<String> {
        let mut inner = self.connected()?;
        let remote_id = new_uuid_string();
        inner
            .collections
            .entry(collection)
            .or_default()
            .insert(remote_id.clone(), data);
        inner.add_count += 1;
        Ok(remote_id)
    }

    async fn get(
        &self,
        collection: Collection,
        remote_id: &str,
    ) -> RemoteResult<Option<RemoteDocument>> {
        let inner = self.connected()?;
        Ok(inner
            .collections
            .get(&collection)
            .and_then(|documents| documents.get(remote_id))
            .map(|data| RemoteDocument {
                id: remote_id.to_string(),
                data: data.clone(),
            }))
    }

    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> RemoteResult<Vec<RemoteDocument>> {
        let inner = self.connected()?;
        let Some(documents) = inner.collections.get(&collection) else {
            return Ok(Vec::new());
        };
        Ok(documents
            .iter()
            .filter(|(_, data)| filters.iter().all(|filter| filter.matches(data)))
            .map(|(id, data)| RemoteDocument {
                id: id.clone(),
                data: data.clone(),
            })
            .collect())
    }

    async fn update(
        &self,
        collection: Collection,
        remote_id: &str,
        patch: Document,
    ) -> RemoteResult<()> {
        let mut inner = self.connected()?;
        if inner.merge(collection, remote_id, patch) {
            Ok(())
        } else {
            Err(RemoteError::NotFound {
                collection,
                remote_id: remote_id.to_string(),
            })
        }
    }

    async fn delete(&self, collection: Collection, remote_id: &str) -> RemoteResult<()> {
        let mut inner = self.connected()?;
        if let Some(documents) = inner.collections.get_mut(&collection) {
            documents.remove(remote_id);
        }
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> RemoteResult<()> {
        let mut inner = self.connected()?;
        if inner.failing_commits > 0 {
            inner.failing_commits -= 1;
            return Err(RemoteError::Unavailable(
                "batch commit rejected".to_string(),
            ));
        }

        // Validate before applying so a bad batch leaves nothing behind.
        for op in batch.operations() {
            if let BatchOp::Update {
                collection,
                remote_id,
                ..
            } = op
            {
                let pending_set = batch.operations().iter().any(|other| {
                    matches!(other, BatchOp::Set { collection: c, remote_id: r, .. }
                        if c == collection && r == remote_id)
                });
                if !pending_set && !inner.exists(*collection, remote_id) {
                    return Err(RemoteError::NotFound {
                        collection: *collection,
                        remote_id: remote_id.clone(),
                    });
                }
            }
        }

        for op in batch.operations().iter().cloned() {
            match op {
                BatchOp::Set {
                    collection,
                    remote_id,
                    data,
                } => {
                    inner
                        .collections
                        .entry(collection)
                        .or_default()
                        .insert(remote_id, data);
                }
                BatchOp::Update {
                    collection,
                    remote_id,
                    patch,
                } => {
                    inner.merge(collection, &remote_id, patch);
                }
                BatchOp::Delete {
                    collection,
                    remote_id,
                } => {
                    if let Some(documents) = inner.collections.get_mut(&collection) {
                        documents.remove(&remote_id);
                    }
                }
            }
        }
        inner.commit_count += 1;
        Ok(())
    }
}
