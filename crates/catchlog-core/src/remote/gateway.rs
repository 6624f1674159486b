//! Timeout wrapper around a remote store

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{Document, Filter, RemoteDocument, RemoteError, RemoteResult, RemoteStore, WriteBatch};
use crate::models::Collection;

/// Shared handle that bounds every remote call by a deadline.
///
/// An elapsed deadline is reported as [`RemoteError::Timeout`], which the
/// engine treats like any other unreachable-remote failure.
pub struct RemoteGateway<R> {
    inner: Arc<R>,
    timeout: Duration,
}

impl<R> Clone for RemoteGateway<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            timeout: self.timeout,
        }
    }
}

impl<R: RemoteStore> RemoteGateway<R> {
    pub fn new(inner: R, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn add(&self, collection: Collection, data: Document) -> RemoteResult<String> {
        self.bounded(self.inner.add(collection, data)).await
    }

    pub async fn get(
        &self,
        collection: Collection,
        remote_id: &str,
    ) -> RemoteResult<Option<RemoteDocument>> {
        self.bounded(self.inner.get(collection, remote_id)).await
    }

    pub async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> RemoteResult<Vec<RemoteDocument>> {
        self.bounded(self.inner.query(collection, filters)).await
    }

    pub async fn update(
        &self,
        collection: Collection,
        remote_id: &str,
        patch: Document,
    ) -> RemoteResult<()> {
        self.bounded(self.inner.update(collection, remote_id, patch))
            .await
    }

    pub async fn delete(&self, collection: Collection, remote_id: &str) -> RemoteResult<()> {
        self.bounded(self.inner.delete(collection, remote_id)).await
    }

    pub async fn commit(&self, batch: WriteBatch) -> RemoteResult<()> {
        self.bounded(self.inner.commit(batch)).await
    }

    async fn bounded<T>(&self, call: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis(), "Remote call timed out");
                Err(RemoteError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StalledStore;

    impl RemoteStore for StalledStore {
        async fn add(&self, _collection: Collection, _data: Document) -> RemoteResult<String> {
            std::future::pending().await
        }

        async fn get(
            &self,
            _collection: Collection,
            _remote_id: &str,
        ) -> RemoteResult<Option<RemoteDocument>> {
            std::future::pending().await
        }

        async fn query(
            &self,
            _collection: Collection,
            _filters: &[Filter],
        ) -> RemoteResult<Vec<RemoteDocument>> {
            Ok(Vec::new())
        }

        async fn update(
            &self,
            _collection: Collection,
            _remote_id: &str,
            _patch: Document,
        ) -> RemoteResult<()> {
            std::future::pending().await
        }

        async fn delete(&self, _collection: Collection, _remote_id: &str) -> RemoteResult<()> {
            std::future::pending().await
        }

        async fn commit(&self, _batch: WriteBatch) -> RemoteResult<()> {
            std::future::pending().await
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stalled_call_times_out() {
        let gateway = RemoteGateway::new(StalledStore, Duration::from_millis(20));
        let result = gateway.add(Collection::Trips, Document::new()).await;
        assert!(matches!(result, Err(RemoteError::Timeout(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn prompt_call_passes_through() {
        let gateway = RemoteGateway::new(StalledStore, Duration::from_millis(20));
        let documents = gateway.query(Collection::Trips, &[]).await.unwrap();
        assert!(documents.is_empty());
    }
}
