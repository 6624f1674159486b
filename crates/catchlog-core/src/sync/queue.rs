//! Offline mutation queue

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::models::{new_uuid_string, Collection};
use crate::services::LocalStore;
use crate::{Error, Result};

const KEY_PREFIX: &str = "queue";
const DEAD_LETTER_PREFIX: &str = "deadletter";

/// Kind of write waiting for the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OpType {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for OpType {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        formatter.write_str(label)
    }
}

/// A write that could not be applied remotely yet.
///
/// `payload` holds the full record snapshot for creates and updates and is
/// empty for deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    pub id: String,
    pub op_type: OpType,
    pub collection: Collection,
    pub local_id: String,
    #[serde(default)]
    pub payload: Option<Value>,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Applies one queued operation to the remote store.
#[allow(async_fn_in_trait)]
pub trait OperationReplayer {
    async fn replay(&self, operation: &QueuedOperation) -> Result<()>;
}

/// Outcome of one drain pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub applied: usize,
    pub remaining: usize,
    /// Operations moved aside because they can never apply
    pub dead_lettered: usize,
    /// Why the pass stopped early, if it did
    pub failure: Option<String>,
}

/// Durable FIFO of pending writes for one user.
///
/// The queue is stored as a JSON array under `queue:{user}` in the
/// key-value store. Entries leave the queue only after the remote store
/// confirms them, or when they are rejected for good and moved to
/// `deadletter:{user}`.
#[derive(Clone)]
pub struct OfflineQueue {
    store: LocalStore,
    user_id: String,
    guard: Arc<Mutex<()>>,
    /// Held for a whole drain pass so two passes never replay the same head
    draining: Arc<Mutex<()>>,
}

impl OfflineQueue {
    pub fn new(store: LocalStore, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            guard: Arc::new(Mutex::new(())),
            draining: Arc::new(Mutex::new(())),
        }
    }

    /// Persist a pending write and return the local id the caller can use
    /// right away.
    pub async fn enqueue(
        &self,
        op_type: OpType,
        collection: Collection,
        local_id: &str,
        payload: Option<Value>,
    ) -> Result<String> {
        let operation = QueuedOperation {
            id: new_uuid_string(),
            op_type,
            collection,
            local_id: local_id.to_string(),
            payload,
            enqueued_at: Utc::now(),
            attempts: 0,
            last_error: None,
        };

        let _guard = self.guard.lock().await;
        let mut operations = self.load().await?;
        operations.push(operation);
        self.save(&operations).await?;

        tracing::debug!(
            %op_type,
            %collection,
            local_id,
            pending = operations.len(),
            "Queued operation for later sync"
        );
        Ok(local_id.to_string())
    }

    /// Pending operations, oldest first
    pub async fn pending(&self) -> Result<Vec<QueuedOperation>> {
        let _guard = self.guard.lock().await;
        self.load().await
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.pending().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Operations the remote store rejected permanently, oldest first
    pub async fn dead_letters(&self) -> Result<Vec<QueuedOperation>> {
        let _guard = self.guard.lock().await;
        self.load_from(&self.dead_letter_key()).await
    }

    /// Drop every pending and dead-lettered operation
    pub async fn clear(&self) -> Result<usize> {
        let _guard = self.guard.lock().await;
        let dropped = self.load().await?.len();
        self.store.kv_delete(&self.key()).await?;
        self.store.kv_delete(&self.dead_letter_key()).await?;
        Ok(dropped)
    }

    /// Replay pending operations in order.
    ///
    /// Stops at the first retryable failure so later writes to the same
    /// record never overtake an earlier one. That entry stays at the head
    /// with its attempt count and last error updated. An entry that fails
    /// for any other reason is moved to the dead-letter list and the pass
    /// continues.
    pub async fn drain(&self, replayer: &impl OperationReplayer) -> Result<DrainReport> {
        let _draining = self.draining.lock().await;
        let mut report = DrainReport::default();

        loop {
            let head = {
                let _guard = self.guard.lock().await;
                self.load().await?.into_iter().next()
            };
            let Some(operation) = head else {
                break;
            };

            match replayer.replay(&operation).await {
                Ok(()) => {
                    self.remove(&operation.id).await?;
                    report.applied += 1;
                }
                Err(error) if !error.is_retryable() => {
                    tracing::error!(
                        op_type = %operation.op_type,
                        collection = %operation.collection,
                        local_id = operation.local_id.as_str(),
                        %error,
                        "Queued operation rejected; moved to dead letters"
                    );
                    self.dead_letter(operation, &error).await?;
                    report.dead_lettered += 1;
                }
                Err(error) => {
                    let error = Error::QueueReplay {
                        op_id: operation.id.clone(),
                        reason: error.to_string(),
                    };
                    tracing::warn!(
                        op_type = %operation.op_type,
                        collection = %operation.collection,
                        local_id = operation.local_id.as_str(),
                        %error,
                        "Queue drain stopped"
                    );
                    self.record_failure(&operation.id, &error).await?;
                    report.failure = Some(error.to_string());
                    break;
                }
            }
        }

        report.remaining = self.len().await?;
        Ok(report)
    }

    async fn remove(&self, operation_id: &str) -> Result<()> {
        let _guard = self.guard.lock().await;
        let mut operations = self.load().await?;
        operations.retain(|operation| operation.id != operation_id);
        self.save(&operations).await
    }

    async fn record_failure(&self, operation_id: &str, error: &Error) -> Result<()> {
        let _guard = self.guard.lock().await;
        let mut operations = self.load().await?;
        if let Some(operation) = operations
            .iter_mut()
            .find(|operation| operation.id == operation_id)
        {
            operation.attempts = operation.attempts.saturating_add(1);
            operation.last_error = Some(error.to_string());
        }
        self.save(&operations).await
    }

    async fn dead_letter(&self, mut operation: QueuedOperation, error: &Error) -> Result<()> {
        let _guard = self.guard.lock().await;
        operation.attempts = operation.attempts.saturating_add(1);
        operation.last_error = Some(error.to_string());

        let dead_letter_key = self.dead_letter_key();
        let mut dead = self.load_from(&dead_letter_key).await?;
        let operation_id = operation.id.clone();
        dead.push(operation);
        self.save_to(&dead_letter_key, &dead).await?;

        let mut operations = self.load().await?;
        operations.retain(|pending| pending.id != operation_id);
        self.save(&operations).await
    }

    async fn load(&self) -> Result<Vec<QueuedOperation>> {
        self.load_from(&self.key()).await
    }

    async fn save(&self, operations: &[QueuedOperation]) -> Result<()> {
        self.save_to(&self.key(), operations).await
    }

    async fn load_from(&self, key: &str) -> Result<Vec<QueuedOperation>> {
        match self.store.kv_get(key).await? {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save_to(&self, key: &str, operations: &[QueuedOperation]) -> Result<()> {
        if operations.is_empty() {
            self.store.kv_delete(key).await?;
            return Ok(());
        }
        let payload = serde_json::to_string(operations)?;
        self.store.kv_set(key, &payload).await
    }

    fn key(&self) -> String {
        format!("{KEY_PREFIX}:{}", self.user_id)
    }

    fn dead_letter_key(&self) -> String {
        format!("{DEAD_LETTER_PREFIX}:{}", self.user_id)
    }
}
