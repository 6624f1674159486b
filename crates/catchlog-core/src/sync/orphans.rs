//! Orphaned child record detection and pruning

use std::collections::HashSet;

use serde::Serialize;

use super::remote_records::RemoteRecords;
use crate::models::Collection;
use crate::remote::{embedded_local_id, Filter, RemoteStore, WriteBatch, TRIP_ID_FIELD, USER_ID_FIELD};
use crate::{Error, Result};

/// What an audit pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AuditAction {
    /// No orphans found
    Clean,
    /// Orphans deleted in one batch
    Deleted,
    /// Too many orphans; nothing deleted
    Refused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub collection: Collection,
    pub scanned: usize,
    pub orphans: usize,
    pub deleted: usize,
    pub action: AuditAction,
}

impl AuditReport {
    /// Turn a refused pass into [`Error::OrphanData`]
    pub fn into_result(self, cap: usize) -> Result<Self> {
        if self.action == AuditAction::Refused {
            Err(Error::OrphanData {
                collection: self.collection,
                count: self.orphans,
                cap,
            })
        } else {
            Ok(self)
        }
    }
}

/// Removes child documents whose trip is not in the valid set.
///
/// A pass that finds `cap` or more orphans deletes nothing: a large count
/// more likely means the trip set is incomplete than that the data is bad.
#[derive(Debug, Clone, Copy)]
pub struct OrphanAuditor {
    cap: usize,
}

impl OrphanAuditor {
    pub const fn new(cap: usize) -> Self {
        Self { cap }
    }

    pub const fn cap(&self) -> usize {
        self.cap
    }

    pub async fn audit<R: RemoteStore>(
        &self,
        remote: &RemoteRecords<R>,
        collection: Collection,
        valid_trip_ids: &HashSet<i64>,
    ) -> Result<AuditReport> {
        if !collection.is_child() {
            return Err(Error::InvalidInput(format!(
                "{collection} records have no parent trip"
            )));
        }

        let owner = [Filter::equals(USER_ID_FIELD, remote.user_id())];
        let documents = remote.gateway().query(collection, &owner).await?;
        let scanned = documents.len();

        let orphans: Vec<_> = documents
            .into_iter()
            .filter(|document| {
                document
                    .data
                    .get(TRIP_ID_FIELD)
                    .and_then(serde_json::Value::as_i64)
                    .map_or(true, |trip_id| !valid_trip_ids.contains(&trip_id))
            })
            .collect();

        let mut report = AuditReport {
            collection,
            scanned,
            orphans: orphans.len(),
            deleted: 0,
            action: AuditAction::Clean,
        };
        if orphans.is_empty() {
            return Ok(report);
        }

        if orphans.len() >= self.cap {
            tracing::warn!(
                %collection,
                orphans = orphans.len(),
                cap = self.cap,
                "Orphan count exceeds safety cap; leaving records in place"
            );
            report.action = AuditAction::Refused;
            return Ok(report);
        }

        let mut batch = WriteBatch::new();
        for document in &orphans {
            batch.delete(collection, document.id.clone());
        }
        remote.gateway().commit(batch).await?;

        for document in &orphans {
            if let Some(local_id) = embedded_local_id(document) {
                remote.registry().remove(collection, &local_id).await?;
            }
        }

        tracing::info!(%collection, deleted = orphans.len(), "Pruned orphaned records");
        report.deleted = orphans.len();
        report.action = AuditAction::Deleted;
        Ok(report)
    }
}
