//! One-time merge of guest records into a signed-in account.

use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;

use super::orphans::{AuditReport, OrphanAuditor};
use super::remote_records::RemoteRecords;
use crate::models::{Collection, Entity, EntityFilter, FishCaught, Trip, WeatherLog};
use crate::remote::{entity_to_document, Filter, RemoteStore, WriteBatch, USER_ID_FIELD};
use crate::services::LocalStore;
use crate::{Error, Result};

/// Key-value entry recording that a user's merge committed
pub fn migration_key(user_id: &str) -> String {
    format!("migration:{user_id}")
}

/// Key-value entry marking a sign-in whose merge still has to run
pub fn deferred_merge_key(user_id: &str) -> String {
    format!("merge-deferred:{user_id}")
}

/// Result of a merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub created: usize,
    pub updated: usize,
    /// Children skipped because their trip was not merged
    pub orphans_skipped: usize,
    pub audits: Vec<AuditReport>,
}

impl MergeReport {
    pub const fn written(&self) -> usize {
        self.created + self.updated
    }
}

struct PendingMerge {
    batch: WriteBatch,
    mappings: Vec<(Collection, String, String)>,
    report: MergeReport,
}

impl PendingMerge {
    fn new() -> Self {
        Self {
            batch: WriteBatch::new(),
            mappings: Vec::new(),
            report: MergeReport::default(),
        }
    }

    async fn stage<E: Entity, R: RemoteStore>(
        &mut self,
        remote: &RemoteRecords<R>,
        entity: &E,
    ) -> Result<()> {
        let local_id = entity.local_id();
        let document = entity_to_document(entity, remote.user_id())?;

        let existing = match remote.verified_mapping(E::COLLECTION, &local_id).await {
            Ok(Some(found)) => Some(found.id),
            Ok(None) => None,
            Err(error @ Error::StaleMapping { .. }) => {
                tracing::warn!(%error, "Discarding stale id mapping before merge");
                remote.registry().remove(E::COLLECTION, &local_id).await?;
                None
            }
            Err(error) => return Err(error),
        };
        // A previous merge may have committed without recording its mappings.
        let existing = match existing {
            Some(remote_id) => Some(remote_id),
            None => remote
                .find_by_local_id(E::COLLECTION, &local_id)
                .await?
                .map(|found| found.id),
        };

        let remote_id = match existing {
            Some(remote_id) => {
                self.batch.update(E::COLLECTION, remote_id.clone(), document);
                self.report.updated += 1;
                remote_id
            }
            None => {
                self.report.created += 1;
                self.batch.create(E::COLLECTION, document)
            }
        };
        self.mappings.push((E::COLLECTION, local_id, remote_id));
        Ok(())
    }

    async fn stage_children<E: Entity, R: RemoteStore>(
        &mut self,
        remote: &RemoteRecords<R>,
        children: &[E],
        merged_trips: &HashSet<i64>,
    ) -> Result<()> {
        for child in children {
            let parent_merged = child
                .trip_id()
                .is_some_and(|trip_id| merged_trips.contains(&trip_id));
            if !parent_merged {
                tracing::warn!(
                    collection = %E::COLLECTION,
                    local_id = child.local_id().as_str(),
                    trip_id = child.trip_id(),
                    "Skipping orphaned record during merge"
                );
                self.report.orphans_skipped += 1;
                continue;
            }
            self.stage(remote, child).await?;
        }
        Ok(())
    }
}

/// Push every guest record into the user's remote collections.
///
/// All writes go out in one batch. When the commit fails nothing local has
/// changed, so the whole merge can run again. Mappings, the account's local
/// copies and the migration marker are written only after the commit
/// succeeds. Guest records are left in place.
pub async fn reconcile<R: RemoteStore>(
    guest: &LocalStore,
    account: &LocalStore,
    remote: &RemoteRecords<R>,
    auditor: OrphanAuditor,
) -> Result<MergeReport> {
    let trips: Vec<Trip> = guest.list(&EntityFilter::All).await?;
    let weather_logs: Vec<WeatherLog> = guest.list(&EntityFilter::All).await?;
    let fish_caught: Vec<FishCaught> = guest.list(&EntityFilter::All).await?;

    let mut pending = PendingMerge::new();
    let mut merged_trips = HashSet::with_capacity(trips.len());
    for trip in &trips {
        pending.stage(remote, trip).await?;
        merged_trips.insert(trip.id);
    }
    pending
        .stage_children(remote, &weather_logs, &merged_trips)
        .await?;
    pending
        .stage_children(remote, &fish_caught, &merged_trips)
        .await?;

    let PendingMerge {
        batch,
        mappings,
        mut report,
    } = pending;

    if !batch.is_empty() {
        let operations = batch.len();
        remote.gateway().commit(batch).await?;
        tracing::info!(
            user_id = remote.user_id(),
            operations,
            created = report.created,
            updated = report.updated,
            "Merge batch committed"
        );
    }

    for (collection, local_id, remote_id) in &mappings {
        remote.registry().put(*collection, local_id, remote_id).await?;
    }
    mirror(account, &trips, &merged_trips).await?;
    mirror(account, &weather_logs, &merged_trips).await?;
    mirror(account, &fish_caught, &merged_trips).await?;

    let user_id = remote.user_id();
    account
        .kv_set(&migration_key(user_id), &Utc::now().to_rfc3339())
        .await?;
    account.kv_delete(&deferred_merge_key(user_id)).await?;

    match audit_children(remote, auditor).await {
        Ok(audits) => report.audits = audits,
        Err(error) => tracing::warn!(%error, "Post-merge orphan audit failed"),
    }

    Ok(report)
}

/// Copy merged records into the account's local scope for offline reads
async fn mirror<E: Entity>(
    account: &LocalStore,
    records: &[E],
    merged_trips: &HashSet<i64>,
) -> Result<()> {
    for record in records {
        let merged = !E::COLLECTION.is_child()
            || record
                .trip_id()
                .is_some_and(|trip_id| merged_trips.contains(&trip_id));
        if merged {
            account.upsert(record).await?;
        }
    }
    Ok(())
}

/// Ids of the trips the user currently has remotely
pub async fn remote_trip_ids<R: RemoteStore>(remote: &RemoteRecords<R>) -> Result<HashSet<i64>> {
    let owner = [Filter::equals(USER_ID_FIELD, remote.user_id())];
    let documents = remote.gateway().query(Collection::Trips, &owner).await?;
    Ok(documents
        .iter()
        .filter_map(|document| document.data.get("id").and_then(serde_json::Value::as_i64))
        .collect())
}

async fn audit_children<R: RemoteStore>(
    remote: &RemoteRecords<R>,
    auditor: OrphanAuditor,
) -> Result<Vec<AuditReport>> {
    let valid = remote_trip_ids(remote).await?;
    let mut audits = Vec::with_capacity(Collection::CHILDREN.len());
    for collection in Collection::CHILDREN {
        audits.push(auditor.audit(remote, collection, &valid).await?);
    }
    Ok(audits)
}
