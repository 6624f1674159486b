use pretty_assertions::assert_eq;

use super::*;
use crate::config::SyncConfig;
use crate::import::{ImportBatch, ImportStrategy};
use crate::models::{Collection, FishCaught, Trip, WeatherLog};
use crate::remote::{entity_to_document, MemoryDocumentStore};
use crate::services::{LocalStore, Owner};
use crate::state::{ServiceMode, SyncState};
use crate::Error;

async fn service_with(config: SyncConfig) -> (SyncService<MemoryDocumentStore>, MemoryDocumentStore) {
    let local = LocalStore::open_in_memory().await.unwrap();
    let store = MemoryDocumentStore::new();
    (SyncService::new(local, store.clone(), config), store)
}

async fn service() -> (SyncService<MemoryDocumentStore>, MemoryDocumentStore) {
    service_with(SyncConfig::default()).await
}

fn taupo() -> Trip {
    Trip::new("2024-01-15", "Lake Taupo", "Western Bay").with_hours(4.0)
}

fn trip_on(date: &str, water: &str) -> Trip {
    Trip::new(date, water, "Boat ramp")
}

#[tokio::test(flavor = "multi_thread")]
async fn guest_offline_create_stays_local() {
    let (service, store) = service().await;
    service.set_online(false).await.unwrap();
    service.initialize(None).await.unwrap();

    let id = service.create_trip(taupo()).await.unwrap();

    let saved = service.get_trip_by_id(id).await.unwrap().unwrap();
    assert_eq!(saved, Trip { id, ..taupo() });
    assert_eq!(store.count(Collection::Trips), 0);
    assert_eq!(store.add_count(), 0);
    assert!(service.pending_operations().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn guest_online_never_touches_remote() {
    let (service, store) = service().await;
    service.initialize(None).await.unwrap();

    let id = service.create_trip(taupo()).await.unwrap();
    service.delete_trip(id).await.unwrap();
    assert_eq!(store.add_count(), 0);
    assert_eq!(store.commit_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn signed_in_create_writes_remote_and_maps_id() {
    let (service, store) = service().await;
    service.initialize(Some("user-1")).await.unwrap();

    let id = service.create_trip(taupo()).await.unwrap();

    let documents = store.documents(Collection::Trips);
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].data["userId"], "user-1");
    assert_eq!(documents[0].data["localId"], id.to_string());

    let mappings = service.id_mappings().await.unwrap();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].collection, Collection::Trips);
    assert_eq!(mappings[0].local_id, id.to_string());
    assert_eq!(mappings[0].remote_id, documents[0].id);

    let fetched = service.get_trip_by_id(id).await.unwrap().unwrap();
    assert_eq!(fetched, Trip { id, ..taupo() });
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_create_is_queued_then_synced_once() {
    let (service, store) = service().await;
    service.initialize(Some("user-1")).await.unwrap();
    service.set_online(false).await.unwrap();

    let id = service.create_trip(taupo()).await.unwrap();
    assert!(service.is_ready().await);
    assert_eq!(service.pending_operations().await.unwrap().len(), 1);
    assert_eq!(store.count(Collection::Trips), 0);
    assert_eq!(service.sync_status().await, SyncState::Offline);

    let report = service.set_online(true).await.unwrap().unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.remaining, 0);

    let again = service.drain_sync_queue().await.unwrap();
    assert_eq!(again.applied, 0);

    let documents = store.documents(Collection::Trips);
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].data["localId"], id.to_string());
    assert_eq!(service.sync_status().await, SyncState::Synced);
}

#[tokio::test(flavor = "multi_thread")]
async fn double_merge_keeps_three_trips() {
    let (service, store) = service().await;
    service.initialize(None).await.unwrap();
    for water in ["Lake Taupo", "Lake Rotoiti", "Tongariro River"] {
        service.create_trip(trip_on("2024-01-15", water)).await.unwrap();
    }

    let first = service.switch_to_user("user-1").await.unwrap().unwrap();
    assert_eq!(first.created, 3);

    let second = service.merge_local_data_for_user().await.unwrap();
    let third = service.merge_local_data_for_user().await.unwrap();
    assert_eq!(second, first);
    assert_eq!(third, first);

    assert_eq!(store.count(Collection::Trips), 3);
    assert_eq!(service.merge_runs(), 1);
    assert!(service.has_completed_migration().await.unwrap());
    assert_eq!(
        service.mode().await,
        ServiceMode::UserReady {
            user_id: "user-1".to_string()
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_switches_share_one_merge() {
    let (service, store) = service().await;
    service.initialize(None).await.unwrap();
    for water in ["Lake Taupo", "Lake Rotoiti", "Tongariro River"] {
        service.create_trip(trip_on("2024-01-15", water)).await.unwrap();
    }

    let (first, second) = tokio::join!(
        service.switch_to_user("user-1"),
        service.switch_to_user("user-1")
    );
    assert!(first.unwrap().is_some());
    assert!(second.unwrap().is_some());
    assert_eq!(service.merge_runs(), 1);
    assert_eq!(store.count(Collection::Trips), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_initialize_runs_one_merge() {
    let (service, store) = service().await;
    let (first, second) = tokio::join!(service.initialize(None), service.initialize(None));
    first.unwrap();
    second.unwrap();
    service.create_trip(taupo()).await.unwrap();

    let (first, second) = tokio::join!(
        service.initialize(Some("user-1")),
        service.initialize(Some("user-1"))
    );
    first.unwrap();
    second.unwrap();

    assert_eq!(service.merge_runs(), 1);
    assert_eq!(store.count(Collection::Trips), 1);
    assert!(service.is_ready().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn merge_after_relogin_does_not_duplicate() {
    let (service, store) = service().await;
    service.initialize(None).await.unwrap();
    service.create_trip(taupo()).await.unwrap();
    service.switch_to_user("user-1").await.unwrap();

    service.sign_out().await;
    service.initialize(None).await.unwrap();
    let report = service.switch_to_user("user-1").await.unwrap().unwrap();

    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 1);
    assert_eq!(service.merge_runs(), 2);
    assert_eq!(store.count(Collection::Trips), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_merge_commit_can_be_retried() {
    let (service, store) = service().await;
    service.initialize(None).await.unwrap();
    service.create_trip(taupo()).await.unwrap();
    store.fail_next_commits(1);

    assert_eq!(service.switch_to_user("user-1").await.unwrap(), None);
    assert!(service.is_ready().await);
    assert!(!service.has_completed_migration().await.unwrap());
    assert_eq!(store.count(Collection::Trips), 0);
    assert!(service.has_local_data().await.unwrap());

    let report = service.merge_local_data_for_user().await.unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(store.count(Collection::Trips), 1);
    assert!(service.has_completed_migration().await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn deleting_trip_cascades_in_both_stores() {
    let (service, store) = service().await;
    service.initialize(Some("user-1")).await.unwrap();

    let trip_id = service.create_trip(taupo()).await.unwrap();
    for time_of_day in ["Morning", "Evening"] {
        service
            .create_weather_log(WeatherLog::new(trip_id, time_of_day, "Clear", "Calm", "N"))
            .await
            .unwrap();
    }
    service
        .create_fish_caught(FishCaught::new(trip_id, "Rainbow trout"))
        .await
        .unwrap();
    assert_eq!(store.count(Collection::WeatherLogs), 2);
    assert_eq!(service.get_weather_logs_for_trip(trip_id).await.unwrap().len(), 2);
    assert_eq!(store.commit_count(), 0);

    service.delete_trip(trip_id).await.unwrap();

    assert_eq!(store.commit_count(), 1);
    let account = service.local().scoped(&Owner::User("user-1".to_string()));
    for collection in Collection::ALL {
        assert_eq!(store.count(collection), 0);
        assert_eq!(account.count(collection).await.unwrap(), 0);
    }
    assert!(service.id_mappings().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_mapping_heals_on_update() {
    let (service, store) = service().await;
    service.initialize(Some("user-1")).await.unwrap();
    let id = service.create_trip(taupo()).await.unwrap();
    let original = store.documents(Collection::Trips)[0].id.clone();
    store.remove_document(Collection::Trips, &original);

    let mut edited = Trip { id, ..taupo() };
    edited.notes = Some("Cleared out of band".to_string());
    service.update_trip(&edited).await.unwrap();

    let documents = store.documents(Collection::Trips);
    assert_eq!(documents.len(), 1);
    assert_ne!(documents[0].id, original);
    assert_eq!(documents[0].data["notes"], "Cleared out of band");
    assert_eq!(service.id_mappings().await.unwrap()[0].remote_id, documents[0].id);
    assert!(service.pending_operations().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_remote_record_falls_back_to_local_copy() {
    let (service, store) = service().await;
    service.initialize(Some("user-1")).await.unwrap();
    let id = service.create_trip(taupo()).await.unwrap();
    let remote_id = store.documents(Collection::Trips)[0].id.clone();
    store.remove_document(Collection::Trips, &remote_id);

    let fetched = service.get_trip_by_id(id).await.unwrap();
    assert_eq!(fetched, Some(Trip { id, ..taupo() }));
    assert!(service.id_mappings().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_updates_and_deletes_replay_in_order() {
    let (service, store) = service().await;
    service.initialize(Some("user-1")).await.unwrap();
    let first = service.create_trip(taupo()).await.unwrap();

    service.set_online(false).await.unwrap();
    let mut edited = Trip { id: first, ..taupo() };
    edited.notes = Some("Edited offline".to_string());
    service.update_trip(&edited).await.unwrap();
    let second = service
        .create_trip(trip_on("2024-02-01", "Lake Rotoiti"))
        .await
        .unwrap();
    service.delete_trip(first).await.unwrap();

    let kinds: Vec<OpType> = service
        .pending_operations()
        .await
        .unwrap()
        .iter()
        .map(|operation| operation.op_type)
        .collect();
    assert_eq!(kinds, vec![OpType::Update, OpType::Create, OpType::Delete]);

    let report = service.set_online(true).await.unwrap().unwrap();
    assert_eq!(report.applied, 3);

    let documents = store.documents(Collection::Trips);
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].data["localId"], second.to_string());
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_replay_stays_queued() {
    let (service, store) = service().await;
    service.initialize(Some("user-1")).await.unwrap();
    service.set_online(false).await.unwrap();
    service.create_trip(taupo()).await.unwrap();

    store.set_online(false);
    let report = service.set_online(true).await.unwrap().unwrap();
    assert_eq!(report.applied, 0);
    assert_eq!(report.remaining, 1);
    assert!(report.failure.is_some());
    assert_eq!(service.sync_status().await, SyncState::Error);

    let pending = service.pending_operations().await.unwrap();
    assert_eq!(pending[0].attempts, 1);

    store.set_online(true);
    let report = service.drain_sync_queue().await.unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(store.count(Collection::Trips), 1);
    assert_eq!(service.sync_status().await, SyncState::Synced);
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_after_outage_does_not_resurrect_queued_create() {
    let (service, store) = service().await;
    service.initialize(Some("user-1")).await.unwrap();
    store.set_online(false);
    let id = service.create_trip(taupo()).await.unwrap();
    assert_eq!(service.pending_operations().await.unwrap().len(), 1);

    store.set_online(true);
    service.delete_trip(id).await.unwrap();

    assert_eq!(store.count(Collection::Trips), 0);
    assert!(service.pending_operations().await.unwrap().is_empty());
    assert_eq!(service.drain_sync_queue().await.unwrap().applied, 0);
    assert_eq!(store.count(Collection::Trips), 0);
    assert_eq!(service.get_trip_by_id(id).await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn update_after_outage_is_not_overwritten_by_queued_create() {
    let (service, store) = service().await;
    service.initialize(Some("user-1")).await.unwrap();
    store.set_online(false);
    let id = service.create_trip(taupo()).await.unwrap();

    store.set_online(true);
    let mut edited = Trip { id, ..taupo() };
    edited.notes = Some("newer".to_string());
    service.update_trip(&edited).await.unwrap();
    service.drain_sync_queue().await.unwrap();

    let documents = store.documents(Collection::Trips);
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].data["notes"], "newer");
    assert!(service.pending_operations().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn signed_out_records_stay_with_their_account() {
    let (service, store) = service().await;
    service.initialize(Some("alice")).await.unwrap();
    service.create_trip(taupo()).await.unwrap();
    service.sign_out().await;

    service.initialize(None).await.unwrap();
    assert!(service.get_all_trips().await.unwrap().is_empty());
    assert!(!service.has_local_data().await.unwrap());

    let report = service.switch_to_user("bob").await.unwrap().unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(store.count(Collection::Trips), 1);
    assert!(service.get_all_trips().await.unwrap().is_empty());

    service.sign_out().await;
    service.set_online(false).await.unwrap();
    service.initialize(Some("alice")).await.unwrap();
    assert_eq!(service.get_all_trips().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn deferred_merge_runs_when_back_online() {
    let (service, store) = service().await;
    service.initialize(None).await.unwrap();
    service.create_trip(taupo()).await.unwrap();
    service.set_online(false).await.unwrap();

    assert_eq!(service.switch_to_user("user-1").await.unwrap(), None);
    assert!(service.has_deferred_merge().await.unwrap());
    assert_eq!(store.count(Collection::Trips), 0);

    service.set_online(true).await.unwrap();
    assert_eq!(store.count(Collection::Trips), 1);
    assert!(service.has_completed_migration().await.unwrap());
    assert!(!service.has_deferred_merge().await.unwrap());

    service.set_online(false).await.unwrap();
    assert_eq!(service.get_all_trips().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn deferred_merge_survives_restart() {
    let local = LocalStore::open_in_memory().await.unwrap();
    let store = MemoryDocumentStore::new();

    let first = SyncService::new(local.clone(), store.clone(), SyncConfig::default());
    first.initialize(None).await.unwrap();
    first.create_trip(taupo()).await.unwrap();
    first.set_online(false).await.unwrap();
    assert_eq!(first.switch_to_user("user-1").await.unwrap(), None);
    drop(first);

    let restarted = SyncService::new(local, store.clone(), SyncConfig::default());
    restarted.initialize(Some("user-1")).await.unwrap();
    assert_eq!(store.count(Collection::Trips), 1);
    assert!(restarted.has_completed_migration().await.unwrap());
    assert_eq!(restarted.merge_runs(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_outage_keeps_writes_local() {
    let (service, store) = service().await;
    service.initialize(Some("user-1")).await.unwrap();
    store.set_online(false);

    let id = service.create_trip(taupo()).await.unwrap();
    assert_eq!(service.get_all_trips().await.unwrap().len(), 1);
    assert_eq!(service.get_trip_by_id(id).await.unwrap().unwrap().id, id);
    assert_eq!(service.pending_operations().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn users_do_not_share_queues_or_mappings() {
    let (service, _store) = service().await;
    service.set_online(false).await.unwrap();
    service.initialize(Some("alice")).await.unwrap();
    service.create_trip(taupo()).await.unwrap();
    assert_eq!(service.pending_operations().await.unwrap().len(), 1);

    service.sign_out().await;
    assert!(!service.is_ready().await);
    service.initialize(Some("bob")).await.unwrap();
    assert!(service.pending_operations().await.unwrap().is_empty());
    assert!(service.id_mappings().await.unwrap().is_empty());

    service.initialize(Some("alice")).await.unwrap();
    assert_eq!(service.pending_operations().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn clear_sync_queue_drops_pending_writes() {
    let (service, _store) = service().await;
    service.initialize(Some("user-1")).await.unwrap();
    service.set_online(false).await.unwrap();
    service.create_trip(taupo()).await.unwrap();
    service.create_trip(taupo()).await.unwrap();

    assert_eq!(service.clear_sync_queue().await.unwrap(), 2);
    assert!(service.pending_operations().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_import_does_not_duplicate() {
    let (service, store) = service().await;
    service.initialize(Some("user-1")).await.unwrap();

    let mut log = WeatherLog::new(11, "Morning", "Clear", "Calm", "N");
    log.id = "11-1".to_string();
    let mut stray = FishCaught::new(999, "Perch");
    stray.id = "stray".to_string();
    let batch = ImportBatch {
        trips: vec![
            Trip { id: 11, ..taupo() },
            Trip {
                id: 12,
                ..trip_on("2024-02-01", "Lake Rotoiti")
            },
        ],
        weather_logs: vec![log],
        fish_caught: vec![stray],
    };

    let first = service
        .import_batch(batch.clone(), ImportStrategy::Merge)
        .await
        .unwrap();
    let second = service
        .import_batch(batch, ImportStrategy::Merge)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first.trips, 2);
    assert_eq!(first.weather_logs, 1);
    assert_eq!(first.skipped_orphans, 1);

    assert_eq!(store.count(Collection::Trips), 2);
    assert_eq!(store.count(Collection::WeatherLogs), 1);
    assert_eq!(store.count(Collection::FishCaught), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn wipe_import_replaces_guest_records() {
    let (service, _store) = service().await;
    service.initialize(None).await.unwrap();
    let old = service.create_trip(taupo()).await.unwrap();
    service
        .create_weather_log(WeatherLog::new(old, "Morning", "Clear", "Calm", "N"))
        .await
        .unwrap();

    let batch = ImportBatch {
        trips: vec![Trip {
            id: 5,
            ..trip_on("2024-03-03", "Lake Rotoiti")
        }],
        ..ImportBatch::default()
    };
    let report = service
        .import_batch(batch, ImportStrategy::Wipe)
        .await
        .unwrap();
    assert_eq!(report.wiped, 1);

    let trips = service.get_all_trips().await.unwrap();
    assert_eq!(trips.len(), 1);
    assert_eq!(trips[0].id, 5);
    assert!(service.get_all_weather_logs().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn upsert_from_import_is_idempotent() {
    let (service, store) = service().await;
    service.initialize(Some("user-1")).await.unwrap();
    let trip = Trip { id: 21, ..taupo() };

    assert_eq!(service.upsert_trip_from_import(trip.clone()).await.unwrap(), 21);
    assert_eq!(service.upsert_trip_from_import(trip).await.unwrap(), 21);
    assert_eq!(store.count(Collection::Trips), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_import_writes_nothing() {
    let (service, _store) = service().await;
    service.initialize(None).await.unwrap();
    let batch = ImportBatch {
        trips: vec![Trip { id: 1, ..taupo() }, Trip::new("", "Lake", "Bay")],
        ..ImportBatch::default()
    };

    let result = service.import_batch(batch, ImportStrategy::Merge).await;
    assert!(matches!(result, Err(Error::Validation(_))));
    assert!(!service.has_local_data().await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn operations_before_initialize_fail() {
    let (service, _store) = service().await;
    assert!(!service.is_ready().await);
    assert!(matches!(
        service.create_trip(taupo()).await,
        Err(Error::NotInitialized)
    ));
    assert!(matches!(
        service.get_all_trips().await,
        Err(Error::NotInitialized)
    ));
    assert!(matches!(
        service.switch_to_user("user-1").await,
        Err(Error::NotInitialized)
    ));
    assert!(matches!(
        service.merge_local_data_for_user().await,
        Err(Error::NotInitialized)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_records_fail_before_any_io() {
    let (service, store) = service().await;
    service.initialize(Some("user-1")).await.unwrap();

    let mut trip = taupo();
    trip.date = "2024-13-40".to_string();
    assert!(matches!(
        service.create_trip(trip).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        service.create_trip(taupo().with_hours(-1.0)).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        service.get_trips_by_date("yesterday").await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        service.update_trip(&taupo()).await,
        Err(Error::Validation(_))
    ));
    assert_eq!(store.add_count(), 0);
    assert!(service.pending_operations().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn switching_requires_guest_mode() {
    let (service, _store) = service().await;
    service.initialize(Some("alice")).await.unwrap();

    assert!(matches!(
        service.switch_to_user("bob").await,
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        service.switch_to_user("  ").await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn trips_by_date_filters_remote_results() {
    let (service, _store) = service().await;
    service.initialize(Some("user-1")).await.unwrap();
    service.create_trip(taupo()).await.unwrap();
    service
        .create_trip(trip_on("2024-02-01", "Lake Rotoiti"))
        .await
        .unwrap();

    let trips = service.get_trips_by_date("2024-02-01").await.unwrap();
    assert_eq!(trips.len(), 1);
    assert_eq!(trips[0].water, "Lake Rotoiti");
}

#[tokio::test(flavor = "multi_thread")]
async fn orphan_audit_respects_safety_cap() {
    let config = SyncConfig {
        orphan_safety_cap: 2,
        ..SyncConfig::default()
    };
    let (service, store) = service_with(config).await;
    service.initialize(Some("user-1")).await.unwrap();
    let trip_id = service.create_trip(taupo()).await.unwrap();
    service
        .create_fish_caught(FishCaught::new(trip_id, "Brown trout"))
        .await
        .unwrap();

    let insert_orphan = |index: usize| {
        let mut fish = FishCaught::new(404, "Perch");
        fish.id = format!("orphan-{index}");
        store.insert_document(
            Collection::FishCaught,
            &format!("r-orphan-{index}"),
            entity_to_document(&fish, "user-1").unwrap(),
        );
    };

    insert_orphan(1);
    let report = service.audit_orphans(Collection::FishCaught).await.unwrap();
    assert_eq!(report.action, AuditAction::Deleted);
    assert_eq!(store.count(Collection::FishCaught), 1);

    insert_orphan(2);
    insert_orphan(3);
    let result = service.audit_orphans(Collection::FishCaught).await;
    assert!(matches!(
        result,
        Err(Error::OrphanData { count: 2, cap: 2, .. })
    ));
    assert_eq!(store.count(Collection::FishCaught), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn diagnostics_describe_session() {
    let (service, _store) = service().await;
    let idle = service.diagnostics().await.unwrap();
    assert_eq!(idle.mode, ServiceMode::Uninitialized);
    assert!(idle.id_mappings.is_empty());

    service.initialize(None).await.unwrap();
    service.create_trip(taupo()).await.unwrap();
    service.switch_to_user("user-1").await.unwrap();

    let diagnostics = service.diagnostics().await.unwrap();
    assert_eq!(
        diagnostics.mode,
        ServiceMode::UserReady {
            user_id: "user-1".to_string()
        }
    );
    assert!(diagnostics.online);
    assert!(diagnostics.migration_completed);
    assert_eq!(diagnostics.merge_runs, 1);
    assert_eq!(diagnostics.pending_operations, 0);
    assert_eq!(diagnostics.dead_letters, 0);
    assert_eq!(diagnostics.id_mappings.len(), 1);
    assert_eq!(diagnostics.status, SyncState::Synced);
}
