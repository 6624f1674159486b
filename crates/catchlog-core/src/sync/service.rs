//! Public sync service.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::Mutex;

use super::orphans::{AuditReport, OrphanAuditor};
use super::queue::{DrainReport, OfflineQueue, QueuedOperation};
use super::reconcile::{deferred_merge_key, migration_key, reconcile, remote_trip_ids, MergeReport};
use super::registry::IdMappingRegistry;
use super::remote_records::RemoteRecords;
use super::strategy::{
    ActiveStorage, AuthenticatedStorage, Connectivity, GuestStorage, StorageStrategy,
};
use crate::config::SyncConfig;
use crate::import::{ImportBatch, ImportReport, ImportStrategy};
use crate::models::{
    Collection, Entity, EntityFilter, FishCaught, IdMapping, LocalIdGenerator, Trip, WeatherLog,
    TRIP_DATE_FORMAT,
};
use crate::remote::{RemoteGateway, RemoteStore};
use crate::services::{LocalStore, Owner};
use crate::state::{ServiceMode, SyncState};
use crate::util::normalize_text_option;
use crate::{Error, Result};

struct ServiceState<R> {
    mode: ServiceMode,
    /// Bumped on every login, sign-out and identity change
    generation: u64,
    storage: Option<Arc<ActiveStorage<R>>>,
}

enum InitAction {
    AlreadyReady,
    SwitchFromGuest(String),
    Start,
}

enum SwitchAction {
    Merge(u64),
    AlreadySignedIn(u64),
}

/// Snapshot for troubleshooting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDiagnostics {
    pub mode: ServiceMode,
    pub generation: u64,
    pub online: bool,
    pub status: SyncState,
    pub pending_operations: usize,
    pub dead_letters: usize,
    pub merge_runs: usize,
    pub migration_completed: bool,
    pub id_mappings: Vec<IdMapping>,
}

/// Offline-first data service for trips, weather logs and catches.
///
/// Construct one per application and share it. Until [`initialize`] runs
/// every record operation fails with [`Error::NotInitialized`]. Guests read
/// and write the local store only; signed-in users go remote-first with
/// local fallback and an offline queue.
///
/// [`initialize`]: SyncService::initialize
pub struct SyncService<R> {
    local: LocalStore,
    remote: RemoteGateway<R>,
    config: SyncConfig,
    ids: LocalIdGenerator,
    connectivity: Connectivity,
    state: Mutex<ServiceState<R>>,
    merge_gate: Mutex<Option<(u64, MergeReport)>>,
    merge_runs: AtomicUsize,
    syncing: AtomicBool,
    last_sync_failed: AtomicBool,
}

impl<R: RemoteStore> SyncService<R> {
    pub fn new(local: LocalStore, remote: R, config: SyncConfig) -> Self {
        let remote = RemoteGateway::new(remote, config.remote_timeout());
        Self {
            local,
            remote,
            config,
            ids: LocalIdGenerator::new(),
            connectivity: Connectivity::new(true),
            state: Mutex::new(ServiceState {
                mode: ServiceMode::Uninitialized,
                generation: 0,
                storage: None,
            }),
            merge_gate: Mutex::new(None),
            merge_runs: AtomicUsize::new(0),
            syncing: AtomicBool::new(false),
            last_sync_failed: AtomicBool::new(false),
        }
    }

    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The underlying store. Record reads and writes through it see guest
    /// records; use [`LocalStore::scoped`] for an account's records.
    pub const fn local(&self) -> &LocalStore {
        &self.local
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start in guest mode (`None`) or as a signed-in user.
    ///
    /// Calling again with the same identity is a no-op. Passing a user while
    /// in guest mode signs in through [`switch_to_user`]; a different user
    /// replaces the current session.
    ///
    /// [`switch_to_user`]: SyncService::switch_to_user
    pub async fn initialize(&self, user_id: Option<&str>) -> Result<()> {
        let user_id = normalize_text_option(user_id.map(str::to_string));

        let mut state = self.state.lock().await;
        let action = match (&state.mode, user_id.as_deref()) {
            (ServiceMode::GuestReady, None) => InitAction::AlreadyReady,
            (
                ServiceMode::UserReady { user_id: current }
                | ServiceMode::Reconciling { user_id: current },
                Some(requested),
            ) if current == requested => InitAction::AlreadyReady,
            (ServiceMode::GuestReady, Some(requested)) => {
                InitAction::SwitchFromGuest(requested.to_string())
            }
            _ => InitAction::Start,
        };

        match action {
            InitAction::AlreadyReady => {
                tracing::debug!(mode = ?state.mode, "Sync service already initialized");
                return Ok(());
            }
            InitAction::SwitchFromGuest(requested) => {
                drop(state);
                self.switch_to_user(&requested).await?;
                return Ok(());
            }
            InitAction::Start => {}
        }

        if state.mode != ServiceMode::Uninitialized {
            tracing::info!(previous = ?state.mode, "Identity changed; restarting sync service");
        }
        state.generation += 1;
        let signed_in = user_id.is_some();
        match user_id {
            None => {
                state.mode = ServiceMode::GuestReady;
                state.storage = Some(Arc::new(ActiveStorage::Guest(GuestStorage::new(
                    self.guest_local(),
                ))));
            }
            Some(user_id) => {
                state.storage = Some(Arc::new(ActiveStorage::Authenticated(
                    self.authenticated_storage(&user_id),
                )));
                state.mode = ServiceMode::UserReady { user_id };
            }
        }
        tracing::info!(mode = ?state.mode, generation = state.generation, "Sync service ready");
        drop(state);

        if signed_in {
            self.drain_if_online().await;
        }
        Ok(())
    }

    pub async fn is_ready(&self) -> bool {
        self.state.lock().await.mode.is_ready()
    }

    pub async fn mode(&self) -> ServiceMode {
        self.state.lock().await.mode.clone()
    }

    /// Sign a guest in and merge their local records into the account.
    ///
    /// The merge runs at most once per login: concurrent or repeated calls
    /// for the same user wait for and share the first result. Returns `None`
    /// when the remote store could not be reached. The merge is then marked
    /// deferred and runs again when connectivity returns, on the next drain,
    /// or through [`merge_local_data_for_user`]. The mark survives restarts.
    ///
    /// [`merge_local_data_for_user`]: SyncService::merge_local_data_for_user
    pub async fn switch_to_user(&self, user_id: &str) -> Result<Option<MergeReport>> {
        let user_id = normalize_text_option(Some(user_id.to_string()))
            .ok_or_else(|| Error::Validation("user id is required".to_string()))?;

        let action = {
            let mut state = self.state.lock().await;
            let action = match &state.mode {
                ServiceMode::GuestReady => None,
                ServiceMode::Reconciling { user_id: current } if *current == user_id => {
                    Some(SwitchAction::Merge(state.generation))
                }
                ServiceMode::UserReady { user_id: current } if *current == user_id => {
                    Some(SwitchAction::AlreadySignedIn(state.generation))
                }
                ServiceMode::Uninitialized => return Err(Error::NotInitialized),
                ServiceMode::Reconciling { .. } | ServiceMode::UserReady { .. } => {
                    return Err(Error::InvalidState(
                        "switching users requires guest mode; sign out first".to_string(),
                    ));
                }
            };
            match action {
                Some(action) => action,
                None => {
                    state.generation += 1;
                    state.storage = Some(Arc::new(ActiveStorage::Authenticated(
                        self.authenticated_storage(&user_id),
                    )));
                    state.mode = ServiceMode::Reconciling {
                        user_id: user_id.clone(),
                    };
                    tracing::info!(
                        user_id = user_id.as_str(),
                        generation = state.generation,
                        "Signing in; reconciling guest data"
                    );
                    SwitchAction::Merge(state.generation)
                }
            }
        };

        let generation = match action {
            SwitchAction::AlreadySignedIn(generation) => {
                return Ok(self.cached_merge(generation).await);
            }
            SwitchAction::Merge(generation) => generation,
        };

        let result = self.merge_for_generation(generation, &user_id).await;

        {
            let mut state = self.state.lock().await;
            if state.generation == generation
                && matches!(state.mode, ServiceMode::Reconciling { .. })
            {
                state.mode = ServiceMode::UserReady {
                    user_id: user_id.clone(),
                };
                tracing::info!(user_id = user_id.as_str(), "Signed in");
            }
        }

        match result {
            Ok(report) => {
                self.drain_if_online().await;
                Ok(Some(report))
            }
            Err(error) if error.is_remote_failure() => {
                tracing::warn!(%error, "Merge deferred until the remote store is reachable");
                self.local
                    .kv_set(&deferred_merge_key(&user_id), &generation.to_string())
                    .await?;
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// Run, or join, the merge for the current login.
    pub async fn merge_local_data_for_user(&self) -> Result<MergeReport> {
        let (generation, user_id) = {
            let state = self.state.lock().await;
            match &state.mode {
                ServiceMode::Reconciling { user_id } | ServiceMode::UserReady { user_id } => {
                    (state.generation, user_id.clone())
                }
                ServiceMode::GuestReady => {
                    return Err(Error::InvalidState(
                        "no signed-in user to merge into".to_string(),
                    ));
                }
                ServiceMode::Uninitialized => return Err(Error::NotInitialized),
            }
        };
        self.merge_for_generation(generation, &user_id).await
    }

    /// Drop the session. Persisted queues and mappings stay with their user.
    pub async fn sign_out(&self) {
        let mut state = self.state.lock().await;
        state.generation += 1;
        state.mode = ServiceMode::Uninitialized;
        state.storage = None;
        tracing::info!(generation = state.generation, "Signed out");
    }

    pub async fn has_completed_migration(&self) -> Result<bool> {
        match self.current_user().await? {
            Some(user_id) => Ok(self.local.kv_get(&migration_key(&user_id)).await?.is_some()),
            None => Ok(false),
        }
    }

    /// Whether guest records exist that a sign-in would merge
    pub async fn has_local_data(&self) -> Result<bool> {
        self.storage().await?;
        self.guest_local().has_data().await
    }

    /// Whether the signed-in user's merge is still waiting for the remote store
    pub async fn has_deferred_merge(&self) -> Result<bool> {
        match self.current_user().await? {
            Some(user_id) => Ok(self
                .local
                .kv_get(&deferred_merge_key(&user_id))
                .await?
                .is_some()),
            None => Ok(false),
        }
    }

    // -----------------------------------------------------------------------
    // Connectivity and queue
    // -----------------------------------------------------------------------

    /// Record a connectivity change. Coming back online while signed in
    /// runs any deferred merge and then drains the offline queue.
    pub async fn set_online(&self, online: bool) -> Result<Option<DrainReport>> {
        let was_online = self.connectivity.set(online);
        if was_online == online {
            return Ok(None);
        }
        tracing::info!(online, "Connectivity changed");

        if online && self.current_authenticated().await.is_some() {
            self.resume_deferred_merge().await;
            return self.drain_sync_queue().await.map(Some);
        }
        Ok(None)
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Replay queued writes now
    pub async fn drain_sync_queue(&self) -> Result<DrainReport> {
        let storage = self.storage().await?;
        let Some(storage) = storage.authenticated() else {
            return Ok(DrainReport::default());
        };

        if !self.connectivity.is_online() {
            return Ok(DrainReport {
                remaining: storage.queue().len().await?,
                failure: Some("device is offline".to_string()),
                ..DrainReport::default()
            });
        }

        self.syncing.store(true, Ordering::Release);
        let result = storage.queue().drain(storage.remote()).await;
        self.syncing.store(false, Ordering::Release);

        let report = result?;
        self.last_sync_failed
            .store(report.failure.is_some(), Ordering::Release);
        if report.applied > 0 || report.dead_lettered > 0 || report.failure.is_some() {
            tracing::info!(
                applied = report.applied,
                dead_lettered = report.dead_lettered,
                remaining = report.remaining,
                "Offline queue drained"
            );
        }
        Ok(report)
    }

    pub async fn pending_operations(&self) -> Result<Vec<QueuedOperation>> {
        let storage = self.storage().await?;
        match storage.authenticated() {
            Some(storage) => storage.queue().pending().await,
            None => Ok(Vec::new()),
        }
    }

    /// Queued writes the remote store rejected permanently
    pub async fn dead_letter_operations(&self) -> Result<Vec<QueuedOperation>> {
        let storage = self.storage().await?;
        match storage.authenticated() {
            Some(storage) => storage.queue().dead_letters().await,
            None => Ok(Vec::new()),
        }
    }

    /// Discard every queued write for the current user
    pub async fn clear_sync_queue(&self) -> Result<usize> {
        let storage = self.storage().await?;
        let Some(storage) = storage.authenticated() else {
            return Ok(0);
        };
        let dropped = storage.queue().clear().await?;
        tracing::warn!(dropped, "Offline queue cleared");
        self.last_sync_failed.store(false, Ordering::Release);
        Ok(dropped)
    }

    pub async fn sync_status(&self) -> SyncState {
        if !self.connectivity.is_online() {
            SyncState::Offline
        } else if self.syncing.load(Ordering::Acquire) {
            SyncState::Syncing
        } else if self.last_sync_failed.load(Ordering::Acquire) {
            SyncState::Error
        } else {
            SyncState::Synced
        }
    }

    /// Audit one child collection against the user's remote trips.
    ///
    /// Fails with [`Error::OrphanData`] when the orphan count reaches the
    /// configured safety cap.
    pub async fn audit_orphans(&self, collection: Collection) -> Result<AuditReport> {
        let storage = self.storage().await?;
        let Some(storage) = storage.authenticated() else {
            return Err(Error::InvalidState(
                "orphan audits need a signed-in user".to_string(),
            ));
        };
        let auditor = OrphanAuditor::new(self.config.orphan_safety_cap);
        let valid = remote_trip_ids(storage.remote()).await?;
        auditor
            .audit(storage.remote(), collection, &valid)
            .await?
            .into_result(auditor.cap())
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Current id mappings of the signed-in user
    pub async fn id_mappings(&self) -> Result<Vec<IdMapping>> {
        let storage = self.storage().await?;
        match storage.authenticated() {
            Some(storage) => storage.remote().registry().list().await,
            None => Ok(Vec::new()),
        }
    }

    /// Number of merges that actually ran
    pub fn merge_runs(&self) -> usize {
        self.merge_runs.load(Ordering::Acquire)
    }

    pub async fn diagnostics(&self) -> Result<SyncDiagnostics> {
        let (mode, generation, storage) = {
            let state = self.state.lock().await;
            (state.mode.clone(), state.generation, state.storage.clone())
        };

        let (pending_operations, dead_letters, id_mappings) =
            match storage.as_deref().and_then(ActiveStorage::authenticated) {
                Some(storage) => (
                    storage.queue().len().await?,
                    storage.queue().dead_letters().await?.len(),
                    storage.remote().registry().list().await?,
                ),
                None => (0, 0, Vec::new()),
            };
        let migration_completed = match mode.user_id() {
            Some(user_id) => self.local.kv_get(&migration_key(user_id)).await?.is_some(),
            None => false,
        };

        Ok(SyncDiagnostics {
            status: self.sync_status().await,
            mode,
            generation,
            online: self.connectivity.is_online(),
            pending_operations,
            dead_letters,
            merge_runs: self.merge_runs(),
            migration_completed,
            id_mappings,
        })
    }

    // -----------------------------------------------------------------------
    // Trips
    // -----------------------------------------------------------------------

    /// Validate and store a trip; returns its local id
    pub async fn create_trip(&self, trip: Trip) -> Result<i64> {
        Ok(self.create_record(trip).await?.id)
    }

    pub async fn get_trip_by_id(&self, id: i64) -> Result<Option<Trip>> {
        self.get_record(&id.to_string()).await
    }

    pub async fn get_all_trips(&self) -> Result<Vec<Trip>> {
        self.list_records(&EntityFilter::All).await
    }

    pub async fn get_trips_by_date(&self, date: &str) -> Result<Vec<Trip>> {
        let date = date.trim();
        NaiveDate::parse_from_str(date, TRIP_DATE_FORMAT).map_err(|_| {
            Error::Validation(format!("date '{date}' is not a valid YYYY-MM-DD date"))
        })?;
        self.list_records(&EntityFilter::Date(date.to_string()))
            .await
    }

    pub async fn update_trip(&self, trip: &Trip) -> Result<()> {
        self.update_record(trip).await
    }

    /// Delete a trip with its weather logs and catches
    pub async fn delete_trip(&self, id: i64) -> Result<()> {
        self.delete_record::<Trip>(&id.to_string()).await
    }

    pub async fn upsert_trip_from_import(&self, trip: Trip) -> Result<i64> {
        Ok(self.import_record(trip).await?.id)
    }

    // -----------------------------------------------------------------------
    // Weather logs
    // -----------------------------------------------------------------------

    pub async fn create_weather_log(&self, log: WeatherLog) -> Result<String> {
        Ok(self.create_record(log).await?.id)
    }

    pub async fn get_weather_log_by_id(&self, id: &str) -> Result<Option<WeatherLog>> {
        self.get_record(id).await
    }

    pub async fn get_all_weather_logs(&self) -> Result<Vec<WeatherLog>> {
        self.list_records(&EntityFilter::All).await
    }

    pub async fn get_weather_logs_for_trip(&self, trip_id: i64) -> Result<Vec<WeatherLog>> {
        self.list_records(&EntityFilter::TripId(trip_id)).await
    }

    pub async fn update_weather_log(&self, log: &WeatherLog) -> Result<()> {
        self.update_record(log).await
    }

    pub async fn delete_weather_log(&self, id: &str) -> Result<()> {
        self.delete_record::<WeatherLog>(id).await
    }

    pub async fn upsert_weather_log_from_import(&self, log: WeatherLog) -> Result<String> {
        Ok(self.import_record(log).await?.id)
    }

    // -----------------------------------------------------------------------
    // Catches
    // -----------------------------------------------------------------------

    pub async fn create_fish_caught(&self, fish: FishCaught) -> Result<String> {
        Ok(self.create_record(fish).await?.id)
    }

    pub async fn get_fish_caught_by_id(&self, id: &str) -> Result<Option<FishCaught>> {
        self.get_record(id).await
    }

    pub async fn get_all_fish_caught(&self) -> Result<Vec<FishCaught>> {
        self.list_records(&EntityFilter::All).await
    }

    pub async fn get_fish_caught_for_trip(&self, trip_id: i64) -> Result<Vec<FishCaught>> {
        self.list_records(&EntityFilter::TripId(trip_id)).await
    }

    pub async fn update_fish_caught(&self, fish: &FishCaught) -> Result<()> {
        self.update_record(fish).await
    }

    pub async fn delete_fish_caught(&self, id: &str) -> Result<()> {
        self.delete_record::<FishCaught>(id).await
    }

    pub async fn upsert_fish_caught_from_import(&self, fish: FishCaught) -> Result<String> {
        Ok(self.import_record(fish).await?.id)
    }

    // -----------------------------------------------------------------------
    // Import
    // -----------------------------------------------------------------------

    /// Apply an import batch.
    ///
    /// The whole batch is validated before anything is written. Records are
    /// upserted by id, so importing the same batch twice leaves one copy.
    /// Children whose trip is neither in the batch nor stored are skipped.
    pub async fn import_batch(
        &self,
        batch: ImportBatch,
        strategy: ImportStrategy,
    ) -> Result<ImportReport> {
        let storage = self.storage().await?;
        batch.validate()?;

        let mut report = ImportReport::default();
        if strategy == ImportStrategy::Wipe {
            report.wiped = self.wipe(&storage).await?;
        }

        let mut known_trips = HashSet::with_capacity(batch.trips.len());
        for trip in batch.trips {
            let trip = self.import_into(&storage, trip).await?;
            known_trips.insert(trip.id);
            report.trips += 1;
        }
        for log in batch.weather_logs {
            if !self
                .parent_exists(&storage, log.trip_id, &mut known_trips)
                .await?
            {
                report.skipped_orphans += 1;
                continue;
            }
            self.import_into(&storage, log).await?;
            report.weather_logs += 1;
        }
        for fish in batch.fish_caught {
            if !self
                .parent_exists(&storage, fish.trip_id, &mut known_trips)
                .await?
            {
                report.skipped_orphans += 1;
                continue;
            }
            self.import_into(&storage, fish).await?;
            report.fish_caught += 1;
        }

        tracing::info!(
            ?strategy,
            trips = report.trips,
            weather_logs = report.weather_logs,
            fish_caught = report.fish_caught,
            skipped_orphans = report.skipped_orphans,
            "Import applied"
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Private
    // -----------------------------------------------------------------------

    fn guest_local(&self) -> LocalStore {
        self.local.scoped(&Owner::Guest)
    }

    fn account_local(&self, user_id: &str) -> LocalStore {
        self.local.scoped(&Owner::User(user_id.to_string()))
    }

    fn authenticated_storage(&self, user_id: &str) -> AuthenticatedStorage<R> {
        let account = self.account_local(user_id);
        AuthenticatedStorage::new(
            account.clone(),
            self.remote_records(user_id),
            OfflineQueue::new(account, user_id),
            self.connectivity.clone(),
        )
    }

    fn remote_records(&self, user_id: &str) -> RemoteRecords<R> {
        RemoteRecords::new(
            self.remote.clone(),
            IdMappingRegistry::new(self.account_local(user_id), user_id),
        )
    }

    async fn storage(&self) -> Result<Arc<ActiveStorage<R>>> {
        self.state
            .lock()
            .await
            .storage
            .clone()
            .ok_or(Error::NotInitialized)
    }

    async fn current_authenticated(&self) -> Option<AuthenticatedStorage<R>> {
        let state = self.state.lock().await;
        state
            .storage
            .as_deref()
            .and_then(ActiveStorage::authenticated)
            .cloned()
    }

    async fn current_user(&self) -> Result<Option<String>> {
        let state = self.state.lock().await;
        match &state.mode {
            ServiceMode::Uninitialized => Err(Error::NotInitialized),
            mode => Ok(mode.user_id().map(str::to_string)),
        }
    }

    async fn cached_merge(&self, generation: u64) -> Option<MergeReport> {
        self.merge_gate
            .lock()
            .await
            .as_ref()
            .filter(|(cached, _)| *cached == generation)
            .map(|(_, report)| report.clone())
    }

    /// Merge once per login generation. Callers queue on the gate; only
    /// successful merges are remembered so a failed one can be retried.
    async fn merge_for_generation(&self, generation: u64, user_id: &str) -> Result<MergeReport> {
        let mut gate = self.merge_gate.lock().await;
        if let Some((cached, report)) = gate.as_ref() {
            if *cached == generation {
                tracing::debug!(generation, "Merge already completed for this login");
                return Ok(report.clone());
            }
        }
        if !self.connectivity.is_online() {
            return Err(Error::RemoteUnavailable("device is offline".to_string()));
        }

        self.merge_runs.fetch_add(1, Ordering::AcqRel);
        self.syncing.store(true, Ordering::Release);
        let result = reconcile(
            &self.guest_local(),
            &self.account_local(user_id),
            &self.remote_records(user_id),
            OrphanAuditor::new(self.config.orphan_safety_cap),
        )
        .await;
        self.syncing.store(false, Ordering::Release);

        match result {
            Ok(report) => {
                self.last_sync_failed.store(false, Ordering::Release);
                *gate = Some((generation, report.clone()));
                Ok(report)
            }
            Err(error) => {
                self.last_sync_failed.store(true, Ordering::Release);
                Err(error)
            }
        }
    }

    async fn drain_if_online(&self) {
        if !self.connectivity.is_online() {
            return;
        }
        self.resume_deferred_merge().await;
        if let Err(error) = self.drain_sync_queue().await {
            tracing::warn!(%error, "Offline queue drain failed");
        }
    }

    /// Run a merge that an earlier sign-in could not finish. Failures are
    /// logged and leave the merge marked for the next attempt.
    async fn resume_deferred_merge(&self) {
        let (generation, user_id) = {
            let state = self.state.lock().await;
            match &state.mode {
                ServiceMode::UserReady { user_id } => (state.generation, user_id.clone()),
                _ => return,
            }
        };
        match self.local.kv_get(&deferred_merge_key(&user_id)).await {
            Ok(Some(_)) => {}
            Ok(None) => return,
            Err(error) => {
                tracing::warn!(%error, "Could not read deferred merge marker");
                return;
            }
        }

        tracing::info!(user_id = user_id.as_str(), "Resuming deferred merge");
        match self.merge_for_generation(generation, &user_id).await {
            Ok(report) => tracing::info!(
                created = report.created,
                updated = report.updated,
                "Deferred merge completed"
            ),
            Err(error) if error.is_remote_failure() => {
                tracing::warn!(%error, "Deferred merge still waiting for the remote store");
            }
            Err(error) => tracing::error!(%error, "Deferred merge failed"),
        }
    }

    async fn create_record<E: Entity>(&self, mut entity: E) -> Result<E> {
        let storage = self.storage().await?;
        entity.validate()?;
        entity.ensure_local_id(&self.ids);
        storage.create(&entity).await?;
        Ok(entity)
    }

    async fn get_record<E: Entity>(&self, local_id: &str) -> Result<Option<E>> {
        let storage = self.storage().await?;
        storage.get(local_id).await
    }

    async fn list_records<E: Entity>(&self, filter: &EntityFilter) -> Result<Vec<E>> {
        let storage = self.storage().await?;
        storage.list(filter).await
    }

    async fn update_record<E: Entity>(&self, entity: &E) -> Result<()> {
        let storage = self.storage().await?;
        entity.validate()?;
        if !entity.has_local_id() {
            return Err(Error::Validation(format!(
                "{} record needs an id to be updated",
                E::COLLECTION
            )));
        }
        storage.update(entity).await
    }

    async fn delete_record<E: Entity>(&self, local_id: &str) -> Result<()> {
        let storage = self.storage().await?;
        if local_id.trim().is_empty() {
            return Err(Error::Validation("id is required".to_string()));
        }
        storage.delete::<E>(local_id).await
    }

    async fn import_record<E: Entity>(&self, entity: E) -> Result<E> {
        let storage = self.storage().await?;
        entity.validate()?;
        self.import_into(&storage, entity).await
    }

    async fn import_into<E: Entity>(&self, storage: &ActiveStorage<R>, mut entity: E) -> Result<E> {
        entity.ensure_local_id(&self.ids);
        storage.upsert(&entity).await?;
        Ok(entity)
    }

    async fn parent_exists(
        &self,
        storage: &ActiveStorage<R>,
        trip_id: i64,
        known_trips: &mut HashSet<i64>,
    ) -> Result<bool> {
        if known_trips.contains(&trip_id) {
            return Ok(true);
        }
        if storage.get::<Trip>(&trip_id.to_string()).await?.is_some() {
            known_trips.insert(trip_id);
            return Ok(true);
        }
        tracing::warn!(trip_id, "Skipping imported record whose trip does not exist");
        Ok(false)
    }

    /// Delete every trip (with children) and any stray child record.
    async fn wipe(&self, storage: &ActiveStorage<R>) -> Result<usize> {
        let mut trip_ids: Vec<i64> = storage
            .list::<Trip>(&EntityFilter::All)
            .await?
            .iter()
            .map(|trip| trip.id)
            .collect();
        let local = storage.local();
        for trip in local.list::<Trip>(&EntityFilter::All).await? {
            if !trip_ids.contains(&trip.id) {
                trip_ids.push(trip.id);
            }
        }
        for trip_id in &trip_ids {
            storage.delete::<Trip>(&trip_id.to_string()).await?;
        }

        for log in storage.list::<WeatherLog>(&EntityFilter::All).await? {
            storage.delete::<WeatherLog>(&log.id).await?;
        }
        for fish in storage.list::<FishCaught>(&EntityFilter::All).await? {
            storage.delete::<FishCaught>(&fish.id).await?;
        }
        local.clear_all().await?;

        tracing::info!(trips = trip_ids.len(), "Existing records wiped before import");
        Ok(trip_ids.len())
    }
}
