use std::env;
use std::path::PathBuf;

use catchlog_core::config::SyncConfig;
use catchlog_core::models::IdMapping;
use catchlog_core::remote::HttpDocumentStore;
use catchlog_core::services::LocalStore;
use catchlog_core::state::{ServiceMode, SyncState};
use catchlog_core::sync::{QueuedOperation, SyncDiagnostics};
use catchlog_core::{FishCaught, SyncService, Trip, WeatherLog};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CliError;

pub type Service = SyncService<HttpDocumentStore>;

/// Global options shared by every command
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub db_path: PathBuf,
    pub config_path: Option<PathBuf>,
    pub user: Option<String>,
    pub offline: bool,
}

impl SessionOptions {
    /// Same options without a signed-in user
    pub fn guest(&self) -> Self {
        Self {
            user: None,
            ..self.clone()
        }
    }
}

/// Open the local database and start the sync service for `options.user`.
pub async fn open_service(options: &SessionOptions) -> Result<Service, CliError> {
    if let Some(parent) = options.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let config = SyncConfig::load(options.config_path.as_deref())?;
    let remote = HttpDocumentStore::new(
        config.remote_url.clone(),
        config.api_key.clone(),
        config.remote_timeout(),
    )?;
    let local = LocalStore::open_path(options.db_path.clone()).await?;
    let service = SyncService::new(local, remote, config);
    tracing::debug!(
        db_path = %options.db_path.display(),
        user = ?options.user,
        offline = options.offline,
        "Opening sync service"
    );

    if options.offline {
        service.set_online(false).await?;
    }
    service.initialize(options.user.as_deref()).await?;
    Ok(service)
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("CATCHLOG_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("catchlog")
        .join("catchlog.db")
}

/// Print records as pretty JSON or as one line each
pub fn print_records<T: Serialize>(
    records: &[T],
    as_json: bool,
    render: impl Fn(&[T]) -> Vec<String>,
    empty_message: &str,
) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{empty_message}");
        return Ok(());
    }

    for line in render(records) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_trip_lines(trips: &[Trip]) -> Vec<String> {
    trips
        .iter()
        .map(|trip| {
            let water = text_preview(&trip.water, 24);
            let location = text_preview(&trip.location, 24);
            match trip.hours {
                Some(hours) => format!(
                    "{:<14}  {}  {water:<24}  {location:<24}  {hours:.1}h",
                    trip.id, trip.date
                ),
                None => format!("{:<14}  {}  {water:<24}  {location}", trip.id, trip.date),
            }
        })
        .collect()
}

pub fn format_weather_lines(logs: &[WeatherLog]) -> Vec<String> {
    logs.iter()
        .map(|log| {
            let mut line = format!(
                "{:<22}  trip={}  {:<8}  {}, wind {} {}",
                log.id, log.trip_id, log.time_of_day, log.sky, log.wind_condition, log.wind_direction
            );
            if !log.water_temp.trim().is_empty() {
                line.push_str(&format!("  water={}", log.water_temp.trim()));
            }
            if !log.air_temp.trim().is_empty() {
                line.push_str(&format!("  air={}", log.air_temp.trim()));
            }
            line
        })
        .collect()
}

pub fn format_catch_lines(catches: &[FishCaught]) -> Vec<String> {
    catches
        .iter()
        .map(|fish| {
            let mut line = format!("{:<36}  trip={}  {}", fish.id, fish.trip_id, fish.species);
            if let Some(length) = fish.length {
                line.push_str(&format!("  {length}cm"));
            }
            if let Some(weight) = fish.weight {
                line.push_str(&format!("  {weight}kg"));
            }
            if let Some(time) = fish.time.as_deref() {
                line.push_str(&format!("  at {time}"));
            }
            line
        })
        .collect()
}

pub fn format_queue_lines(operations: &[QueuedOperation]) -> Vec<String> {
    operations
        .iter()
        .map(|operation| {
            let mut line = format!(
                "{}  {:<6}  {}/{}  attempts={}",
                format_timestamp(&operation.enqueued_at),
                operation.op_type,
                operation.collection,
                operation.local_id,
                operation.attempts
            );
            if let Some(error) = operation.last_error.as_deref() {
                line.push_str(&format!("  last_error={}", text_preview(error, 80)));
            }
            line
        })
        .collect()
}

pub fn format_mapping_lines(mappings: &[IdMapping]) -> Vec<String> {
    mappings
        .iter()
        .map(|mapping| {
            format!(
                "{}/{} -> {}",
                mapping.collection, mapping.local_id, mapping.remote_id
            )
        })
        .collect()
}

pub fn format_status_lines(diagnostics: &SyncDiagnostics) -> Vec<String> {
    let mode = match &diagnostics.mode {
        ServiceMode::Uninitialized => "not initialized".to_string(),
        ServiceMode::GuestReady => "guest".to_string(),
        ServiceMode::Reconciling { user_id } => format!("reconciling for {user_id}"),
        ServiceMode::UserReady { user_id } => format!("signed in as {user_id}"),
    };
    let status = match diagnostics.status {
        SyncState::Offline => "offline",
        SyncState::Syncing => "syncing",
        SyncState::Synced => "synced",
        SyncState::Error => "error",
    };

    vec![
        format!("mode:                {mode}"),
        format!("status:              {status}"),
        format!("pending operations:  {}", diagnostics.pending_operations),
        format!("rejected operations: {}", diagnostics.dead_letters),
        format!("id mappings:         {}", diagnostics.id_mappings.len()),
        format!("merge runs:          {}", diagnostics.merge_runs),
        format!(
            "migration completed: {}",
            if diagnostics.migration_completed {
                "yes"
            } else {
                "no"
            }
        ),
    ]
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// First line of `text`, whitespace collapsed, cut to `max_chars`
pub fn text_preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}
