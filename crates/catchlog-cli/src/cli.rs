use std::path::PathBuf;

use catchlog_core::import::ImportStrategy;
use catchlog_core::Collection;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "catchlog")]
#[command(about = "Offline-first fishing trip journal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Act as this signed-in user instead of the stored session
    #[arg(long, global = true, value_name = "ID")]
    pub user: Option<String>,

    /// Treat the device as offline; signed-in writes are queued
    #[arg(long, global = true)]
    pub offline: bool,

    /// Optional sync config JSON file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record and browse trips
    Trip {
        #[command(subcommand)]
        command: TripCommands,
    },
    /// Record weather observations for a trip
    Weather {
        #[command(subcommand)]
        command: WeatherCommands,
    },
    /// Record fish caught on a trip
    Catch {
        #[command(subcommand)]
        command: CatchCommands,
    },
    /// Import records from a JSON archive
    Import {
        /// Archive path
        path: PathBuf,
        /// Replace existing records or merge into them
        #[arg(long, value_enum, default_value_t = ImportMode::Merge)]
        strategy: ImportMode,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sign in and merge guest records into the account
    Login {
        /// Account user id
        user: String,
    },
    /// Forget the stored signed-in user
    Logout,
    /// Replay queued writes, or inspect sync state
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum TripCommands {
    /// Create a trip
    #[command(alias = "new")]
    Add {
        /// Trip date, YYYY-MM-DD
        date: String,
        /// Lake or river fished
        water: String,
        /// Spot on the water
        location: String,
        /// Hours fished
        #[arg(long)]
        hours: Option<f64>,
        #[arg(long)]
        companions: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List trips
    List {
        /// Only trips on this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one trip with its weather logs and catches
    Show {
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change fields of an existing trip
    Edit {
        id: i64,
        #[command(flatten)]
        changes: TripChanges,
    },
    /// Delete a trip with its weather logs and catches
    Delete { id: i64 },
}

#[derive(Args, Debug, Default, Clone, PartialEq)]
pub struct TripChanges {
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long)]
    pub water: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub hours: Option<f64>,
    #[arg(long)]
    pub companions: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Subcommand)]
pub enum WeatherCommands {
    /// Record an observation
    Add {
        trip_id: i64,
        /// Morning, Midday, Evening...
        time_of_day: String,
        sky: String,
        wind_condition: String,
        wind_direction: String,
        /// Water temperature in degrees
        #[arg(long, default_value = "")]
        water_temp: String,
        /// Air temperature in degrees
        #[arg(long, default_value = "")]
        air_temp: String,
    },
    /// List observations
    List {
        /// Only observations for this trip
        #[arg(long, value_name = "TRIP_ID")]
        trip: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an observation
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum CatchCommands {
    /// Record a catch
    Add {
        trip_id: i64,
        species: String,
        /// Length in centimetres
        #[arg(long)]
        length: Option<f64>,
        /// Weight in kilograms
        #[arg(long)]
        weight: Option<f64>,
        /// Time of catch, HH:MM
        #[arg(long)]
        time: Option<String>,
        /// Gear used (repeatable)
        #[arg(long)]
        gear: Vec<String>,
        #[arg(long)]
        details: Option<String>,
    },
    /// List catches
    List {
        /// Only catches for this trip
        #[arg(long, value_name = "TRIP_ID")]
        trip: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a catch
    Delete { id: String },
}

#[derive(Subcommand, Clone, Copy)]
pub enum SyncCommands {
    /// Replay queued writes now (default)
    Drain,
    /// Show sync mode, connectivity and queue state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List queued writes
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List queued writes the remote store rejected
    DeadLetters {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Discard every queued and rejected write
    ClearQueue,
    /// List local-to-remote id mappings
    Mappings {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Merge local records into the signed-in account
    Merge {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Prune remote child records whose trip no longer exists
    Audit {
        #[arg(value_enum)]
        collection: ChildCollection,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ImportMode {
    Wipe,
    Merge,
}

impl From<ImportMode> for ImportStrategy {
    fn from(mode: ImportMode) -> Self {
        match mode {
            ImportMode::Wipe => Self::Wipe,
            ImportMode::Merge => Self::Merge,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ChildCollection {
    WeatherLogs,
    FishCaught,
}

impl From<ChildCollection> for Collection {
    fn from(collection: ChildCollection) -> Self {
        match collection {
            ChildCollection::WeatherLogs => Self::WeatherLogs,
            ChildCollection::FishCaught => Self::FishCaught,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
