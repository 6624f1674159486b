//! Catchlog CLI - Command-line front end for the trip journal
//!
//! Records trips, weather and catches locally, and syncs them to the
//! signed-in user's account when the remote store is reachable.

mod cli;
mod commands;
mod config_file;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::catch::run_catch;
use crate::commands::common::{resolve_db_path, SessionOptions};
use crate::commands::completions::run_completions;
use crate::commands::import::run_import;
use crate::commands::session::{run_login, run_logout};
use crate::commands::sync::run_sync;
use crate::commands::trip::run_trip;
use crate::commands::weather::run_weather;
use crate::config_file::{default_config_path, CliConfig};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("catchlog=info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = default_config_path();
    let cli_config = CliConfig::load_from_path(&config_path).map_err(CliError::Config)?;
    let options = SessionOptions {
        db_path: resolve_db_path(cli.db_path),
        config_path: cli.config.or_else(|| cli_config.sync_config_path.clone()),
        user: cli_config.resolve_user(cli.user.as_deref()),
        offline: cli.offline,
    };

    match cli.command {
        Commands::Trip { command } => run_trip(command, &options).await?,
        Commands::Weather { command } => run_weather(command, &options).await?,
        Commands::Catch { command } => run_catch(command, &options).await?,
        Commands::Import {
            path,
            strategy,
            json,
        } => {
            run_import(&path, strategy, json, &options).await?;
        }
        Commands::Login { user } => {
            run_login(&user, &options, &config_path).await?;
        }
        Commands::Logout => run_logout(&config_path)?,
        Commands::Sync { command } => run_sync(command, &options).await?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
