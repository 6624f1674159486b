use std::path::Path;

use catchlog_core::sync::MergeReport;

use crate::commands::common::{open_service, SessionOptions};
use crate::config_file::CliConfig;
use crate::error::CliError;

/// Sign in as `user`, merging guest records, and remember the session.
pub async fn run_login(
    user: &str,
    options: &SessionOptions,
    config_path: &Path,
) -> Result<Option<MergeReport>, CliError> {
    let service = open_service(&options.guest()).await?;
    let report = service.switch_to_user(user).await?;

    let mut config = CliConfig::load_from_path(config_path).map_err(CliError::Config)?;
    config.active_user = Some(user.trim().to_string());
    config.save_to_path(config_path).map_err(CliError::Config)?;

    match &report {
        Some(report) => println!(
            "Signed in as {}; merged {} new and {} existing records",
            user.trim(),
            report.created,
            report.updated
        ),
        None => println!(
            "Signed in as {}; merge deferred until the remote store is reachable (run `catchlog sync merge`)",
            user.trim()
        ),
    }
    Ok(report)
}

pub fn run_logout(config_path: &Path) -> Result<(), CliError> {
    let mut config = CliConfig::load_from_path(config_path).map_err(CliError::Config)?;
    let Some(user) = config.active_user.take() else {
        println!("Not signed in.");
        return Ok(());
    };
    config.save_to_path(config_path).map_err(CliError::Config)?;
    println!("Signed out {user}");
    Ok(())
}
