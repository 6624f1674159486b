use std::path::Path;

use catchlog_core::import::{parse_import_batch, ImportReport};

use crate::cli::ImportMode;
use crate::commands::common::{open_service, SessionOptions};
use crate::error::CliError;

pub async fn run_import(
    path: &Path,
    mode: ImportMode,
    as_json: bool,
    options: &SessionOptions,
) -> Result<ImportReport, CliError> {
    let payload = std::fs::read_to_string(path)?;
    let batch = parse_import_batch(&payload)?;

    let service = open_service(options).await?;
    let report = service.import_batch(batch, mode.into()).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", format_import_summary(&report));
    }
    Ok(report)
}

pub fn format_import_summary(report: &ImportReport) -> String {
    let mut summary = format!(
        "Imported {} trips, {} weather logs, {} catches",
        report.trips, report.weather_logs, report.fish_caught
    );
    if report.wiped > 0 {
        summary.push_str(&format!(" (replaced {} trips)", report.wiped));
    }
    if report.skipped_orphans > 0 {
        summary.push_str(&format!(
            "; skipped {} records without a trip",
            report.skipped_orphans
        ));
    }
    summary
}
