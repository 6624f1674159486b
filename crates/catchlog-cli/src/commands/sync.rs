use catchlog_core::sync::{AuditReport, DrainReport, MergeReport};

use crate::cli::SyncCommands;
use crate::commands::common::{
    format_mapping_lines, format_queue_lines, format_status_lines, open_service, print_records,
    SessionOptions,
};
use crate::error::CliError;

pub async fn run_sync(
    command: Option<SyncCommands>,
    options: &SessionOptions,
) -> Result<(), CliError> {
    let service = open_service(options).await?;

    match command.unwrap_or(SyncCommands::Drain) {
        SyncCommands::Drain => {
            let report = service.drain_sync_queue().await?;
            println!("{}", format_drain_summary(&report));
        }
        SyncCommands::Status { json } => {
            let diagnostics = service.diagnostics().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&diagnostics)?);
            } else {
                for line in format_status_lines(&diagnostics) {
                    println!("{line}");
                }
            }
        }
        SyncCommands::Queue { json } => {
            let operations = service.pending_operations().await?;
            print_records(&operations, json, format_queue_lines, "Sync queue is empty.")?;
        }
        SyncCommands::DeadLetters { json } => {
            let operations = service.dead_letter_operations().await?;
            print_records(&operations, json, format_queue_lines, "No rejected operations.")?;
        }
        SyncCommands::ClearQueue => {
            let dropped = service.clear_sync_queue().await?;
            println!("Dropped {dropped} queued operations");
        }
        SyncCommands::Mappings { json } => {
            let mappings = service.id_mappings().await?;
            print_records(&mappings, json, format_mapping_lines, "No id mappings.")?;
        }
        SyncCommands::Merge { json } => {
            let report = service.merge_local_data_for_user().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", format_merge_summary(&report));
            }
        }
        SyncCommands::Audit { collection, json } => {
            let report = service.audit_orphans(collection.into()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", format_audit_summary(&report));
            }
        }
    }

    Ok(())
}

pub fn format_drain_summary(report: &DrainReport) -> String {
    let mut summary = format!(
        "Applied {} queued operations; {} remaining",
        report.applied, report.remaining
    );
    if report.dead_lettered > 0 {
        summary.push_str(&format!("; {} rejected", report.dead_lettered));
    }
    match report.failure.as_deref() {
        Some(failure) => format!("{summary} (stopped: {failure})"),
        None => summary,
    }
}

pub fn format_merge_summary(report: &MergeReport) -> String {
    let mut summary = format!(
        "Merged {} new and {} existing records",
        report.created, report.updated
    );
    if report.orphans_skipped > 0 {
        summary.push_str(&format!(
            "; skipped {} records without a trip",
            report.orphans_skipped
        ));
    }
    summary
}

pub fn format_audit_summary(report: &AuditReport) -> String {
    format!(
        "{}: scanned {}, orphans {}, deleted {}",
        report.collection, report.scanned, report.orphans, report.deleted
    )
}
