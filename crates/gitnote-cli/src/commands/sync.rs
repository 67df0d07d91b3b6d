use gitnote_core::models::SyncHistoryEntry;
use gitnote_core::SyncService;

use crate::commands::common::{format_timestamp, require_login};
use crate::error::CliError;

pub async fn run_sync(service: &SyncService) -> Result<(), CliError> {
    require_login(service)?;
    let result = service.sync_all().await;
    if !result.success {
        hint_conflicts(service);
        return Err(CliError::SyncFailed(result.message));
    }
    println!("{}", result.message);
    Ok(())
}

pub async fn run_pull(service: &SyncService) -> Result<(), CliError> {
    require_login(service)?;
    let result = service.pull_from_github().await;
    if !result.success {
        hint_conflicts(service);
        return Err(CliError::SyncFailed(result.message));
    }
    println!("{}", result.message);
    Ok(())
}

fn hint_conflicts(service: &SyncService) {
    if !service.get_config_conflicts().is_empty() {
        eprintln!("Run `gitnote conflicts` to review, then `gitnote resolve`.");
    }
}

pub fn run_history(service: &SyncService, limit: usize, as_json: bool) -> Result<(), CliError> {
    let entries = service.sync_history(limit)?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No syncs recorded.");
        return Ok(());
    }
    for line in format_history_lines(&entries) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_history_lines(entries: &[SyncHistoryEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            format!(
                "{}  {:<7} {:<7} files={} {}",
                format_timestamp(&entry.synced_at),
                entry.sync_type,
                entry.status,
                entry.files_count,
                entry.message
            )
        })
        .collect()
}
