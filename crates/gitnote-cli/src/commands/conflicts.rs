use gitnote_core::models::Folder;
use gitnote_core::{ConflictDecision, ConflictSet, Resolution, SyncService};

use crate::cli::Side;
use crate::commands::common::require_login;
use crate::error::CliError;

pub fn run_conflicts(service: &SyncService, as_json: bool) -> Result<(), CliError> {
    let conflicts = service.get_config_conflicts();
    if as_json {
        println!("{}", serde_json::to_string_pretty(&conflicts)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No configuration conflicts.");
        return Ok(());
    }
    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_resolve(
    service: &SyncService,
    all: Option<Side>,
    picks: &[String],
) -> Result<(), CliError> {
    require_login(service)?;
    let conflicts = service.get_config_conflicts();
    if conflicts.is_empty() {
        println!("No configuration conflicts.");
        return Ok(());
    }

    let decisions = build_decisions(&conflicts, all, picks)?;
    let result = service.resolve_config_conflicts(&decisions).await;
    if !result.success {
        return Err(CliError::SyncFailed(result.message));
    }
    println!("{}", result.message);
    Ok(())
}

/// One decision per conflict for `--all`, or the parsed `--pick` values
pub fn build_decisions(
    conflicts: &ConflictSet,
    all: Option<Side>,
    picks: &[String],
) -> Result<Vec<ConflictDecision>, CliError> {
    if let Some(side) = all {
        let resolution = Resolution::from(side);
        return Ok(conflicts
            .keys()
            .into_iter()
            .map(|(kind, key)| ConflictDecision::new(kind, key, resolution))
            .collect());
    }
    if picks.is_empty() {
        return Err(CliError::MissingDecisions);
    }
    picks
        .iter()
        .map(|pick| pick.parse().map_err(CliError::InvalidDecision))
        .collect()
}

pub fn format_conflict_lines(conflicts: &ConflictSet) -> Vec<String> {
    let mut lines = Vec::with_capacity(conflicts.len());
    for conflict in &conflicts.notebooks {
        lines.push(format!(
            "notebook:{}  local \"{}\" ({})  remote \"{}\" ({})",
            conflict.id,
            conflict.local.name,
            conflict.local.updated_at,
            conflict.remote.name,
            conflict.remote.updated_at
        ));
    }
    for conflict in &conflicts.folders {
        lines.push(format!(
            "folder:{}  local {}  remote {}",
            conflict.id,
            describe_folder(&conflict.local),
            describe_folder(&conflict.remote)
        ));
    }
    for conflict in &conflicts.tags {
        lines.push(format!(
            "tag:{}  local \"{}\"  remote \"{}\"",
            conflict.id, conflict.local.name, conflict.remote.name
        ));
    }
    for conflict in &conflicts.settings {
        lines.push(format!(
            "setting:{}  local {}  remote {}",
            conflict.key, conflict.local, conflict.remote
        ));
    }
    lines
}

fn describe_folder(folder: &Folder) -> String {
    format!(
        "\"{}\" parent={} order={} ({})",
        folder.name,
        folder.parent_id.as_deref().unwrap_or("-"),
        folder.sort_order,
        folder.updated_at
    )
}
