use gitnote_core::sync::SyncStatusInfo;
use gitnote_core::SyncService;

use crate::cli::AutoCommands;
use crate::commands::common::{format_timestamp, require_login};
use crate::error::CliError;

pub fn run_auto(service: &SyncService, command: AutoCommands) -> Result<(), CliError> {
    match command {
        AutoCommands::Start => {
            require_login(service)?;
            service.start_auto_sync();
            let minutes = service.get_sync_status().sync_interval;
            println!("Auto sync enabled (every {minutes} minute(s))");
            println!("Run `gitnote watch` to keep syncing in the foreground.");
        }
        AutoCommands::Stop => {
            service.stop_auto_sync();
            println!("Auto sync disabled");
        }
        AutoCommands::Interval { minutes } => {
            service.set_sync_interval(minutes)?;
            println!("Auto sync interval set to {minutes} minute(s)");
        }
    }
    Ok(())
}

pub fn run_status(service: &SyncService, as_json: bool) -> Result<(), CliError> {
    let status = service.get_sync_status();
    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let account = match (service.get_user(), service.repo()) {
        (Some(user), Some((owner, repo))) => format!("{} -> {owner}/{repo}", user.login),
        _ if service.is_logged_in() => "logged in".to_string(),
        _ => "not logged in".to_string(),
    };
    println!("Account: {account}");
    for line in format_status_lines(&status) {
        println!("{line}");
    }
    let pending = service.get_config_conflicts().len();
    if pending > 0 {
        println!("Conflicts: {pending} waiting for `gitnote resolve`");
    }
    Ok(())
}

pub fn format_status_lines(status: &SyncStatusInfo) -> Vec<String> {
    let last_sync = status
        .last_sync
        .as_deref()
        .map_or_else(|| "never".to_string(), format_timestamp);
    let status_line = if status.message.is_empty() {
        format!("Status: {}", status.status.as_str())
    } else {
        format!("Status: {} ({})", status.status.as_str(), status.message)
    };
    let auto = if status.auto_sync_enabled {
        format!("on, every {} minute(s)", status.sync_interval)
    } else {
        "off".to_string()
    };
    vec![
        status_line,
        format!("Last sync: {last_sync}"),
        format!("Auto sync: {auto}"),
    ]
}

/// Run the scheduler until Ctrl-C
pub async fn run_watch(service: &SyncService) -> Result<(), CliError> {
    require_login(service)?;
    service.start_auto_sync();
    let minutes = service.get_sync_status().sync_interval;
    println!("Syncing every {minutes} minute(s). Press Ctrl-C to stop.");

    let result = service.sync_all().await;
    if result.success {
        println!("{}", result.message);
    } else {
        eprintln!("Sync failed: {}", result.message);
    }

    tokio::signal::ctrl_c().await?;
    service.shutdown();
    println!("Stopped");
    Ok(())
}
