use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gitnote_core::{
    GitHubProvider, JsonSettingsStore, RemoteProvider, SqliteLocalStore, SyncConfig, SyncService,
};

use crate::error::CliError;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_db_path.or_else(|| env::var_os("GITNOTE_DB_PATH").map(PathBuf::from)) {
        Some(path) => Ok(path),
        None => default_db_path(),
    }
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("gitnote").join("gitnote.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub fn resolve_settings_path(cli_settings_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_settings_path.or_else(|| env::var_os("GITNOTE_SETTINGS_PATH").map(PathBuf::from)) {
        Some(path) => Ok(path),
        None => default_settings_path(),
    }
}

pub fn default_settings_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("gitnote").join("settings.json"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI config directory".to_string()))
}

/// Where the local database and settings file live
pub struct StorePaths {
    pub db_path: PathBuf,
    pub settings_path: PathBuf,
}

impl StorePaths {
    pub fn resolve(
        db_path: Option<PathBuf>,
        settings_path: Option<PathBuf>,
    ) -> Result<Self, CliError> {
        Ok(Self {
            db_path: resolve_db_path(db_path)?,
            settings_path: resolve_settings_path(settings_path)?,
        })
    }
}

/// Service talking to GitHub, configured from the environment
pub fn open_service(paths: &StorePaths) -> Result<SyncService, CliError> {
    let config = SyncConfig::from_env()?;
    let provider = GitHubProvider::new(&config)?;
    open_service_with(paths, Arc::new(provider), config)
}

pub fn open_service_with(
    paths: &StorePaths,
    provider: Arc<dyn RemoteProvider>,
    config: SyncConfig,
) -> Result<SyncService, CliError> {
    tracing::debug!(
        "Opening store at {} with settings {}",
        paths.db_path.display(),
        paths.settings_path.display()
    );
    let local = SqliteLocalStore::open(&paths.db_path)?;
    let settings = JsonSettingsStore::open(&paths.settings_path);
    Ok(SyncService::new(
        Arc::new(local),
        Arc::new(settings),
        provider,
        config,
    ))
}

pub fn require_login(service: &SyncService) -> Result<(), CliError> {
    if service.is_logged_in() {
        Ok(())
    } else {
        Err(CliError::NotLoggedIn)
    }
}

/// `2024-01-01 12:00:00 UTC`, or the raw value when it is not RFC 3339
pub fn format_timestamp(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp).map_or_else(
        |_| timestamp.to_string(),
        |date_time| {
            date_time
                .with_timezone(&Utc)
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string()
        },
    )
}
