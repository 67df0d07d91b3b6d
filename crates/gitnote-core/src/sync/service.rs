//! Sync service: credentials, scheduling and status around the merge engine
//!
//! At most one pass (push, pull or resolution) runs at a time. A push
//! requested while a pass is running is remembered and re-issued once, shortly
//! after the running pass finishes. Auto-sync runs a push on a fixed interval;
//! [`SyncService::mark_dirty`] arms a single debounced push.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::SyncConfig;
use crate::db::LocalStore;
use crate::error::{Error, Result};
use crate::models::{ConflictDecision, ConflictSet, SyncHistoryEntry, SyncKind};
use crate::remote::{RemoteCredentials, RemoteProvider, RemoteStore, RemoteUser};
use crate::settings::{keys, SettingsStore};
use crate::util::{normalize_text_option, now_iso};

use super::conflicts::{apply_resolutions, load_conflicts, store_conflicts, ResolutionOutcome};
use super::engine::{MergeEngine, PullOutcome, PushOutcome};

const NOT_LOGGED_IN: &str = "Not logged in to GitHub";
const ALREADY_SYNCING: &str = "Sync already in progress";

/// Longest auto-sync interval: one week
pub const MAX_SYNC_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<RemoteUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    pub message: String,
    pub synced_files: usize,
}

impl SyncResult {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            synced_files: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResult {
    pub success: bool,
    pub message: String,
    pub pulled_notes: usize,
    pub new_notes: usize,
    pub updated_notes: usize,
}

impl PullResult {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            pulled_notes: 0,
            new_notes: 0,
            updated_notes: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResult {
    pub success: bool,
    pub message: String,
    pub applied_remote: usize,
    pub kept_local: usize,
}

impl ResolveResult {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            applied_remote: 0,
            kept_local: 0,
        }
    }
}

/// Last recorded sync state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Success,
    Error,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "syncing" => Self::Syncing,
            "success" => Self::Success,
            "error" => Self::Error,
            _ => Self::Idle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusInfo {
    pub last_sync: Option<String>,
    pub status: SyncStatus,
    pub message: String,
    pub auto_sync_enabled: bool,
    /// Minutes between automatic syncs
    pub sync_interval: u64,
}

/// Owns all sync state; cheap to clone
///
/// Timer tasks hold only a weak handle, so dropping the last clone cancels them.
#[derive(Clone)]
pub struct SyncService {
    inner: Arc<Inner>,
}

struct Inner {
    local: Arc<dyn LocalStore>,
    settings: Arc<dyn SettingsStore>,
    provider: Arc<dyn RemoteProvider>,
    config: SyncConfig,
    remote: Mutex<Option<Arc<dyn RemoteStore>>>,
    is_syncing: AtomicBool,
    pending_rerun: AtomicBool,
    dirty_armed: AtomicBool,
    auto_sync_task: Mutex<Option<JoinHandle<()>>>,
    debounce_task: Mutex<Option<JoinHandle<()>>>,
    rerun_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for slot in [
            &self.auto_sync_task,
            &self.debounce_task,
            &self.rerun_task,
        ] {
            if let Ok(mut slot) = slot.lock() {
                if let Some(handle) = slot.take() {
                    handle.abort();
                }
            }
        }
    }
}

impl SyncService {
    pub fn new(
        local: Arc<dyn LocalStore>,
        settings: Arc<dyn SettingsStore>,
        provider: Arc<dyn RemoteProvider>,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                local,
                settings,
                provider,
                config,
                remote: Mutex::new(None),
                is_syncing: AtomicBool::new(false),
                pending_rerun: AtomicBool::new(false),
                dirty_armed: AtomicBool::new(false),
                auto_sync_task: Mutex::new(None),
                debounce_task: Mutex::new(None),
                rerun_task: Mutex::new(None),
            }),
        }
    }

    fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    fn upgrade(inner: &Weak<Inner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    /// Restore timers from persisted settings; call once after construction
    /// inside a Tokio runtime
    pub fn start(&self) {
        if self.is_logged_in() && self.auto_sync_enabled() {
            self.start_auto_sync();
        }
    }

    /// Cancel every timer without touching persisted settings
    pub fn shutdown(&self) {
        abort_task(&self.inner.auto_sync_task);
        abort_task(&self.inner.debounce_task);
        abort_task(&self.inner.rerun_task);
        self.inner.dirty_armed.store(false, Ordering::SeqCst);
        self.inner.pending_rerun.store(false, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Account
    // ------------------------------------------------------------------

    /// Validate a token, make sure the sync repository exists, then persist
    /// the credential; nothing is stored when any step fails
    pub async fn login(&self, token: &str) -> LoginResult {
        match self.try_login(token).await {
            Ok(user) => {
                tracing::info!("Logged in to GitHub as {}", user.login);
                LoginResult {
                    success: true,
                    user: Some(user),
                    error: None,
                }
            }
            Err(error) => {
                tracing::warn!("Login failed: {error}");
                LoginResult {
                    success: false,
                    user: None,
                    error: Some(error.to_string()),
                }
            }
        }
    }

    async fn try_login(&self, token: &str) -> Result<RemoteUser> {
        let token = normalize_text_option(Some(token.to_string()))
            .ok_or_else(|| Error::Auth("access token must not be empty".to_string()))?;
        let user = self.inner.provider.authenticate(&token).await?;

        let credentials = RemoteCredentials {
            token: token.clone(),
            owner: user.login.clone(),
            repo: self.inner.config.repo_name.clone(),
        };
        let remote = self.inner.provider.open(&credentials)?;
        remote.ensure_container_exists().await?;

        let settings = &self.inner.settings;
        settings.set(keys::ACCESS_TOKEN, Value::String(token))?;
        settings.set(keys::USER, serde_json::to_value(&user)?)?;
        settings.set(keys::OWNER, Value::String(credentials.owner))?;
        settings.set(keys::REPO, Value::String(credentials.repo))?;
        self.set_remote(Some(remote));
        Ok(user)
    }

    /// Stop auto-sync and forget the credential, account and last sync time
    pub fn logout(&self) {
        self.stop_auto_sync();
        abort_task(&self.inner.debounce_task);
        self.inner.dirty_armed.store(false, Ordering::SeqCst);
        self.set_remote(None);
        for key in [
            keys::ACCESS_TOKEN,
            keys::USER,
            keys::OWNER,
            keys::REPO,
            keys::LAST_SYNC,
        ] {
            if let Err(error) = self.inner.settings.delete(key) {
                tracing::warn!("Failed to clear {key}: {error}");
            }
        }
        tracing::info!("Logged out of GitHub");
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.inner.settings.get_string(keys::ACCESS_TOKEN).is_some()
    }

    #[must_use]
    pub fn get_user(&self) -> Option<RemoteUser> {
        let value = self.inner.settings.get(keys::USER)?;
        serde_json::from_value(value).ok()
    }

    /// Point sync at another repository
    pub fn set_repo(&self, owner: &str, repo: &str) -> Result<()> {
        let owner = normalize_text_option(Some(owner.to_string()))
            .ok_or_else(|| Error::InvalidInput("repository owner must not be empty".to_string()))?;
        let repo = normalize_text_option(Some(repo.to_string()))
            .ok_or_else(|| Error::InvalidInput("repository name must not be empty".to_string()))?;
        if repo.contains('/') || owner.contains('/') {
            return Err(Error::InvalidInput(
                "owner and repository must not contain '/'".to_string(),
            ));
        }

        self.inner.settings.set(keys::OWNER, Value::String(owner))?;
        self.inner.settings.set(keys::REPO, Value::String(repo))?;
        self.set_remote(None);
        Ok(())
    }

    /// `(owner, repo)` currently targeted
    #[must_use]
    pub fn repo(&self) -> Option<(String, String)> {
        let settings = &self.inner.settings;
        Some((
            settings.get_string(keys::OWNER)?,
            settings.get_string(keys::REPO)?,
        ))
    }

    fn set_remote(&self, remote: Option<Arc<dyn RemoteStore>>) {
        if let Ok(mut slot) = self.inner.remote.lock() {
            *slot = remote;
        }
    }

    /// The open remote store, opening it from persisted credentials on demand
    fn remote(&self) -> Result<Arc<dyn RemoteStore>> {
        let mut slot = self
            .inner
            .remote
            .lock()
            .map_err(|_| Error::Database("remote handle lock poisoned".to_string()))?;
        if let Some(remote) = slot.as_ref() {
            return Ok(Arc::clone(remote));
        }

        let settings = &self.inner.settings;
        let token = settings
            .get_string(keys::ACCESS_TOKEN)
            .ok_or_else(|| Error::Auth(NOT_LOGGED_IN.to_string()))?;
        let (owner, repo) = self.repo().ok_or(Error::NotInitialized)?;
        let remote = self
            .inner
            .provider
            .open(&RemoteCredentials { token, owner, repo })?;
        *slot = Some(Arc::clone(&remote));
        Ok(remote)
    }

    // ------------------------------------------------------------------
    // Sync passes
    // ------------------------------------------------------------------

    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.inner.is_syncing.load(Ordering::SeqCst)
    }

    /// Push local state to the remote, pulling first when it has a config
    ///
    /// While another pass is running this returns a failure immediately and
    /// schedules one follow-up push for after that pass. Pending config
    /// conflicts fail the result but note files are still published.
    pub async fn sync_all(&self) -> SyncResult {
        if !self.is_logged_in() {
            return SyncResult::failed(NOT_LOGGED_IN);
        }
        if self.inner.is_syncing.swap(true, Ordering::SeqCst) {
            self.inner.pending_rerun.store(true, Ordering::SeqCst);
            return SyncResult::failed(ALREADY_SYNCING);
        }

        self.set_status(SyncStatus::Syncing, "Syncing...");
        let result = match self.run_push().await {
            Ok(outcome) if outcome.conflicts > 0 => {
                let message = format!(
                    "Synced {} note files; {}",
                    outcome.synced_files,
                    Error::Conflict(outcome.conflicts)
                );
                tracing::warn!("{message}");
                self.set_status(SyncStatus::Error, &message);
                self.record(SyncKind::Push, false, &message, outcome.synced_files);
                SyncResult {
                    success: false,
                    message,
                    synced_files: outcome.synced_files,
                }
            }
            Ok(outcome) => {
                let message = format!("Synced {} files to GitHub", outcome.synced_files);
                self.persist(keys::LAST_SYNC, Value::String(now_iso()));
                self.set_status(SyncStatus::Success, &message);
                self.record(SyncKind::Push, true, &message, outcome.synced_files);
                SyncResult {
                    success: true,
                    message,
                    synced_files: outcome.synced_files,
                }
            }
            Err(error) => {
                let message = error.to_string();
                tracing::warn!("Sync failed: {message}");
                self.set_status(SyncStatus::Error, &message);
                self.record(SyncKind::Push, false, &message, 0);
                SyncResult::failed(message)
            }
        };

        self.finish_pass();
        result
    }

    async fn run_push(&self) -> Result<PushOutcome> {
        let remote = self.remote()?;
        let engine = MergeEngine::new(
            self.inner.local.as_ref(),
            self.inner.settings.as_ref(),
            remote.as_ref(),
        );
        engine.push().await
    }

    /// Merge remote state into the local store without writing to the remote
    pub async fn pull_from_github(&self) -> PullResult {
        if !self.is_logged_in() {
            return PullResult::failed(NOT_LOGGED_IN);
        }
        if self.inner.is_syncing.swap(true, Ordering::SeqCst) {
            return PullResult::failed(ALREADY_SYNCING);
        }

        let result = match self.run_pull().await {
            Ok(outcome) => {
                let pulled = outcome.new_notes + outcome.updated_notes;
                let message = format!(
                    "Pull complete: {} new, {} updated",
                    outcome.new_notes, outcome.updated_notes
                );
                self.record(SyncKind::Pull, true, &message, pulled);
                PullResult {
                    success: true,
                    message,
                    pulled_notes: pulled,
                    new_notes: outcome.new_notes,
                    updated_notes: outcome.updated_notes,
                }
            }
            Err(error) => {
                let message = error.to_string();
                tracing::warn!("Pull failed: {message}");
                self.record(SyncKind::Pull, false, &message, 0);
                PullResult::failed(message)
            }
        };

        self.finish_pass();
        result
    }

    async fn run_pull(&self) -> Result<PullOutcome> {
        let remote = self.remote()?;
        let engine = MergeEngine::new(
            self.inner.local.as_ref(),
            self.inner.settings.as_ref(),
            remote.as_ref(),
        );
        engine.pull().await
    }

    // ------------------------------------------------------------------
    // Conflicts
    // ------------------------------------------------------------------

    /// Conflicts recorded by the last blocked pull
    #[must_use]
    pub fn get_config_conflicts(&self) -> ConflictSet {
        load_conflicts(self.inner.settings.as_ref())
    }

    /// Apply decisions, merge the rest of the remote metadata and republish
    /// the config; conflicts are cleared once the config is published
    pub async fn resolve_config_conflicts(&self, decisions: &[ConflictDecision]) -> ResolveResult {
        let conflicts = self.get_config_conflicts();
        if conflicts.is_empty() {
            return ResolveResult {
                success: true,
                message: "No conflicts to resolve".to_string(),
                applied_remote: 0,
                kept_local: 0,
            };
        }
        if !self.is_logged_in() {
            return ResolveResult::failed(NOT_LOGGED_IN);
        }
        if self.inner.is_syncing.swap(true, Ordering::SeqCst) {
            return ResolveResult::failed(ALREADY_SYNCING);
        }

        let result = match self.run_resolution(&conflicts, decisions).await {
            Ok(outcome) => {
                let message = format!(
                    "Resolved {} conflict(s): {} remote, {} local",
                    conflicts.len(),
                    outcome.applied_remote,
                    outcome.kept_local
                );
                tracing::info!("{message}");
                self.record(SyncKind::Resolve, true, &message, 1);
                ResolveResult {
                    success: true,
                    message,
                    applied_remote: outcome.applied_remote,
                    kept_local: outcome.kept_local,
                }
            }
            Err(error) => {
                let message = error.to_string();
                tracing::warn!("Conflict resolution failed: {message}");
                self.record(SyncKind::Resolve, false, &message, 0);
                ResolveResult::failed(message)
            }
        };

        self.finish_pass();
        result
    }

    async fn run_resolution(
        &self,
        conflicts: &ConflictSet,
        decisions: &[ConflictDecision],
    ) -> Result<ResolutionOutcome> {
        let local = self.inner.local.as_ref();
        let settings = self.inner.settings.as_ref();
        let outcome = apply_resolutions(local, settings, conflicts, decisions)?;

        let remote = self.remote()?;
        let engine = MergeEngine::new(local, settings, remote.as_ref());
        if let Some(snapshot) = engine.fetch_remote_snapshot().await? {
            engine.merge_metadata(&snapshot, &outcome.resolved)?;
        }
        engine.push_config().await?;
        store_conflicts(settings, &ConflictSet::default())?;
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Push every `sync_interval` minutes, replacing any running timer
    pub fn start_auto_sync(&self) {
        abort_task(&self.inner.auto_sync_task);
        if !self.is_logged_in() {
            return;
        }

        let minutes = self.sync_interval();
        let period = Duration::from_secs(minutes * 60);
        let Some(first_tick) = Instant::now().checked_add(period) else {
            tracing::warn!("Auto sync not started: interval of {minutes} minute(s) is out of range");
            return;
        };
        let weak = self.downgrade();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(service) = Self::upgrade(&weak) else {
                    break;
                };
                service.sync_all().await;
            }
        });
        replace_task(&self.inner.auto_sync_task, handle);
        self.persist(keys::AUTO_SYNC_ENABLED, Value::Bool(true));
        tracing::info!("Auto sync started: every {minutes} minute(s)");
    }

    pub fn stop_auto_sync(&self) {
        abort_task(&self.inner.auto_sync_task);
        self.persist(keys::AUTO_SYNC_ENABLED, Value::Bool(false));
        tracing::info!("Auto sync stopped");
    }

    /// Change the auto-sync interval, restarting the timer if it is running
    pub fn set_sync_interval(&self, minutes: u64) -> Result<()> {
        if minutes == 0 {
            return Err(Error::InvalidInput(
                "sync interval must be at least one minute".to_string(),
            ));
        }
        if minutes > MAX_SYNC_INTERVAL_MINUTES {
            return Err(Error::InvalidInput(format!(
                "sync interval must be at most {MAX_SYNC_INTERVAL_MINUTES} minutes"
            )));
        }
        self.inner
            .settings
            .set(keys::SYNC_INTERVAL, Value::from(minutes))?;
        if task_running(&self.inner.auto_sync_task) {
            self.start_auto_sync();
        }
        Ok(())
    }

    /// Note a local mutation; arms one debounced push when auto-sync is on
    ///
    /// Calls made while the debounce timer is armed are ignored.
    pub fn mark_dirty(&self) {
        if !self.auto_sync_enabled() || !self.is_logged_in() {
            return;
        }
        if self.inner.dirty_armed.swap(true, Ordering::SeqCst) {
            return;
        }

        let weak = self.downgrade();
        let delay = self.inner.config.debounce_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(service) = Self::upgrade(&weak) {
                service.inner.dirty_armed.store(false, Ordering::SeqCst);
                service.sync_all().await;
            }
        });
        replace_task(&self.inner.debounce_task, handle);
        tracing::debug!("Local change queued for sync in {delay:?}");
    }

    fn finish_pass(&self) {
        self.inner.is_syncing.store(false, Ordering::SeqCst);
        if self.inner.pending_rerun.swap(false, Ordering::SeqCst) {
            self.spawn_rerun(self.inner.config.rerun_delay);
        }
    }

    fn spawn_rerun(&self, delay: Duration) {
        let weak = self.downgrade();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(service) = Self::upgrade(&weak) {
                service.sync_all().await;
            }
        });
        replace_task(&self.inner.rerun_task, handle);
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    #[must_use]
    pub fn get_sync_status(&self) -> SyncStatusInfo {
        let settings = &self.inner.settings;
        let status = if self.is_syncing() {
            SyncStatus::Syncing
        } else {
            settings
                .get_string(keys::SYNC_STATUS)
                .map_or(SyncStatus::Idle, |status| SyncStatus::parse(&status))
        };
        SyncStatusInfo {
            last_sync: settings.get_string(keys::LAST_SYNC),
            status,
            message: settings.get_string(keys::SYNC_MESSAGE).unwrap_or_default(),
            auto_sync_enabled: self.auto_sync_enabled(),
            sync_interval: self.sync_interval(),
        }
    }

    /// Most recent pass outcomes, newest first
    pub fn sync_history(&self, limit: usize) -> Result<Vec<SyncHistoryEntry>> {
        self.inner.local.list_sync_history(limit)
    }

    fn auto_sync_enabled(&self) -> bool {
        self.inner.settings.get_bool(keys::AUTO_SYNC_ENABLED, false)
    }

    fn sync_interval(&self) -> u64 {
        self.inner
            .settings
            .get_u64(
                keys::SYNC_INTERVAL,
                self.inner.config.default_sync_interval_minutes,
            )
            .clamp(1, MAX_SYNC_INTERVAL_MINUTES)
    }

    fn set_status(&self, status: SyncStatus, message: &str) {
        self.persist(keys::SYNC_STATUS, Value::String(status.as_str().to_string()));
        self.persist(keys::SYNC_MESSAGE, Value::String(message.to_string()));
    }

    fn persist(&self, key: &str, value: Value) {
        if let Err(error) = self.inner.settings.set(key, value) {
            tracing::warn!("Failed to persist {key}: {error}");
        }
    }

    fn record(&self, kind: SyncKind, success: bool, message: &str, files: usize) {
        if let Err(error) = self.inner.local.record_sync(kind, success, message, files) {
            tracing::warn!("Failed to record sync history: {error}");
        }
    }
}

fn replace_task(slot: &Mutex<Option<JoinHandle<()>>>, handle: JoinHandle<()>) {
    match slot.lock() {
        Ok(mut slot) => {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
        Err(_) => handle.abort(),
    }
}

fn abort_task(slot: &Mutex<Option<JoinHandle<()>>>) {
    if let Ok(mut slot) = slot.lock() {
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

fn task_running(slot: &Mutex<Option<JoinHandle<()>>>) -> bool {
    slot.lock()
        .map(|slot| slot.as_ref().is_some_and(|handle| !handle.is_finished()))
        .unwrap_or(false)
}
