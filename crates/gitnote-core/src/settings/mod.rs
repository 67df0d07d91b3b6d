//! Key-value settings store addressed by dotted keys
//!
//! Sync state lives under the `github.*` namespace (see [`keys`]).

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Setting keys owned by the sync service
pub mod keys {
    pub const ACCESS_TOKEN: &str = "github.accessToken";
    pub const USER: &str = "github.user";
    pub const OWNER: &str = "github.owner";
    pub const REPO: &str = "github.repo";
    pub const LAST_SYNC: &str = "github.lastSync";
    pub const SYNC_STATUS: &str = "github.syncStatus";
    pub const SYNC_MESSAGE: &str = "github.syncMessage";
    pub const AUTO_SYNC_ENABLED: &str = "github.autoSyncEnabled";
    pub const SYNC_INTERVAL: &str = "github.syncInterval";
    pub const CONFIG_CONFLICTS: &str = "github.configConflicts";
}

/// Trait for settings access
///
/// Keys are dot-separated paths into a JSON object, e.g. `appearance.fontSize`.
pub trait SettingsStore: Send + Sync {
    /// Read the value at `key`, if present
    fn get(&self, key: &str) -> Option<Value>;

    /// Write `value` at `key`, creating intermediate objects as needed
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Remove `key`; missing keys are not an error
    fn delete(&self, key: &str) -> Result<()>;

    /// Read a string setting
    fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(value) if !value.is_empty() => Some(value),
            _ => None,
        }
    }

    /// Read a boolean setting, falling back to `default`
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|value| value.as_bool()).unwrap_or(default)
    }

    /// Read an unsigned integer setting, falling back to `default`
    fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.get(key).and_then(|value| value.as_u64()).unwrap_or(default)
    }
}

/// Settings held in a JSON document, optionally persisted to disk
pub struct JsonSettingsStore {
    path: Option<PathBuf>,
    data: Mutex<Value>,
}

impl JsonSettingsStore {
    /// Settings that live only in memory
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(Value::Object(Map::new())),
        }
    }

    /// Load settings from `path`, starting empty if the file is missing or unreadable
    #[must_use]
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let data = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(value @ Value::Object(_)) => value,
                Ok(_) => {
                    tracing::warn!("Settings file {} is not a JSON object", path.display());
                    Value::Object(Map::new())
                }
                Err(error) => {
                    tracing::warn!("Failed to parse settings file {}: {error}", path.display());
                    Value::Object(Map::new())
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Value::Object(Map::new())
            }
            Err(error) => {
                tracing::warn!("Failed to read settings file {}: {error}", path.display());
                Value::Object(Map::new())
            }
        };

        Self {
            path: Some(path),
            data: Mutex::new(data),
        }
    }

    /// File backing this store, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Value>> {
        self.data
            .lock()
            .map_err(|_| Error::Database("settings lock poisoned".to_string()))
    }

    fn persist(&self, data: &Value) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(data)?)?;
        Ok(())
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get(&self, key: &str) -> Option<Value> {
        let data = self.lock().ok()?;
        lookup(&data, key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut data = self.lock()?;
        insert(&mut data, key, value)?;
        self.persist(&data)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut data = self.lock()?;
        if remove(&mut data, key) {
            self.persist(&data)?;
        }
        Ok(())
    }
}

fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .try_fold(root, |current, segment| current.as_object()?.get(segment))
}

fn insert(root: &mut Value, key: &str, value: Value) -> Result<()> {
    let segments: Vec<&str> = key.split('.').collect();
    let Some((leaf, parents)) = segments.split_last() else {
        return Err(Error::InvalidInput(format!("invalid settings key '{key}'")));
    };
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(Error::InvalidInput(format!("invalid settings key '{key}'")));
    }

    let mut current = root;
    for segment in parents {
        current = object_mut(current)
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    object_mut(current).insert((*leaf).to_string(), value);
    Ok(())
}

/// Coerce `value` into an object, discarding any scalar it held
fn object_mut(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was coerced to an object"),
    }
}

fn remove(root: &mut Value, key: &str) -> bool {
    let (parents, leaf) = match key.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, key),
    };

    let mut current = root;
    for segment in parents.into_iter().flat_map(|parents| parents.split('.')) {
        match current.as_object_mut().and_then(|map| map.get_mut(segment)) {
            Some(next) => current = next,
            None => return false,
        }
    }

    current
        .as_object_mut()
        .is_some_and(|map| map.remove(leaf).is_some())
}
