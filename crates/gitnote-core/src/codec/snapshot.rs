//! Config snapshot: every non-note entity plus a fixed settings subset

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Folder, Notebook, Tag};
use crate::settings::SettingsStore;
use crate::util::now_iso;

pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// Settings carried in the snapshot as `(snapshot key, settings key)`
pub const SYNCED_SETTINGS: [(&str, &str); 4] = [
    ("darkMode", "appearance.darkMode"),
    ("fontSize", "appearance.fontSize"),
    ("editorMode", "appearance.editorMode"),
    ("autoSave", "editor.autoSave"),
];

/// Contents of `config/data.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(default)]
    pub notebooks: Vec<Notebook>,
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "exportedAt", default)]
    pub exported_at: String,
}

impl ConfigSnapshot {
    /// Snapshot of the given entities, stamped with the current time
    #[must_use]
    pub fn new(
        notebooks: Vec<Notebook>,
        folders: Vec<Folder>,
        tags: Vec<Tag>,
        settings: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            notebooks,
            folders,
            tags,
            settings,
            version: SNAPSHOT_VERSION.to_string(),
            exported_at: now_iso(),
        }
    }

    /// Pretty-printed JSON with two-space indentation
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn decode(document: &str) -> serde_json::Result<Self> {
        serde_json::from_str(document)
    }

    /// Equal apart from the export timestamp
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.notebooks == other.notebooks
            && self.folders == other.folders
            && self.tags == other.tags
            && self.settings == other.settings
            && self.version == other.version
    }
}

/// Read the synced settings subset; unset keys are omitted
pub fn collect_settings(settings: &dyn SettingsStore) -> BTreeMap<String, Value> {
    SYNCED_SETTINGS
        .iter()
        .filter_map(|(snapshot_key, settings_key)| {
            settings
                .get(settings_key)
                .filter(|value| !value.is_null())
                .map(|value| ((*snapshot_key).to_string(), value))
        })
        .collect()
}

/// Settings-store key for a snapshot settings key
#[must_use]
pub fn settings_key(snapshot_key: &str) -> Option<&'static str> {
    SYNCED_SETTINGS
        .iter()
        .find(|(key, _)| *key == snapshot_key)
        .map(|(_, settings_key)| *settings_key)
}
