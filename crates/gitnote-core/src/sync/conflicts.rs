//! Conflict detection between the local and remote config snapshots, and
//! application of user decisions

use std::collections::{HashMap, HashSet};

use crate::codec::snapshot::settings_key;
use crate::codec::ConfigSnapshot;
use crate::db::LocalStore;
use crate::error::Result;
use crate::models::{
    ConflictDecision, ConflictKind, ConflictSet, Folder, FolderConflict, Notebook,
    NotebookConflict, Resolution, SettingConflict, TagConflict,
};
use crate::settings::{keys, SettingsStore};
use crate::util::is_newer;

use super::engine::{write_folder, write_tag};

/// Compare snapshots and collect the items both replicas changed differently
///
/// Nothing conflicts unless the remote snapshot was exported after
/// `last_sync`. A notebook or folder conflicts when a compared field differs
/// and both copies were updated after `last_sync`; tags and settings conflict
/// whenever their values differ. With no `last_sync` every difference counts.
#[must_use]
pub fn detect_conflicts(
    local: &ConfigSnapshot,
    remote: &ConfigSnapshot,
    last_sync: Option<&str>,
) -> ConflictSet {
    let changed_since_sync =
        |timestamp: &str| last_sync.map_or(true, |last_sync| is_newer(timestamp, last_sync));

    let mut conflicts = ConflictSet::default();
    if !changed_since_sync(&remote.exported_at) {
        return conflicts;
    }

    let local_notebooks: HashMap<&str, &Notebook> = local
        .notebooks
        .iter()
        .map(|notebook| (notebook.id.as_str(), notebook))
        .collect();
    for remote_notebook in &remote.notebooks {
        let Some(local_notebook) = local_notebooks.get(remote_notebook.id.as_str()) else {
            continue;
        };
        let differs = local_notebook.name != remote_notebook.name
            || local_notebook.updated_at != remote_notebook.updated_at;
        if differs
            && changed_since_sync(&local_notebook.updated_at)
            && changed_since_sync(&remote_notebook.updated_at)
        {
            conflicts.notebooks.push(NotebookConflict {
                id: remote_notebook.id.clone(),
                local: (*local_notebook).clone(),
                remote: remote_notebook.clone(),
            });
        }
    }

    let local_folders: HashMap<&str, &Folder> = local
        .folders
        .iter()
        .map(|folder| (folder.id.as_str(), folder))
        .collect();
    for remote_folder in &remote.folders {
        let Some(local_folder) = local_folders.get(remote_folder.id.as_str()) else {
            continue;
        };
        let differs = local_folder.name != remote_folder.name
            || local_folder.parent_id != remote_folder.parent_id
            || local_folder.sort_order != remote_folder.sort_order
            || local_folder.updated_at != remote_folder.updated_at;
        if differs
            && changed_since_sync(&local_folder.updated_at)
            && changed_since_sync(&remote_folder.updated_at)
        {
            conflicts.folders.push(FolderConflict {
                id: remote_folder.id.clone(),
                local: (*local_folder).clone(),
                remote: remote_folder.clone(),
            });
        }
    }

    for remote_tag in &remote.tags {
        if let Some(local_tag) = local.tags.iter().find(|tag| tag.id == remote_tag.id) {
            if local_tag.name != remote_tag.name {
                conflicts.tags.push(TagConflict {
                    id: remote_tag.id.clone(),
                    local: local_tag.clone(),
                    remote: remote_tag.clone(),
                });
            }
        }
    }

    for (key, remote_value) in &remote.settings {
        if let Some(local_value) = local.settings.get(key) {
            if local_value != remote_value && !remote_value.is_null() {
                conflicts.settings.push(SettingConflict {
                    key: key.clone(),
                    local: local_value.clone(),
                    remote: remote_value.clone(),
                });
            }
        }
    }

    conflicts
}

/// Conflicts persisted by the last blocked pull
pub fn load_conflicts(settings: &dyn SettingsStore) -> ConflictSet {
    let Some(value) = settings.get(keys::CONFIG_CONFLICTS) else {
        return ConflictSet::default();
    };
    serde_json::from_value(value).unwrap_or_else(|error| {
        tracing::warn!("Discarding unreadable stored conflicts: {error}");
        ConflictSet::default()
    })
}

pub fn store_conflicts(settings: &dyn SettingsStore, conflicts: &ConflictSet) -> Result<()> {
    if conflicts.is_empty() {
        settings.delete(keys::CONFIG_CONFLICTS)
    } else {
        settings.set(keys::CONFIG_CONFLICTS, serde_json::to_value(conflicts)?)
    }
}

/// Items settled by a resolution, excluded from the follow-up metadata merge
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolvedKeys {
    keys: HashSet<(ConflictKind, String)>,
}

impl ResolvedKeys {
    #[must_use]
    pub fn contains(&self, kind: ConflictKind, key: &str) -> bool {
        self.keys.contains(&(kind, key.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Outcome of applying decisions to a conflict set
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolutionOutcome {
    /// Items where the remote value was written locally
    pub applied_remote: usize,
    /// Items where the local value was kept
    pub kept_local: usize,
    pub resolved: ResolvedKeys,
}

/// Apply one decision per conflicting item
///
/// `remote` writes the remote value into the local store (insert if absent,
/// else update); `local` leaves local state as is. Items without a decision
/// keep their local value. Decisions naming items outside the set are ignored.
pub fn apply_resolutions(
    local: &dyn LocalStore,
    settings: &dyn SettingsStore,
    conflicts: &ConflictSet,
    decisions: &[ConflictDecision],
) -> Result<ResolutionOutcome> {
    let chosen: HashMap<(ConflictKind, String), Resolution> = decisions
        .iter()
        .map(|decision| ((decision.kind, decision.key.clone()), decision.resolution))
        .collect();
    let known: HashSet<(ConflictKind, String)> = conflicts.keys().into_iter().collect();
    for decision in decisions {
        if !known.contains(&(decision.kind, decision.key.clone())) {
            tracing::warn!(
                "Ignoring decision for unknown conflict {}:{}",
                decision.kind,
                decision.key
            );
        }
    }

    let mut outcome = ResolutionOutcome::default();
    let mut decide = |kind: ConflictKind, key: &str| {
        let item = (kind, key.to_string());
        let resolution = chosen.get(&item).copied().unwrap_or_else(|| {
            tracing::warn!("No decision for conflict {kind}:{key}; keeping local value");
            Resolution::Local
        });
        outcome.resolved.keys.insert(item);
        match resolution {
            Resolution::Remote => outcome.applied_remote += 1,
            Resolution::Local => outcome.kept_local += 1,
        }
        resolution == Resolution::Remote
    };

    let mut remote_notebooks = Vec::new();
    let mut remote_folders = Vec::new();
    let mut remote_tags = Vec::new();
    let mut remote_settings = Vec::new();

    for conflict in &conflicts.notebooks {
        if decide(ConflictKind::Notebook, &conflict.id) {
            remote_notebooks.push(&conflict.remote);
        }
    }
    for conflict in &conflicts.folders {
        if decide(ConflictKind::Folder, &conflict.id) {
            remote_folders.push(&conflict.remote);
        }
    }
    for conflict in &conflicts.tags {
        if decide(ConflictKind::Tag, &conflict.id) {
            remote_tags.push(&conflict.remote);
        }
    }
    for conflict in &conflicts.settings {
        if decide(ConflictKind::Setting, &conflict.key) {
            remote_settings.push(conflict);
        }
    }

    for notebook in remote_notebooks {
        if local.get_notebook(&notebook.id)?.is_some() {
            local.update_notebook(notebook)?;
        } else {
            local.insert_notebook(notebook)?;
        }
    }
    for folder in remote_folders {
        write_folder(local, folder)?;
    }
    for tag in remote_tags {
        write_tag(local, tag)?;
    }
    for conflict in remote_settings {
        match settings_key(&conflict.key) {
            Some(key) => settings.set(key, conflict.remote.clone())?,
            None => tracing::warn!("Ignoring unknown setting '{}'", conflict.key),
        }
    }

    Ok(outcome)
}
