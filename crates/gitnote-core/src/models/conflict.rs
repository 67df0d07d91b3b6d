//! Configuration conflict model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Folder, Notebook, Tag};

/// A notebook whose compared fields differ between replicas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookConflict {
    pub id: String,
    pub local: Notebook,
    pub remote: Notebook,
}

/// A folder whose compared fields differ between replicas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderConflict {
    pub id: String,
    pub local: Folder,
    pub remote: Folder,
}

/// A tag whose name differs between replicas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagConflict {
    pub id: String,
    pub local: Tag,
    pub remote: Tag,
}

/// A synced setting defined on both sides with different values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingConflict {
    /// Snapshot key (e.g. `fontSize`)
    pub key: String,
    pub local: Value,
    pub remote: Value,
}

/// Conflicts captured at detection time, persisted until resolved
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictSet {
    #[serde(default)]
    pub notebooks: Vec<NotebookConflict>,
    #[serde(default)]
    pub folders: Vec<FolderConflict>,
    #[serde(default)]
    pub tags: Vec<TagConflict>,
    #[serde(default)]
    pub settings: Vec<SettingConflict>,
}

impl ConflictSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of conflicting items
    #[must_use]
    pub fn len(&self) -> usize {
        self.notebooks.len() + self.folders.len() + self.tags.len() + self.settings.len()
    }

    /// Every conflicting item as `(kind, key)`
    #[must_use]
    pub fn keys(&self) -> Vec<(ConflictKind, String)> {
        let notebooks = self
            .notebooks
            .iter()
            .map(|conflict| (ConflictKind::Notebook, conflict.id.clone()));
        let folders = self
            .folders
            .iter()
            .map(|conflict| (ConflictKind::Folder, conflict.id.clone()));
        let tags = self
            .tags
            .iter()
            .map(|conflict| (ConflictKind::Tag, conflict.id.clone()));
        let settings = self
            .settings
            .iter()
            .map(|conflict| (ConflictKind::Setting, conflict.key.clone()));
        notebooks.chain(folders).chain(tags).chain(settings).collect()
    }
}

/// Category of a conflicting item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Notebook,
    Folder,
    Tag,
    Setting,
}

impl ConflictKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Notebook => "notebook",
            Self::Folder => "folder",
            Self::Tag => "tag",
            Self::Setting => "setting",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "notebook" | "notebooks" => Ok(Self::Notebook),
            "folder" | "folders" => Ok(Self::Folder),
            "tag" | "tags" => Ok(Self::Tag),
            "setting" | "settings" => Ok(Self::Setting),
            other => Err(format!("unknown conflict kind '{other}'")),
        }
    }
}

/// Which replica's value wins for a conflicting item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Local,
    Remote,
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(format!("resolution must be 'local' or 'remote', got '{other}'")),
        }
    }
}

/// A user decision for one conflicting item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDecision {
    pub kind: ConflictKind,
    /// Entity id, or snapshot key for settings
    pub key: String,
    #[serde(rename = "use")]
    pub resolution: Resolution,
}

impl ConflictDecision {
    #[must_use]
    pub fn new(kind: ConflictKind, key: impl Into<String>, resolution: Resolution) -> Self {
        Self {
            kind,
            key: key.into(),
            resolution,
        }
    }
}

/// Parses `kind:key=local|remote`, e.g. `folder:5f3c...=remote`.
impl FromStr for ConflictDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (target, resolution) = s
            .rsplit_once('=')
            .ok_or_else(|| format!("decision '{s}' must look like kind:key=local|remote"))?;
        let (kind, key) = target
            .split_once(':')
            .ok_or_else(|| format!("decision '{s}' must look like kind:key=local|remote"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("decision '{s}' is missing a key"));
        }

        Ok(Self {
            kind: kind.parse()?,
            key: key.to_string(),
            resolution: resolution.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notebook(id: &str, name: &str) -> Notebook {
        Notebook {
            id: id.to_string(),
            name: name.to_string(),
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
            updated_at: "2024-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn conflict_set_counts_and_keys() {
        let set = ConflictSet {
            notebooks: vec![NotebookConflict {
                id: "nb".to_string(),
                local: notebook("nb", "Local"),
                remote: notebook("nb", "Remote"),
            }],
            settings: vec![SettingConflict {
                key: "fontSize".to_string(),
                local: Value::from(14),
                remote: Value::from(16),
            }],
            ..ConflictSet::default()
        };

        assert!(!set.is_empty());
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.keys(),
            vec![
                (ConflictKind::Notebook, "nb".to_string()),
                (ConflictKind::Setting, "fontSize".to_string()),
            ]
        );
    }

    #[test]
    fn decision_parses_from_cli_syntax() {
        let decision: ConflictDecision = "folder:abc-123=remote".parse().unwrap();
        assert_eq!(
            decision,
            ConflictDecision::new(ConflictKind::Folder, "abc-123", Resolution::Remote)
        );

        let decision: ConflictDecision = "setting:fontSize=LOCAL".parse().unwrap();
        assert_eq!(decision.kind, ConflictKind::Setting);
        assert_eq!(decision.resolution, Resolution::Local);
    }

    #[test]
    fn decision_rejects_malformed_input() {
        assert!("folder=remote".parse::<ConflictDecision>().is_err());
        assert!("folder:=remote".parse::<ConflictDecision>().is_err());
        assert!("shelf:x=remote".parse::<ConflictDecision>().is_err());
        assert!("folder:x=both".parse::<ConflictDecision>().is_err());
    }

    #[test]
    fn decision_serializes_use_field() {
        let decision = ConflictDecision::new(ConflictKind::Tag, "t1", Resolution::Local);
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "tag", "key": "t1", "use": "local"})
        );
    }
}
