//! Folder model

use serde::{Deserialize, Serialize};

use crate::util::now_iso;

/// A folder inside a notebook; `parent_id` links folders into a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Stable UUID
    pub id: String,
    /// Display name
    pub name: String,
    /// Owning notebook
    pub notebook_id: String,
    /// Parent folder, `None` for top-level folders
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Position among siblings
    #[serde(default)]
    pub sort_order: i64,
    /// Creation timestamp (ISO-8601, UTC)
    pub created_at: String,
    /// Last update timestamp (ISO-8601, UTC)
    pub updated_at: String,
}

impl Folder {
    /// Create a new top-level folder in the given notebook
    #[must_use]
    pub fn new(name: impl Into<String>, notebook_id: impl Into<String>) -> Self {
        let now = now_iso();
        Self {
            id: super::new_id(),
            name: name.into(),
            notebook_id: notebook_id.into(),
            parent_id: None,
            sort_order: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Set the parent folder
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_defaults_missing_optional_fields() {
        let folder: Folder = serde_json::from_str(
            r#"{"id":"f1","name":"Inbox","notebook_id":"nb","created_at":"a","updated_at":"b"}"#,
        )
        .unwrap();
        assert_eq!(folder.parent_id, None);
        assert_eq!(folder.sort_order, 0);
    }

    #[test]
    fn test_folder_with_parent() {
        let parent = Folder::new("Parent", "nb");
        let child = Folder::new("Child", "nb").with_parent(parent.id.clone());
        assert_eq!(child.parent_id.as_deref(), Some(parent.id.as_str()));
    }
}
