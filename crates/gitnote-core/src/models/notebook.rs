//! Notebook model

use serde::{Deserialize, Serialize};

use crate::util::now_iso;

/// Name given to the notebook created for a fresh local store
pub const DEFAULT_NOTEBOOK_NAME: &str = "Default Notebook";

/// Root container for folders and notes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notebook {
    /// Stable UUID
    pub id: String,
    /// Display name
    pub name: String,
    /// Creation timestamp (ISO-8601, UTC)
    pub created_at: String,
    /// Last update timestamp (ISO-8601, UTC)
    pub updated_at: String,
}

impl Notebook {
    /// Create a new notebook stamped with the current time
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = now_iso();
        Self {
            id: super::new_id(),
            name: name.into(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notebook_new() {
        let notebook = Notebook::new("Work");
        assert_eq!(notebook.name, "Work");
        assert_eq!(notebook.created_at, notebook.updated_at);
    }

    #[test]
    fn test_notebook_json_field_order() {
        let notebook = Notebook {
            id: "nb-1".to_string(),
            name: "Work".to_string(),
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
            updated_at: "2024-01-02T00:00:00.000Z".to_string(),
        };
        let json = serde_json::to_string(&notebook).unwrap();
        assert_eq!(
            json,
            r#"{"id":"nb-1","name":"Work","created_at":"2024-01-01T00:00:00.000Z","updated_at":"2024-01-02T00:00:00.000Z"}"#
        );
    }
}
