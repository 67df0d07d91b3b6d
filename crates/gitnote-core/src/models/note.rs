//! Note model

use serde::{Deserialize, Serialize};

use crate::util::now_iso;

/// A note in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier
    pub id: String,
    /// Title, also used to derive the remote filename
    pub title: String,
    /// Markdown body (opaque to sync, replaced wholesale)
    pub content: String,
    /// Owning notebook
    pub notebook_id: Option<String>,
    /// Containing folder
    pub folder_id: Option<String>,
    /// Pinned to the top of lists
    pub is_pinned: bool,
    /// Soft delete flag; filtered out by the local store when listing live notes
    pub is_deleted: bool,
    /// Position among siblings
    pub sort_order: i64,
    /// Creation timestamp (ISO-8601, UTC)
    pub created_at: String,
    /// Last update timestamp (ISO-8601, UTC)
    pub updated_at: String,
}

impl Note {
    /// Create a new note in the given notebook
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        notebook_id: Option<String>,
    ) -> Self {
        let now = now_iso();
        Self {
            id: super::new_id(),
            title: title.into(),
            content: content.into(),
            notebook_id,
            folder_id: None,
            is_pinned: false,
            is_deleted: false,
            sort_order: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// First eight characters of the id, as embedded in remote filenames
    #[must_use]
    pub fn id_prefix(&self) -> &str {
        id_prefix(&self.id)
    }
}

/// A live note joined with its notebook name, folder name and tag names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDetails {
    /// The note row
    pub note: Note,
    /// Name of the owning notebook, if any
    pub notebook_name: Option<String>,
    /// Name of the containing folder, if any
    pub folder_name: Option<String>,
    /// Comma-joined tag names (`GROUP_CONCAT` projection)
    pub tags: Option<String>,
}

impl NoteDetails {
    /// Split the comma-joined tag projection into trimmed, non-empty names
    #[must_use]
    pub fn tag_names(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }
}

fn id_prefix(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(index, _)| &id[..index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_new() {
        let note = Note::new("Hello", "world", Some("nb".to_string()));
        assert_eq!(note.title, "Hello");
        assert!(!note.is_deleted);
        assert!(!note.is_pinned);
        assert_eq!(note.created_at, note.updated_at);
    }

    #[test]
    fn test_id_prefix() {
        let mut note = Note::new("t", "", None);
        note.id = "1234abcd-0000-4000-8000-000000000000".to_string();
        assert_eq!(note.id_prefix(), "1234abcd");

        note.id = "short".to_string();
        assert_eq!(note.id_prefix(), "short");
    }

    #[test]
    fn test_tag_names_split_and_trim() {
        let details = NoteDetails {
            note: Note::new("t", "", None),
            notebook_name: None,
            folder_name: None,
            tags: Some("rust, sync,,notes ".to_string()),
        };
        assert_eq!(details.tag_names(), vec!["rust", "sync", "notes"]);
    }

    #[test]
    fn test_tag_names_empty_projection() {
        let details = NoteDetails {
            note: Note::new("t", "", None),
            notebook_name: None,
            folder_name: None,
            tags: None,
        };
        assert!(details.tag_names().is_empty());
    }
}
