//! Data models for gitnote

mod conflict;
mod folder;
mod note;
mod notebook;
mod sync_history;
mod tag;

pub use conflict::{
    ConflictDecision, ConflictKind, ConflictSet, FolderConflict, NotebookConflict, Resolution,
    SettingConflict, TagConflict,
};
pub use folder::Folder;
pub use note::{Note, NoteDetails};
pub use notebook::{Notebook, DEFAULT_NOTEBOOK_NAME};
pub use sync_history::{SyncHistoryEntry, SyncKind};
pub use tag::Tag;

/// Generate a new random entity identifier (UUID v4, lowercase hex).
///
/// Random ids keep the 8-hex prefix used in remote note filenames well
/// distributed; time-ordered ids would share prefixes for notes created close
/// together.
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_unique_hex_uuid() {
        let first = new_id();
        let second = new_id();
        assert_ne!(first, second);
        assert_eq!(first.len(), 36);
        assert!(first[..8].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
