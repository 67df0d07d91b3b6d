//! Local store implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::Database;
use crate::error::{Error, Result};
use crate::models::{Folder, Note, NoteDetails, Notebook, SyncHistoryEntry, SyncKind, Tag};
use crate::util::now_iso;

/// Trait for local store operations consumed by the sync engine
///
/// Every write is durable when the call returns. Soft-deleted notes are
/// excluded by [`LocalStore::list_live_notes`]; the engine never filters them
/// itself.
pub trait LocalStore: Send + Sync {
    /// All notebooks, oldest first
    fn list_notebooks(&self) -> Result<Vec<Notebook>>;

    /// Get a notebook by id
    fn get_notebook(&self, id: &str) -> Result<Option<Notebook>>;

    /// Find the first notebook with the given name
    fn find_notebook_by_name(&self, name: &str) -> Result<Option<Notebook>>;

    /// Insert a notebook with its given id and timestamps
    fn insert_notebook(&self, notebook: &Notebook) -> Result<()>;

    /// Overwrite a notebook's mutable fields (name, `updated_at`)
    fn update_notebook(&self, notebook: &Notebook) -> Result<()>;

    /// All folders ordered by `sort_order`
    fn list_folders(&self) -> Result<Vec<Folder>>;

    /// Get a folder by id
    fn get_folder(&self, id: &str) -> Result<Option<Folder>>;

    /// Find a folder by owning notebook and name
    fn find_folder(&self, notebook_id: &str, name: &str) -> Result<Option<Folder>>;

    /// Insert a folder with its given id and timestamps
    fn insert_folder(&self, folder: &Folder) -> Result<()>;

    /// Overwrite a folder's mutable fields (name, parent, sort order, `updated_at`)
    fn update_folder(&self, folder: &Folder) -> Result<()>;

    /// All tags ordered by name
    fn list_tags(&self) -> Result<Vec<Tag>>;

    /// Get a tag by id
    fn get_tag(&self, id: &str) -> Result<Option<Tag>>;

    /// Find a tag by exact (case-sensitive) name
    fn find_tag_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// Insert a tag with its given id
    fn insert_tag(&self, tag: &Tag) -> Result<()>;

    /// Rename a tag
    fn update_tag(&self, tag: &Tag) -> Result<()>;

    /// Get a note by id, including soft-deleted notes
    fn get_note(&self, id: &str) -> Result<Option<Note>>;

    /// Insert a note with its given id and timestamps
    fn insert_note(&self, note: &Note) -> Result<()>;

    /// Overwrite a note's mutable fields
    fn update_note(&self, note: &Note) -> Result<()>;

    /// Soft delete a note
    fn soft_delete_note(&self, id: &str) -> Result<()>;

    /// Replace the tag links of a note
    fn set_note_tags(&self, note_id: &str, tag_ids: &[String]) -> Result<()>;

    /// Non-deleted notes joined with notebook name, folder name and
    /// comma-joined tag names, newest first
    fn list_live_notes(&self) -> Result<Vec<NoteDetails>>;

    /// Append a sync history entry
    fn record_sync(
        &self,
        kind: SyncKind,
        success: bool,
        message: &str,
        files_count: usize,
    ) -> Result<()>;

    /// Most recent sync history entries, newest first
    fn list_sync_history(&self, limit: usize) -> Result<Vec<SyncHistoryEntry>>;
}

/// `SQLite` implementation of `LocalStore`
pub struct SqliteLocalStore {
    db: Database,
}

impl SqliteLocalStore {
    /// Wrap an opened database
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open a file-backed store
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Open an in-memory store (primarily for tests)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn query_all<T>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, map)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn query_one<T>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        map: impl FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Option<T>> {
        let conn = self.db.connection()?;
        Ok(conn.query_row(sql, params, map).optional()?)
    }

    fn run(&self, sql: &str, params: impl rusqlite::Params) -> Result<usize> {
        let conn = self.db.connection()?;
        Ok(conn.execute(sql, params)?)
    }

    fn parse_notebook(row: &Row<'_>) -> rusqlite::Result<Notebook> {
        Ok(Notebook {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }

    fn parse_folder(row: &Row<'_>) -> rusqlite::Result<Folder> {
        Ok(Folder {
            id: row.get(0)?,
            name: row.get(1)?,
            notebook_id: row.get(2)?,
            parent_id: row.get(3)?,
            sort_order: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn parse_tag(row: &Row<'_>) -> rusqlite::Result<Tag> {
        Ok(Tag {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
        })
    }

    fn parse_note(row: &Row<'_>) -> rusqlite::Result<Note> {
        Ok(Note {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            notebook_id: row.get(3)?,
            folder_id: row.get(4)?,
            is_pinned: row.get::<_, i64>(5)? != 0,
            is_deleted: row.get::<_, i64>(6)? != 0,
            sort_order: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn replace_note_tags(conn: &Connection, note_id: &str, tag_ids: &[String]) -> Result<()> {
        conn.execute("DELETE FROM note_tags WHERE note_id = ?", params![note_id])?;
        for tag_id in tag_ids {
            conn.execute(
                "INSERT OR IGNORE INTO note_tags (note_id, tag_id) VALUES (?, ?)",
                params![note_id, tag_id],
            )?;
        }
        Ok(())
    }
}

const NOTEBOOK_COLUMNS: &str = "id, name, created_at, updated_at";
const FOLDER_COLUMNS: &str =
    "id, name, notebook_id, parent_id, sort_order, created_at, updated_at";
const NOTE_COLUMNS: &str = "id, title, content, notebook_id, folder_id, is_pinned, is_deleted, sort_order, created_at, updated_at";

impl LocalStore for SqliteLocalStore {
    fn list_notebooks(&self) -> Result<Vec<Notebook>> {
        self.query_all(
            &format!("SELECT {NOTEBOOK_COLUMNS} FROM notebooks ORDER BY created_at"),
            [],
            Self::parse_notebook,
        )
    }

    fn get_notebook(&self, id: &str) -> Result<Option<Notebook>> {
        self.query_one(
            &format!("SELECT {NOTEBOOK_COLUMNS} FROM notebooks WHERE id = ?"),
            params![id],
            Self::parse_notebook,
        )
    }

    fn find_notebook_by_name(&self, name: &str) -> Result<Option<Notebook>> {
        self.query_one(
            &format!(
                "SELECT {NOTEBOOK_COLUMNS} FROM notebooks WHERE name = ? ORDER BY created_at LIMIT 1"
            ),
            params![name],
            Self::parse_notebook,
        )
    }

    fn insert_notebook(&self, notebook: &Notebook) -> Result<()> {
        self.run(
            "INSERT INTO notebooks (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)",
            params![
                notebook.id,
                notebook.name,
                notebook.created_at,
                notebook.updated_at
            ],
        )?;
        Ok(())
    }

    fn update_notebook(&self, notebook: &Notebook) -> Result<()> {
        self.run(
            "UPDATE notebooks SET name = ?, updated_at = ? WHERE id = ?",
            params![notebook.name, notebook.updated_at, notebook.id],
        )?;
        Ok(())
    }

    fn list_folders(&self) -> Result<Vec<Folder>> {
        self.query_all(
            &format!("SELECT {FOLDER_COLUMNS} FROM folders ORDER BY sort_order, created_at"),
            [],
            Self::parse_folder,
        )
    }

    fn get_folder(&self, id: &str) -> Result<Option<Folder>> {
        self.query_one(
            &format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?"),
            params![id],
            Self::parse_folder,
        )
    }

    fn find_folder(&self, notebook_id: &str, name: &str) -> Result<Option<Folder>> {
        self.query_one(
            &format!(
                "SELECT {FOLDER_COLUMNS} FROM folders WHERE notebook_id = ? AND name = ?
                 ORDER BY sort_order LIMIT 1"
            ),
            params![notebook_id, name],
            Self::parse_folder,
        )
    }

    fn insert_folder(&self, folder: &Folder) -> Result<()> {
        self.run(
            "INSERT INTO folders (id, name, notebook_id, parent_id, sort_order, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                folder.id,
                folder.name,
                folder.notebook_id,
                folder.parent_id,
                folder.sort_order,
                folder.created_at,
                folder.updated_at
            ],
        )?;
        Ok(())
    }

    fn update_folder(&self, folder: &Folder) -> Result<()> {
        self.run(
            "UPDATE folders SET name = ?, parent_id = ?, sort_order = ?, updated_at = ? WHERE id = ?",
            params![
                folder.name,
                folder.parent_id,
                folder.sort_order,
                folder.updated_at,
                folder.id
            ],
        )?;
        Ok(())
    }

    fn list_tags(&self) -> Result<Vec<Tag>> {
        self.query_all(
            "SELECT id, name, created_at FROM tags ORDER BY name",
            [],
            Self::parse_tag,
        )
    }

    fn get_tag(&self, id: &str) -> Result<Option<Tag>> {
        self.query_one(
            "SELECT id, name, created_at FROM tags WHERE id = ?",
            params![id],
            Self::parse_tag,
        )
    }

    fn find_tag_by_name(&self, name: &str) -> Result<Option<Tag>> {
        self.query_one(
            "SELECT id, name, created_at FROM tags WHERE name = ?",
            params![name],
            Self::parse_tag,
        )
    }

    fn insert_tag(&self, tag: &Tag) -> Result<()> {
        self.run(
            "INSERT INTO tags (id, name, created_at) VALUES (?, ?, ?)",
            params![tag.id, tag.name, tag.created_at],
        )?;
        Ok(())
    }

    fn update_tag(&self, tag: &Tag) -> Result<()> {
        self.run(
            "UPDATE tags SET name = ? WHERE id = ?",
            params![tag.name, tag.id],
        )?;
        Ok(())
    }

    fn get_note(&self, id: &str) -> Result<Option<Note>> {
        self.query_one(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?"),
            params![id],
            Self::parse_note,
        )
    }

    fn insert_note(&self, note: &Note) -> Result<()> {
        self.run(
            "INSERT INTO notes (id, title, content, notebook_id, folder_id, is_pinned, is_deleted, sort_order, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                note.id,
                note.title,
                note.content,
                note.notebook_id,
                note.folder_id,
                i64::from(note.is_pinned),
                i64::from(note.is_deleted),
                note.sort_order,
                note.created_at,
                note.updated_at
            ],
        )?;
        Ok(())
    }

    fn update_note(&self, note: &Note) -> Result<()> {
        self.run(
            "UPDATE notes
             SET title = ?, content = ?, notebook_id = ?, folder_id = ?, is_pinned = ?, sort_order = ?, updated_at = ?
             WHERE id = ?",
            params![
                note.title,
                note.content,
                note.notebook_id,
                note.folder_id,
                i64::from(note.is_pinned),
                note.sort_order,
                note.updated_at,
                note.id
            ],
        )?;
        Ok(())
    }

    fn soft_delete_note(&self, id: &str) -> Result<()> {
        self.run(
            "UPDATE notes SET is_deleted = 1, updated_at = ? WHERE id = ? AND is_deleted = 0",
            params![now_iso(), id],
        )?;
        Ok(())
    }

    fn set_note_tags(&self, note_id: &str, tag_ids: &[String]) -> Result<()> {
        let conn = self.db.connection()?;
        Self::replace_note_tags(&conn, note_id, tag_ids)
    }

    fn list_live_notes(&self) -> Result<Vec<NoteDetails>> {
        self.query_all(
            "SELECT n.id, n.title, n.content, n.notebook_id, n.folder_id, n.is_pinned, n.is_deleted,
                    n.sort_order, n.created_at, n.updated_at,
                    nb.name AS notebook_name, f.name AS folder_name, GROUP_CONCAT(t.name) AS tags
             FROM notes n
             LEFT JOIN notebooks nb ON n.notebook_id = nb.id
             LEFT JOIN folders f ON n.folder_id = f.id
             LEFT JOIN note_tags nt ON n.id = nt.note_id
             LEFT JOIN tags t ON nt.tag_id = t.id
             WHERE n.is_deleted = 0
             GROUP BY n.id
             ORDER BY n.updated_at DESC",
            [],
            |row| {
                Ok(NoteDetails {
                    note: Self::parse_note(row)?,
                    notebook_name: row.get(10)?,
                    folder_name: row.get(11)?,
                    tags: row.get(12)?,
                })
            },
        )
    }

    fn record_sync(
        &self,
        kind: SyncKind,
        success: bool,
        message: &str,
        files_count: usize,
    ) -> Result<()> {
        let files_count = i64::try_from(files_count)
            .map_err(|_| Error::InvalidInput(format!("file count {files_count} out of range")))?;
        self.run(
            "INSERT INTO sync_history (sync_type, status, message, files_count, synced_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                kind.as_str(),
                if success { "success" } else { "error" },
                message,
                files_count,
                now_iso()
            ],
        )?;
        Ok(())
    }

    fn list_sync_history(&self, limit: usize) -> Result<Vec<SyncHistoryEntry>> {
        let limit = i64::try_from(limit)
            .map_err(|_| Error::InvalidInput(format!("history limit {limit} out of range")))?;
        self.query_all(
            "SELECT id, sync_type, status, COALESCE(message, ''), files_count, synced_at
             FROM sync_history
             ORDER BY id DESC
             LIMIT ?",
            params![limit],
            |row| {
                Ok(SyncHistoryEntry {
                    id: row.get(0)?,
                    sync_type: row.get(1)?,
                    status: row.get(2)?,
                    message: row.get(3)?,
                    files_count: row.get(4)?,
                    synced_at: row.get(5)?,
                })
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn setup() -> SqliteLocalStore {
        SqliteLocalStore::open_in_memory().unwrap()
    }

    fn default_notebook(store: &SqliteLocalStore) -> Notebook {
        store.list_notebooks().unwrap().remove(0)
    }

    #[test]
    fn test_notebook_insert_update_and_lookup() {
        let store = setup();
        let mut notebook = Notebook::new("Work");
        store.insert_notebook(&notebook).unwrap();

        notebook.name = "Office".to_string();
        notebook.updated_at = "2099-01-01T00:00:00.000Z".to_string();
        store.update_notebook(&notebook).unwrap();

        assert_eq!(store.get_notebook(&notebook.id).unwrap(), Some(notebook.clone()));
        assert_eq!(
            store.find_notebook_by_name("Office").unwrap().map(|nb| nb.id),
            Some(notebook.id)
        );
        assert!(store.find_notebook_by_name("Work").unwrap().is_none());
    }

    #[test]
    fn test_folder_lookup_by_notebook_and_name() {
        let store = setup();
        let notebook = default_notebook(&store);
        let parent = Folder::new("Projects", notebook.id.clone());
        let child = Folder::new("Rust", notebook.id.clone()).with_parent(parent.id.clone());
        store.insert_folder(&parent).unwrap();
        store.insert_folder(&child).unwrap();

        let found = store.find_folder(&notebook.id, "Rust").unwrap().unwrap();
        assert_eq!(found.parent_id.as_deref(), Some(parent.id.as_str()));
        assert!(store.find_folder("other-notebook", "Rust").unwrap().is_none());
        assert_eq!(store.list_folders().unwrap().len(), 2);
    }

    #[test]
    fn test_deleting_folder_cascades_to_descendants() {
        let store = setup();
        let notebook = default_notebook(&store);
        let parent = Folder::new("Parent", notebook.id.clone());
        let child = Folder::new("Child", notebook.id.clone()).with_parent(parent.id.clone());
        store.insert_folder(&parent).unwrap();
        store.insert_folder(&child).unwrap();

        store
            .run("DELETE FROM folders WHERE id = ?", params![parent.id])
            .unwrap();
        assert!(store.get_folder(&child.id).unwrap().is_none());
    }

    #[test]
    fn test_tag_names_are_case_sensitive_and_unique() {
        let store = setup();
        store.insert_tag(&Tag::new("Rust")).unwrap();
        store.insert_tag(&Tag::new("rust")).unwrap();
        assert!(store.insert_tag(&Tag::new("Rust")).is_err());
        assert_eq!(store.list_tags().unwrap().len(), 2);
    }

    #[test]
    fn test_list_live_notes_joins_names_and_excludes_deleted() {
        let store = setup();
        let notebook = default_notebook(&store);
        let folder = Folder::new("Inbox", notebook.id.clone());
        store.insert_folder(&folder).unwrap();

        let mut kept = Note::new("Kept", "body", Some(notebook.id.clone()));
        kept.folder_id = Some(folder.id.clone());
        let removed = Note::new("Removed", "body", Some(notebook.id.clone()));
        store.insert_note(&kept).unwrap();
        store.insert_note(&removed).unwrap();
        store.soft_delete_note(&removed.id).unwrap();

        let rust = Tag::new("rust");
        let sync = Tag::new("sync");
        store.insert_tag(&rust).unwrap();
        store.insert_tag(&sync).unwrap();
        store
            .set_note_tags(&kept.id, &[rust.id.clone(), sync.id.clone()])
            .unwrap();

        let live = store.list_live_notes().unwrap();
        assert_eq!(live.len(), 1);
        let details = &live[0];
        assert_eq!(details.note.id, kept.id);
        assert_eq!(details.notebook_name.as_deref(), Some(notebook.name.as_str()));
        assert_eq!(details.folder_name.as_deref(), Some("Inbox"));
        let mut tags = details.tag_names();
        tags.sort();
        assert_eq!(tags, vec!["rust", "sync"]);

        // Soft-deleted notes are still reachable by id
        assert!(store.get_note(&removed.id).unwrap().unwrap().is_deleted);
    }

    #[test]
    fn test_update_note_overwrites_mutable_fields() {
        let store = setup();
        let mut note = Note::new("Draft", "v1", None);
        store.insert_note(&note).unwrap();

        note.title = "Final".to_string();
        note.content = "v2".to_string();
        note.is_pinned = true;
        note.sort_order = 3;
        note.updated_at = "2099-01-01T00:00:00.000Z".to_string();
        store.update_note(&note).unwrap();

        assert_eq!(store.get_note(&note.id).unwrap(), Some(note));
    }

    #[test]
    fn test_sync_history_newest_first() {
        let store = setup();
        store.record_sync(SyncKind::Push, true, "first", 3).unwrap();
        store.record_sync(SyncKind::Pull, false, "second", 0).unwrap();

        let history = store.list_sync_history(10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].message, "second");
        assert_eq!(history[0].status, "error");
        assert_eq!(history[0].sync_type, "pull");
        assert_eq!(history[1].files_count, 3);
    }

    #[test]
    fn test_sync_history_rejects_counts_beyond_sqlite_range() {
        let store = setup();
        let count = usize::try_from(i64::MAX).unwrap() + 1;
        assert!(matches!(
            store.record_sync(SyncKind::Push, true, "huge", count),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            store.list_sync_history(count),
            Err(Error::InvalidInput(_))
        ));
        assert!(store.list_sync_history(usize::MAX >> 1).unwrap().is_empty());
    }
}
