//! Database connection management

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::migrations;
use crate::error::{Error, Result};
use crate::models::{Notebook, DEFAULT_NOTEBOOK_NAME};

/// Database wrapper for a single `SQLite` connection
///
/// The connection sits behind a mutex so the store can be shared with the
/// sync service's timer tasks. Every statement runs in autocommit mode, so
/// each write is durable as soon as it returns.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations and seeds the default notebook automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let database = Self {
            conn: Mutex::new(conn),
        };
        database.initialize()?;
        tracing::debug!("Opened local store at {}", path.display());
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let database = Self {
            conn: Mutex::new(conn),
        };
        database.initialize()?;
        Ok(database)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.connection()?;
        configure(&conn)?;
        migrations::run(&conn)?;
        ensure_default_notebook(&conn)?;
        Ok(())
    }

    /// Lock and return the underlying connection
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("connection lock poisoned".to_string()))
    }
}

/// Configure `SQLite` pragmas
fn configure(conn: &Connection) -> Result<()> {
    // WAL is unavailable for in-memory databases; ignore the failure there
    conn.pragma_update(None, "journal_mode", "WAL").ok();
    conn.pragma_update(None, "synchronous", "NORMAL").ok();
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

/// Insert the default notebook when the store has none
fn ensure_default_notebook(conn: &Connection) -> Result<()> {
    let existing: Option<String> = conn
        .query_row("SELECT id FROM notebooks LIMIT 1", [], |row| row.get(0))
        .optional()?;
    if existing.is_some() {
        return Ok(());
    }

    let notebook = Notebook::new(DEFAULT_NOTEBOOK_NAME);
    conn.execute(
        "INSERT INTO notebooks (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)",
        params![
            notebook.id,
            notebook.name,
            notebook.created_at,
            notebook.updated_at
        ],
    )?;
    tracing::info!("Created default notebook {}", notebook.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn notebook_count(db: &Database) -> i64 {
        db.connection()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM notebooks", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_open_in_memory_seeds_default_notebook() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(notebook_count(&db), 1);
    }

    #[test]
    fn test_reopen_does_not_duplicate_default_notebook() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("gitnote.db");

        drop(Database::open(&path).unwrap());
        let db = Database::open(&path).unwrap();
        assert_eq!(notebook_count(&db), 1);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let db = Database::open_in_memory().unwrap();
        let enabled: i64 = db
            .connection()
            .unwrap()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
