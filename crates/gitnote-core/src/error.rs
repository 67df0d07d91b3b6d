//! Error types for gitnote-core

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using gitnote-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gitnote-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Missing or rejected remote credential
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Remote content store failure
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Structural metadata conflicts are waiting for a user decision
    #[error("{0} configuration conflict(s) must be resolved before syncing metadata")]
    Conflict(usize),

    /// The sync service has no remote store attached
    #[error("Sync engine is not initialized")]
    NotInitialized,
}
