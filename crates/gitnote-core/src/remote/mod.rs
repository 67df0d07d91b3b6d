//! Remote content store adapters
//!
//! A remote store is a file tree addressed by slash-separated paths. Every
//! file carries a content hash; updates and deletes must present the current
//! hash (optimistic concurrency).

mod github;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use github::{GitHubProvider, GitHubStore};
pub use memory::{MemoryProvider, MemoryRemoteStore};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote resource not found: {0}")]
    NotFound(String),
    #[error("Remote rejected credentials: {0}")]
    Unauthorized(String),
    #[error("Remote write conflict: {0}")]
    Conflict(String),
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Invalid remote payload: {0}")]
    Decode(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// File content plus the hash required to modify it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub content: String,
    pub hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub path: String,
    pub hash: String,
    pub kind: EntryKind,
}

/// Account the remote credential belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Everything needed to open a store for one repository
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteCredentials {
    pub token: String,
    pub owner: String,
    pub repo: String,
}

impl std::fmt::Debug for RemoteCredentials {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteCredentials")
            .field("token", &"[REDACTED]")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish()
    }
}

/// File operations against one remote repository
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read a file; `NotFound` when absent
    async fn get(&self, path: &str) -> RemoteResult<RemoteFile>;

    /// Create or replace a file and return its new hash
    ///
    /// Replacing an existing file requires its current hash.
    async fn put(
        &self,
        path: &str,
        content: &str,
        expected_hash: Option<&str>,
        message: &str,
    ) -> RemoteResult<String>;

    /// Delete a file at its current hash
    async fn delete(&self, path: &str, hash: &str, message: &str) -> RemoteResult<()>;

    /// List the direct children of a directory; `NotFound` when absent
    async fn list(&self, path: &str) -> RemoteResult<Vec<RemoteEntry>>;

    /// Create the repository and its welcome file if they don't exist yet
    async fn ensure_container_exists(&self) -> RemoteResult<()>;
}

/// Authenticates tokens and opens stores for a Git host
#[async_trait]
pub trait RemoteProvider: Send + Sync {
    /// Resolve the account a token belongs to
    async fn authenticate(&self, token: &str) -> RemoteResult<RemoteUser>;

    /// Open a store for the given repository
    fn open(&self, credentials: &RemoteCredentials) -> RemoteResult<Arc<dyn RemoteStore>>;
}

/// Read a file, mapping `NotFound` to `None`
pub async fn fetch(store: &dyn RemoteStore, path: &str) -> RemoteResult<Option<RemoteFile>> {
    match store.get(path).await {
        Ok(file) => Ok(Some(file)),
        Err(RemoteError::NotFound(_)) => Ok(None),
        Err(error) => Err(error),
    }
}

/// Recursively list every file below `root`; an absent root lists as empty
pub async fn list_files_recursive(
    store: &dyn RemoteStore,
    root: &str,
) -> RemoteResult<Vec<RemoteEntry>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_string()];

    while let Some(dir) = pending.pop() {
        let entries = match store.list(&dir).await {
            Ok(entries) => entries,
            Err(RemoteError::NotFound(_)) => continue,
            Err(error) => return Err(error),
        };
        for entry in entries {
            match entry.kind {
                EntryKind::Dir => pending.push(entry.path),
                EntryKind::File => files.push(entry),
            }
        }
    }

    files.sort_by(|left, right| left.path.cmp(&right.path));
    Ok(files)
}
