//! In-process remote store
//!
//! Behaves like the contents API of a Git host: content-addressed hashes,
//! hash-checked updates and deletes, 404 for missing directories. Used by
//! tests and for dry runs without network access.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{
    EntryKind, RemoteCredentials, RemoteEntry, RemoteError, RemoteFile, RemoteProvider,
    RemoteResult, RemoteStore, RemoteUser,
};
use crate::sync::paths::README_PATH;

const README_CONTENT: &str = "# AI Note Sync\n\nNotes synchronized by gitnote.\n";

#[derive(Default)]
struct State {
    files: BTreeMap<String, String>,
    initialized: bool,
    failing_reads: BTreeSet<String>,
    latency: Option<Duration>,
}

/// Remote store held entirely in memory
#[derive(Default)]
pub struct MemoryRemoteStore {
    state: Mutex<State>,
    writes: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryRemoteStore {
    /// An empty store whose repository does not exist yet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file without counting it as a write
    pub fn insert_file(&self, path: &str, content: &str) {
        let mut state = self.lock();
        state.initialized = true;
        state.files.insert(path.to_string(), content.to_string());
    }

    /// Content currently stored at `path`
    pub fn file_content(&self, path: &str) -> Option<String> {
        self.lock().files.get(path).cloned()
    }

    /// All file paths, sorted
    pub fn paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    /// Whether the repository has been created
    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Number of successful `put` calls
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of successful `delete` calls
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Delay every subsequent call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    /// Make reads of `path` fail with a server error
    pub fn fail_reads_for(&self, path: &str) {
        self.lock().failing_reads.insert(path.to_string());
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // State stays consistent across panics; recover the guard.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

/// Hex SHA-256 of the content
pub(crate) fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get(&self, path: &str) -> RemoteResult<RemoteFile> {
        self.simulate_latency().await;
        let state = self.lock();
        if state.failing_reads.contains(path) {
            return Err(RemoteError::Api {
                status: 500,
                message: format!("simulated read failure for {path}"),
            });
        }
        state
            .files
            .get(path)
            .map(|content| RemoteFile {
                content: content.clone(),
                hash: content_hash(content),
            })
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }

    async fn put(
        &self,
        path: &str,
        content: &str,
        expected_hash: Option<&str>,
        _message: &str,
    ) -> RemoteResult<String> {
        self.simulate_latency().await;
        let mut state = self.lock();
        if !state.initialized {
            return Err(RemoteError::NotFound("repository".to_string()));
        }

        let current = state.files.get(path).map(|existing| content_hash(existing));
        match (current.as_deref(), expected_hash) {
            (Some(_), None) => {
                return Err(RemoteError::Conflict(format!(
                    "{path} exists and no hash was supplied"
                )));
            }
            (Some(current), Some(expected)) if current != expected => {
                return Err(RemoteError::Conflict(format!(
                    "{path} does not match the supplied hash"
                )));
            }
            (None, Some(_)) => {
                return Err(RemoteError::Conflict(format!(
                    "{path} does not exist but a hash was supplied"
                )));
            }
            _ => {}
        }

        state.files.insert(path.to_string(), content.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(content_hash(content))
    }

    async fn delete(&self, path: &str, hash: &str, _message: &str) -> RemoteResult<()> {
        self.simulate_latency().await;
        let mut state = self.lock();
        let Some(existing) = state.files.get(path) else {
            return Err(RemoteError::NotFound(path.to_string()));
        };
        if content_hash(existing) != hash {
            return Err(RemoteError::Conflict(format!(
                "{path} does not match the supplied hash"
            )));
        }
        state.files.remove(path);
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list(&self, path: &str) -> RemoteResult<Vec<RemoteEntry>> {
        self.simulate_latency().await;
        let state = self.lock();
        let dir = path.trim_matches('/');
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };

        let mut entries: BTreeMap<String, RemoteEntry> = BTreeMap::new();
        for (file_path, content) in state.files.range(prefix.clone()..) {
            let Some(rest) = file_path.strip_prefix(&prefix) else {
                break;
            };
            let entry = match rest.split_once('/') {
                Some((child, _)) => RemoteEntry {
                    name: child.to_string(),
                    path: format!("{prefix}{child}"),
                    hash: String::new(),
                    kind: EntryKind::Dir,
                },
                None => RemoteEntry {
                    name: rest.to_string(),
                    path: file_path.clone(),
                    hash: content_hash(content),
                    kind: EntryKind::File,
                },
            };
            entries.entry(entry.name.clone()).or_insert(entry);
        }

        if entries.is_empty() && !dir.is_empty() {
            return Err(RemoteError::NotFound(dir.to_string()));
        }
        Ok(entries.into_values().collect())
    }

    async fn ensure_container_exists(&self) -> RemoteResult<()> {
        self.simulate_latency().await;
        let mut state = self.lock();
        if !state.initialized {
            state.initialized = true;
            state
                .files
                .entry(README_PATH.to_string())
                .or_insert_with(|| README_CONTENT.to_string());
            tracing::debug!("Created in-memory remote repository");
        }
        Ok(())
    }
}

/// Provider that accepts a fixed set of tokens and hands out one shared store
pub struct MemoryProvider {
    store: Arc<MemoryRemoteStore>,
    users: HashMap<String, RemoteUser>,
}

impl MemoryProvider {
    #[must_use]
    pub fn new(store: Arc<MemoryRemoteStore>) -> Self {
        Self {
            store,
            users: HashMap::new(),
        }
    }

    /// Accept `token` as belonging to `login`
    #[must_use]
    pub fn with_user(mut self, token: impl Into<String>, login: impl Into<String>) -> Self {
        self.users.insert(
            token.into(),
            RemoteUser {
                login: login.into(),
                name: None,
                avatar_url: None,
            },
        );
        self
    }

    /// The store every `open` call returns
    #[must_use]
    pub fn store(&self) -> Arc<MemoryRemoteStore> {
        Arc::clone(&self.store)
    }
}

#[async_trait]
impl RemoteProvider for MemoryProvider {
    async fn authenticate(&self, token: &str) -> RemoteResult<RemoteUser> {
        self.users
            .get(token)
            .cloned()
            .ok_or_else(|| RemoteError::Unauthorized("Bad credentials".to_string()))
    }

    fn open(&self, credentials: &RemoteCredentials) -> RemoteResult<Arc<dyn RemoteStore>> {
        if !self.users.contains_key(&credentials.token) {
            return Err(RemoteError::Unauthorized("Bad credentials".to_string()));
        }
        Ok(Arc::clone(&self.store) as Arc<dyn RemoteStore>)
    }
}
