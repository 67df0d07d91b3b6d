//! gitnote-core - Core library for gitnote
//!
//! This crate contains the models, the local SQLite store, the settings
//! store, the remote content store adapters and the sync engine used by the
//! gitnote CLI.

pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod settings;
pub mod sync;
mod util;

pub use config::SyncConfig;
pub use db::{LocalStore, SqliteLocalStore};
pub use error::{Error, Result};
pub use models::{ConflictDecision, ConflictKind, ConflictSet, Note, Resolution};
pub use remote::{GitHubProvider, MemoryProvider, MemoryRemoteStore, RemoteProvider, RemoteStore};
pub use settings::{JsonSettingsStore, SettingsStore};
pub use sync::SyncService;
