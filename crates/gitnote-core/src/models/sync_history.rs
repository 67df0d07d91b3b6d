//! Sync history model

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which pass produced a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    /// Local to remote (`sync_all`)
    Push,
    /// Remote to local (`pull_from_github`)
    Pull,
    /// Conflict resolution republish
    Resolve,
}

impl SyncKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Resolve => "resolve",
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded outcome of one sync pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncHistoryEntry {
    /// Row identifier
    pub id: i64,
    /// Pass type (`push`, `pull`, `resolve`)
    pub sync_type: String,
    /// `success` or `error`
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Number of files written or notes merged
    pub files_count: i64,
    /// Completion timestamp (ISO-8601, UTC)
    pub synced_at: String,
}
