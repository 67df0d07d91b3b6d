//! Two-way sync between the local store and a Git-hosted repository
//!
//! Remote layout:
//!
//! ```text
//! README.md
//! config/data.json                      notebooks, folders, tags, synced settings
//! notes/<notebook>/<title>_<id8>.md     one document per live note
//! ```

mod conflicts;
mod engine;
pub mod paths;
mod service;

pub use conflicts::{
    apply_resolutions, detect_conflicts, load_conflicts, store_conflicts, ResolutionOutcome,
    ResolvedKeys,
};
pub use engine::{MergeEngine, MetadataOutcome, PullOutcome, PushOutcome};
pub use service::{
    LoginResult, PullResult, ResolveResult, SyncResult, SyncService, SyncStatus, SyncStatusInfo,
    MAX_SYNC_INTERVAL_MINUTES,
};
