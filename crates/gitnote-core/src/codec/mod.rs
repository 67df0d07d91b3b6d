//! Document formats exchanged with the remote store

pub mod markdown;
pub mod snapshot;

pub use markdown::DecodedNote;
pub use snapshot::{ConfigSnapshot, SNAPSHOT_VERSION, SYNCED_SETTINGS};
