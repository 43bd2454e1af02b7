//! Level save state: persistent entities keyed by their stable id.
//!
//! # Invariants
//! - Only persistent, live entities are captured; private entities and level
//!   setup objects never are.
//! - Snapshots are content-addressed: the hash covers every saved entity and
//!   is checked before a snapshot is restored.
//! - Restoring gives each entity back the id it was saved with.
//! - Entities owned by another entity are restored through their owner, so
//!   a round trip never duplicates companions.

mod error;
mod snapshot;
mod store;

pub use error::SnapshotError;
pub use snapshot::{LevelSnapshot, SNAPSHOT_SCHEMA_VERSION, SavedEntity};
pub use store::{IntegrityManifest, ManifestEntry, SnapshotStore, decode, encode};

pub fn crate_info() -> &'static str {
    "trellis-persist v0.1.0"
}
