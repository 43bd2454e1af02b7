//! Developer tooling: read-only inspection of a level's activation state.
//!
//! # Invariants
//! - Inspection never mutates the level.

mod inspector;

pub use inspector::{ActivationInspector, EntityInfo, LevelSummary, Placement};

pub fn crate_info() -> &'static str {
    "trellis-tools v0.1.0"
}
