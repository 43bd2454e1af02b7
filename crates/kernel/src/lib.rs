//! Object kernel: the arena that owns every scripted object of a level,
//! the catalog of object types and the entity id source.
//!
//! # Invariants
//! - Handles are generation-checked; a reclaimed slot never answers for an old handle.
//! - Killing is two-phase: objects become zombies first and are reclaimed by `sweep`.
//! - Killing an object kills its whole subtree.

pub mod arena;
pub mod catalog;
pub mod ids;

pub use arena::{Life, Object, ObjectArena, ObjectTraits};
pub use catalog::{TypeCatalog, TypeDescriptor};
pub use ids::IdGenerator;

pub fn crate_info() -> &'static str {
    "trellis-kernel v0.1.0"
}
