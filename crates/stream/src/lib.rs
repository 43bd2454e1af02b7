//! Spatial partition of spatially gated entities.
//!
//! # Invariants
//! - Every tracked entity sits in exactly one leaf: the one whose rectangle
//!   contains its position clipped to the world.
//! - Sector rectangles of siblings are disjoint and cover their parent.
//! - `update_roi` returns every allocated leaf intersecting the region and
//!   nothing else.
//!
//! The tree only moves handles between leaf containers. Positions are read
//! through callbacks, so it never needs access to the object arena.

mod timer;
mod tree;

pub use timer::FrameTimer;
pub use tree::{EntityTree, TreeConfig, TreeStats};

pub fn crate_info() -> &'static str {
    "trellis-stream v0.1.0"
}
