//! Entity containers: the activation policies applied to stored entities.
//!
//! # Invariants
//! - Containers hold handles, never objects; the arena owns every object.
//! - Killed members are skipped by every pass and dropped by the next
//!   `update` or `render`, together with their registry record.
//! - Gated members outside the region of interest are never selected.
//! - Awake members are selected regardless of the region of interest.

mod container;
mod debug;
mod messenger;

pub use container::{ContainerPolicy, EntityContainer, FrameContext, MSG_RESET};
pub use debug::DebugContainer;
pub use messenger::{MessageLog, Messenger};

pub fn crate_info() -> &'static str {
    "trellis-container v0.1.0"
}
