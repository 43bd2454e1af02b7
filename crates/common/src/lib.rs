//! Shared types used by every trellis crate: handles, stable ids,
//! inclusive integer rectangles and entity classification.

mod tags;
mod types;

pub use glam::Vec2;
pub use tags::{
    EntityKind, TAG_AWAKE, TAG_DETACHED, TAG_DISPOSABLE, TAG_ENTITY, TAG_PRIVATE, TagSet,
};
pub use types::{EntityHandle, EntityId, IdParseError, Rect};

pub fn crate_info() -> &'static str {
    "trellis-common v0.1.0"
}
