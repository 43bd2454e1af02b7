//! Render submission interface.
//!
//! # Invariants
//! - Submitting a draw never mutates the object it refers to.
//! - Draw order equals submission order.
//!
//! The activation subsystem only decides which objects are submitted and in
//! which mode; rasterization belongs to whatever implements [`RenderQueue`].
//! [`TextRenderQueue`] records submissions as text for the CLI and tests.

mod queue;

pub use queue::{DrawCall, DrawMode, RenderFlags, RenderQueue, TextRenderQueue};

pub fn crate_info() -> &'static str {
    "trellis-render v0.1.0"
}
