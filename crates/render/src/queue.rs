use std::fmt::Write as _;

use trellis_common::{EntityHandle, Vec2};
use trellis_kernel::Object;

/// Flags passed down to every container's render pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderFlags {
    /// Level editor or debug mode: draw entity placeholders instead of sprites.
    pub editor: bool,
    /// Also draw objects that only exist as visual aids.
    pub gizmos: bool,
}

impl RenderFlags {
    pub const EDITOR: u32 = 0x1;
    pub const GIZMOS: u32 = 0x2;

    pub fn bits(self) -> u32 {
        let mut bits = 0;
        if self.editor {
            bits |= Self::EDITOR;
        }
        if self.gizmos {
            bits |= Self::GIZMOS;
        }
        bits
    }

    pub fn from_bits(bits: u32) -> Self {
        Self {
            editor: bits & Self::EDITOR != 0,
            gizmos: bits & Self::GIZMOS != 0,
        }
    }
}

/// How a submitted object should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Regular,
    /// Editor placeholder for an entity.
    Editor,
    Gizmo,
}

/// Draw submission interface implemented by rendering backends.
pub trait RenderQueue {
    fn enqueue(&mut self, handle: EntityHandle, object: &Object, mode: DrawMode);
}

/// A single recorded submission.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub handle: EntityHandle,
    pub type_name: String,
    pub position: Vec2,
    pub mode: DrawMode,
}

/// Render queue that records submissions and can print them.
#[derive(Debug, Default)]
pub struct TextRenderQueue {
    calls: Vec<DrawCall>,
}

impl TextRenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn handles(&self) -> Vec<EntityHandle> {
        self.calls.iter().map(|c| c.handle).collect()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// One line per submission, in submission order.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Render queue ({} draws) ===", self.calls.len());
        for call in &self.calls {
            let _ = writeln!(
                out,
                "  {} {:<20} pos=({:.1}, {:.1}) {:?}",
                call.handle, call.type_name, call.position.x, call.position.y, call.mode
            );
        }
        out
    }
}

impl RenderQueue for TextRenderQueue {
    fn enqueue(&mut self, handle: EntityHandle, object: &Object, mode: DrawMode) {
        self.calls.push(DrawCall {
            handle,
            type_name: object.type_name.clone(),
            position: object.position,
            mode,
        });
    }
}
