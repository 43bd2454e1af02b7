use trellis_common::{EntityHandle, Rect};
use trellis_kernel::ObjectArena;
use trellis_render::{RenderFlags, RenderQueue};

use crate::container::{EntityContainer, FrameContext, render_subtree};
use crate::messenger::Messenger;

/// Container for the debug-mode overlay.
///
/// Members are always selected and always drawn, whatever the region of
/// interest, the inactive-skipping policy or the pause state of the level.
#[derive(Debug, Clone)]
pub struct DebugContainer {
    inner: EntityContainer,
    debug_object: Option<EntityHandle>,
}

impl Default for DebugContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugContainer {
    pub fn new() -> Self {
        Self {
            inner: EntityContainer::awake(),
            debug_object: None,
        }
    }

    pub fn is_in_debug_mode(&self) -> bool {
        self.debug_object.is_some()
    }

    pub fn debug_object(&self) -> Option<EntityHandle> {
        self.debug_object
    }

    /// Store the debug-mode object. Ignored if one is already stored.
    pub fn attach(&mut self, handle: EntityHandle) -> bool {
        if self.debug_object.is_some() {
            return false;
        }
        self.inner.store(handle);
        self.debug_object = Some(handle);
        true
    }

    /// Forget the debug-mode object and hand it back to the caller.
    pub fn detach(&mut self) -> Option<EntityHandle> {
        let handle = self.debug_object.take()?;
        self.inner.remove(handle);
        Some(handle)
    }

    pub fn store(&mut self, handle: EntityHandle) -> bool {
        self.inner.store(handle)
    }

    pub fn remove(&mut self, handle: EntityHandle) -> bool {
        if self.debug_object == Some(handle) {
            self.debug_object = None;
        }
        self.inner.remove(handle)
    }

    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.inner.contains(handle)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.inner.members()
    }

    pub fn select_active(&self, arena: &ObjectArena, roi: Rect, output: &mut Vec<EntityHandle>) {
        self.inner.select_active(arena, roi, false, output);
    }

    pub fn notify(&self, arena: &ObjectArena, message: &str, messenger: &mut dyn Messenger) {
        self.inner.notify(arena, message, messenger);
    }

    pub fn update(&mut self, ctx: &mut FrameContext<'_>, messenger: &mut dyn Messenger) {
        self.inner.update(ctx, messenger);
        if let Some(h) = self.debug_object
            && !self.inner.contains(h)
        {
            tracing::debug!(%h, "debug mode object vanished");
            self.debug_object = None;
        }
    }

    /// Draw every live member subtree. The editor flag is ignored.
    pub fn render(&mut self, ctx: &mut FrameContext<'_>, gizmos: bool, queue: &mut dyn RenderQueue) {
        self.inner.purge_zombies(ctx);
        let flags = RenderFlags {
            editor: false,
            gizmos,
        };
        for h in self.inner.members() {
            render_subtree(&*ctx.arena, h, flags, queue);
        }
    }
}
