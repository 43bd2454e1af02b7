use indexmap::IndexSet;
use trellis_common::{EntityHandle, Rect};
use trellis_kernel::ObjectArena;
use trellis_registry::EntityRegistry;
use trellis_render::{DrawMode, RenderFlags, RenderQueue};

use crate::messenger::Messenger;

pub const MSG_RESET: &str = "onReset";

/// Activation policy of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerPolicy {
    /// Members are active every frame regardless of the region of interest.
    Awake,
    /// Members are active only while their position lies inside the region of interest.
    Gated,
}

/// Mutable frame state shared by the container passes.
pub struct FrameContext<'a> {
    pub arena: &'a mut ObjectArena,
    pub registry: &'a mut EntityRegistry,
    pub roi: Rect,
    /// Objects that receive `lateUpdate` after the primary pass.
    pub late_updates: &'a mut Vec<EntityHandle>,
    /// Members dropped from containers during this pass because they were killed.
    pub purged: Vec<EntityHandle>,
}

impl<'a> FrameContext<'a> {
    pub fn new(
        arena: &'a mut ObjectArena,
        registry: &'a mut EntityRegistry,
        roi: Rect,
        late_updates: &'a mut Vec<EntityHandle>,
    ) -> Self {
        Self {
            arena,
            registry,
            roi,
            late_updates,
            purged: Vec::new(),
        }
    }

    /// Queue every live object of the subtree that implements `lateUpdate`.
    fn queue_late_updates(&mut self, root: EntityHandle) {
        for h in self.arena.components(root) {
            if self
                .arena
                .get(h)
                .is_some_and(|o| o.is_alive() && o.traits.late_update)
            {
                self.late_updates.push(h);
            }
        }
    }
}

/// Set of entity handles sharing one activation policy.
///
/// A container stores handles only; the arena owns the objects. Killed
/// members are dropped lazily by the next `update` or `render`.
#[derive(Debug, Clone)]
pub struct EntityContainer {
    policy: ContainerPolicy,
    members: IndexSet<EntityHandle>,
    paused: bool,
}

impl EntityContainer {
    pub fn new(policy: ContainerPolicy) -> Self {
        Self {
            policy,
            members: IndexSet::new(),
            paused: false,
        }
    }

    pub fn awake() -> Self {
        Self::new(ContainerPolicy::Awake)
    }

    pub fn gated() -> Self {
        Self::new(ContainerPolicy::Gated)
    }

    pub fn policy(&self) -> ContainerPolicy {
        self.policy
    }

    /// Returns false if the entity was already stored here.
    pub fn store(&mut self, handle: EntityHandle) -> bool {
        self.members.insert(handle)
    }

    /// Removing a handle that is not stored is a no-op.
    pub fn remove(&mut self, handle: EntityHandle) -> bool {
        self.members.swap_remove(&handle)
    }

    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.members.contains(&handle)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.members.iter().copied()
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Append the members eligible for processing this frame to `output`.
    ///
    /// Killed members are always skipped. With `skip_inactive`, a paused
    /// container yields nothing and disabled members are skipped. Gated
    /// containers also clip out members positioned outside `roi`; for them,
    /// being inside the region is what makes an entity active.
    pub fn select_active(
        &self,
        arena: &ObjectArena,
        roi: Rect,
        skip_inactive: bool,
        output: &mut Vec<EntityHandle>,
    ) {
        if skip_inactive && self.paused {
            return;
        }
        for &h in &self.members {
            let Some(object) = arena.get(h).filter(|o| o.is_alive()) else {
                continue;
            };
            match self.policy {
                ContainerPolicy::Awake => {
                    if skip_inactive && !object.enabled {
                        continue;
                    }
                }
                ContainerPolicy::Gated => {
                    if !roi.contains(object.position) {
                        continue;
                    }
                }
            }
            output.push(h);
        }
    }

    /// Deliver `message` to every live member and all of its descendants.
    pub fn notify(&self, arena: &ObjectArena, message: &str, messenger: &mut dyn Messenger) {
        for &h in &self.members {
            for d in arena.components(h) {
                if let Some(object) = arena.get(d).filter(|o| o.is_alive()) {
                    messenger.send(d, object, message);
                }
            }
        }
    }

    /// Primary per-frame pass. Paused containers are skipped.
    ///
    /// Awake members are kept enabled. Gated members inside the region of
    /// interest are enabled and woken up; those outside are disabled, and
    /// persistent ones that were awake are sent back to their spawn point and
    /// put to sleep once the spawn point itself is out of the region.
    /// Disposable members are destroyed as soon as they leave the region.
    /// Every enabled member queues its `lateUpdate` receivers.
    ///
    /// The region of interest doubles as the visible area for the spawn point
    /// check, so a spawn point just off camera but inside the region does not
    /// trigger a reset.
    pub fn update(&mut self, ctx: &mut FrameContext<'_>, messenger: &mut dyn Messenger) {
        if self.paused {
            return;
        }

        let snapshot: Vec<EntityHandle> = self.members.iter().copied().collect();
        for h in snapshot {
            if !ctx.arena.is_alive(h) {
                self.purge(ctx, h);
                continue;
            }

            match self.policy {
                ContainerPolicy::Awake => {
                    if let Some(object) = ctx.arena.get_mut(h) {
                        object.enabled = true;
                    }
                    ctx.queue_late_updates(h);
                }
                ContainerPolicy::Gated => self.update_gated(ctx, h, messenger),
            }
        }
    }

    fn update_gated(
        &mut self,
        ctx: &mut FrameContext<'_>,
        h: EntityHandle,
        messenger: &mut dyn Messenger,
    ) {
        let Some(object) = ctx.arena.get(h) else {
            return;
        };
        let inside = ctx.roi.contains(object.position);
        let disposable = object.traits.disposable;

        if inside {
            if let Some(object) = ctx.arena.get_mut(h) {
                object.enabled = true;
            }
            ctx.registry.set_sleeping(h, false);
            ctx.queue_late_updates(h);
        } else if !disposable {
            if !ctx.registry.is_sleeping(h) && ctx.registry.is_persistent(h) {
                let spawn_point = ctx.registry.spawn_point(h);
                // visibility is judged against the region, not a camera rect
                if !ctx.roi.contains(spawn_point) {
                    ctx.arena.set_position(h, spawn_point);
                    for d in ctx.arena.components(h) {
                        if let Some(o) = ctx.arena.get(d).filter(|o| o.is_alive()) {
                            messenger.send(d, o, MSG_RESET);
                        }
                    }
                    ctx.registry.set_sleeping(h, true);
                    tracing::trace!(%h, "entity reset to its spawn point");
                }
            }
            if let Some(object) = ctx.arena.get_mut(h) {
                object.enabled = false;
            }
        } else {
            ctx.arena.kill(h);
            self.purge(ctx, h);
            tracing::trace!(%h, "disposable entity left the region of interest");
        }
    }

    /// Submit members for drawing.
    ///
    /// In editor mode only public, world-space entities inside the region of
    /// interest are drawn, as editor placeholders. Otherwise killed members
    /// are purged, disabled ones skipped, and members outside the region are
    /// clipped unless they are awake or detached; the renderable objects of
    /// each remaining subtree are submitted, gizmos only when requested.
    pub fn render(
        &mut self,
        ctx: &mut FrameContext<'_>,
        flags: RenderFlags,
        queue: &mut dyn RenderQueue,
    ) {
        if flags.editor {
            for &h in &self.members {
                let Some(object) = ctx.arena.get(h).filter(|o| o.is_alive()) else {
                    continue;
                };
                if object.traits.private
                    || object.kind.is_detached()
                    || !ctx.roi.contains(object.position)
                {
                    continue;
                }
                queue.enqueue(h, object, DrawMode::Editor);
            }
            return;
        }

        let snapshot: Vec<EntityHandle> = self.members.iter().copied().collect();
        for h in snapshot {
            let Some(object) = ctx.arena.get(h).filter(|o| o.is_alive()) else {
                self.purge(ctx, h);
                continue;
            };
            if !object.enabled {
                continue;
            }
            if !ctx.roi.contains(object.position) && !object.kind.is_always_active() {
                continue;
            }
            render_subtree(&*ctx.arena, h, flags, queue);
        }
    }

    /// Drop killed members and their records. Returns how many were dropped.
    pub fn purge_zombies(&mut self, ctx: &mut FrameContext<'_>) -> usize {
        let dead: Vec<EntityHandle> = self
            .members
            .iter()
            .copied()
            .filter(|h| !ctx.arena.is_alive(*h))
            .collect();
        for &h in &dead {
            self.purge(ctx, h);
        }
        dead.len()
    }

    fn purge(&mut self, ctx: &mut FrameContext<'_>, h: EntityHandle) {
        self.members.swap_remove(&h);
        ctx.registry.remove(h);
        ctx.purged.push(h);
    }
}

/// Submit the renderable objects an entity is made of. Disabled objects
/// are skipped.
pub(crate) fn render_subtree(
    arena: &ObjectArena,
    root: EntityHandle,
    flags: RenderFlags,
    queue: &mut dyn RenderQueue,
) {
    for h in arena.components(root) {
        let Some(object) = arena.get(h).filter(|o| o.is_alive() && o.enabled) else {
            continue;
        };
        if object.traits.gizmo {
            if flags.gizmos {
                queue.enqueue(h, object, DrawMode::Gizmo);
            }
        } else if object.traits.renderable {
            queue.enqueue(h, object, DrawMode::Regular);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::MessageLog;
    use trellis_common::{EntityKind, EntityId, Vec2};
    use trellis_kernel::{Object, ObjectTraits};
    use trellis_render::TextRenderQueue;

    struct Fixture {
        arena: ObjectArena,
        registry: EntityRegistry,
        late: Vec<EntityHandle>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                arena: ObjectArena::new(),
                registry: EntityRegistry::new(),
                late: Vec::new(),
            }
        }

        fn spawn(&mut self, kind: EntityKind, pos: Vec2, traits: ObjectTraits) -> EntityHandle {
            let h = self.arena.insert(
                Object::new("Thing")
                    .as_entity(kind)
                    .with_position(pos)
                    .with_traits(traits),
                None,
            );
            let persistent = !traits.private;
            let sleeping = !kind.is_always_active();
            self.registry.register(
                h,
                EntityId::from_raw(h.index() as u64 + 1),
                pos,
                persistent,
                sleeping,
            );
            h
        }

        fn ctx(&mut self, roi: Rect) -> FrameContext<'_> {
            FrameContext::new(&mut self.arena, &mut self.registry, roi, &mut self.late)
        }
    }

    fn renderable() -> ObjectTraits {
        ObjectTraits {
            renderable: true,
            ..ObjectTraits::default()
        }
    }

    const ROI: Rect = Rect::new(0, 0, 99, 99);

    #[test]
    fn store_and_remove_are_idempotent() {
        let mut c = EntityContainer::gated();
        let h = EntityHandle::new(0, 0);
        assert!(c.store(h));
        assert!(!c.store(h));
        assert!(c.remove(h));
        assert!(!c.remove(h));
        assert!(c.is_empty());
    }

    #[test]
    fn gated_select_clips_to_roi() {
        let mut f = Fixture::new();
        let inside = f.spawn(EntityKind::Normal, Vec2::new(99.0, 99.0), renderable());
        let outside = f.spawn(EntityKind::Normal, Vec2::new(100.0, 50.0), renderable());
        let mut c = EntityContainer::gated();
        c.store(inside);
        c.store(outside);

        let mut out = Vec::new();
        c.select_active(&f.arena, ROI, true, &mut out);
        assert_eq!(out, vec![inside]);

        out.clear();
        c.select_active(&f.arena, ROI, false, &mut out);
        assert_eq!(out, vec![inside]);
    }

    #[test]
    fn awake_select_ignores_roi() {
        let mut f = Fixture::new();
        let far = f.spawn(EntityKind::Awake, Vec2::new(9999.0, 9999.0), renderable());
        let mut c = EntityContainer::awake();
        c.store(far);
        let mut out = Vec::new();
        c.select_active(&f.arena, ROI, true, &mut out);
        assert_eq!(out, vec![far]);
    }

    #[test]
    fn select_skips_killed_and_disabled() {
        let mut f = Fixture::new();
        let dead = f.spawn(EntityKind::Awake, Vec2::ZERO, renderable());
        let off = f.spawn(EntityKind::Awake, Vec2::ZERO, renderable());
        f.arena.kill(dead);
        f.arena.get_mut(off).unwrap().enabled = false;
        let mut c = EntityContainer::awake();
        c.store(dead);
        c.store(off);

        let mut out = Vec::new();
        c.select_active(&f.arena, ROI, true, &mut out);
        assert!(out.is_empty());

        c.select_active(&f.arena, ROI, false, &mut out);
        assert_eq!(out, vec![off]);
    }

    #[test]
    fn paused_container_yields_nothing_when_skipping_inactive() {
        let mut f = Fixture::new();
        let h = f.spawn(EntityKind::Awake, Vec2::ZERO, renderable());
        let mut c = EntityContainer::awake();
        c.store(h);
        c.pause();

        let mut out = Vec::new();
        c.select_active(&f.arena, ROI, true, &mut out);
        assert!(out.is_empty());
        c.select_active(&f.arena, ROI, false, &mut out);
        assert_eq!(out, vec![h]);

        c.resume();
        assert!(!c.is_paused());
    }

    #[test]
    fn update_wakes_entities_inside_roi() {
        let mut f = Fixture::new();
        let late = ObjectTraits {
            late_update: true,
            ..renderable()
        };
        let h = f.spawn(EntityKind::Normal, Vec2::new(10.0, 10.0), late);
        let mut c = EntityContainer::gated();
        c.store(h);

        let mut log = MessageLog::new();
        let mut ctx = f.ctx(ROI);
        c.update(&mut ctx, &mut log);
        assert!(ctx.purged.is_empty());
        drop(ctx);

        assert!(!f.registry.is_sleeping(h));
        assert!(f.arena.get(h).unwrap().enabled);
        assert_eq!(f.late, vec![h]);
    }

    #[test]
    fn update_resets_persistent_entity_to_spawn_point() {
        let mut f = Fixture::new();
        let spawn = Vec2::new(500.0, 500.0);
        let h = f.spawn(EntityKind::Normal, spawn, renderable());
        let sensor = f.arena.insert(Object::new("Sensor"), Some(h));
        let mut c = EntityContainer::gated();
        c.store(h);
        let mut log = MessageLog::new();

        // wake it up inside a region around its spawn point
        let around_spawn = Rect::new(400, 400, 600, 600);
        c.update(&mut f.ctx(around_spawn), &mut log);
        assert!(!f.registry.is_sleeping(h));

        // it wanders off, then the camera leaves
        f.arena.set_position(h, Vec2::new(700.0, 500.0));
        c.update(&mut f.ctx(ROI), &mut log);

        assert_eq!(f.arena.position(h), Some(spawn));
        assert!(f.registry.is_sleeping(h));
        assert!(!f.arena.get(h).unwrap().enabled);
        assert!(log.received(h, MSG_RESET));
        assert!(log.received(sensor, MSG_RESET));

        // already sleeping: no second reset
        log.clear();
        c.update(&mut f.ctx(ROI), &mut log);
        assert_eq!(log.count(MSG_RESET), 0);
    }

    #[test]
    fn update_does_not_reset_private_entities() {
        let mut f = Fixture::new();
        let private = ObjectTraits {
            private: true,
            ..renderable()
        };
        let h = f.spawn(EntityKind::PrivateHelper, Vec2::new(50.0, 50.0), private);
        let mut c = EntityContainer::gated();
        c.store(h);
        let mut log = MessageLog::new();
        c.update(&mut f.ctx(ROI), &mut log);

        f.arena.set_position(h, Vec2::new(300.0, 300.0));
        c.update(&mut f.ctx(Rect::new(1000, 1000, 1100, 1100)), &mut log);
        assert_eq!(f.arena.position(h), Some(Vec2::new(300.0, 300.0)));
        assert_eq!(log.count(MSG_RESET), 0);
    }

    #[test]
    fn update_destroys_disposable_entities_outside_roi() {
        let mut f = Fixture::new();
        let disposable = ObjectTraits {
            disposable: true,
            ..renderable()
        };
        let h = f.spawn(EntityKind::Normal, Vec2::new(200.0, 0.0), disposable);
        let mut c = EntityContainer::gated();
        c.store(h);
        let mut log = MessageLog::new();
        let mut ctx = f.ctx(ROI);
        c.update(&mut ctx, &mut log);
        assert_eq!(ctx.purged, vec![h]);
        drop(ctx);

        assert!(c.is_empty());
        assert!(!f.arena.is_alive(h));
        assert!(!f.registry.contains(h));
    }

    #[test]
    fn paused_container_skips_update() {
        let mut f = Fixture::new();
        let h = f.spawn(EntityKind::Normal, Vec2::new(10.0, 10.0), renderable());
        let mut c = EntityContainer::gated();
        c.store(h);
        c.pause();
        c.update(&mut f.ctx(ROI), &mut MessageLog::new());
        assert!(f.registry.is_sleeping(h));
    }

    #[test]
    fn render_regular_clips_and_purges() {
        let mut f = Fixture::new();
        let visible = f.spawn(EntityKind::Normal, Vec2::new(1.0, 1.0), renderable());
        let clipped = f.spawn(EntityKind::Normal, Vec2::new(500.0, 1.0), renderable());
        let dead = f.spawn(EntityKind::Normal, Vec2::new(2.0, 2.0), renderable());
        let gizmo = f.arena.insert(
            Object::new("Gizmo").with_traits(ObjectTraits {
                gizmo: true,
                ..ObjectTraits::default()
            }),
            Some(visible),
        );
        f.arena.kill(dead);
        let mut c = EntityContainer::gated();
        for h in [visible, clipped, dead] {
            c.store(h);
        }

        let mut queue = TextRenderQueue::new();
        c.render(&mut f.ctx(ROI), RenderFlags::default(), &mut queue);
        assert_eq!(queue.handles(), vec![visible]);
        assert!(!c.contains(dead));
        assert!(!f.registry.contains(dead));

        queue.clear();
        let flags = RenderFlags {
            editor: false,
            gizmos: true,
        };
        c.render(&mut f.ctx(ROI), flags, &mut queue);
        assert_eq!(queue.handles(), vec![visible, gizmo]);
    }

    #[test]
    fn render_regular_never_clips_awake_entities() {
        let mut f = Fixture::new();
        let hud = f.spawn(EntityKind::Detached, Vec2::new(5000.0, 5000.0), renderable());
        let mut c = EntityContainer::awake();
        c.store(hud);
        let mut queue = TextRenderQueue::new();
        c.render(&mut f.ctx(ROI), RenderFlags::default(), &mut queue);
        assert_eq!(queue.handles(), vec![hud]);
    }

    #[test]
    fn render_editor_skips_private_and_detached() {
        let mut f = Fixture::new();
        let public = f.spawn(EntityKind::Normal, Vec2::new(1.0, 1.0), renderable());
        let private = f.spawn(
            EntityKind::PrivateHelper,
            Vec2::new(1.0, 1.0),
            ObjectTraits {
                private: true,
                ..renderable()
            },
        );
        let detached = f.spawn(
            EntityKind::Detached,
            Vec2::new(1.0, 1.0),
            ObjectTraits {
                private: true,
                ..renderable()
            },
        );
        let mut c = EntityContainer::gated();
        for h in [public, private, detached] {
            c.store(h);
        }
        let mut queue = TextRenderQueue::new();
        let flags = RenderFlags {
            editor: true,
            gizmos: false,
        };
        c.render(&mut f.ctx(ROI), flags, &mut queue);
        assert_eq!(queue.handles(), vec![public]);
        assert_eq!(queue.calls()[0].mode, DrawMode::Editor);
    }

    #[test]
    fn notify_reaches_descendants() {
        let mut f = Fixture::new();
        let h = f.spawn(EntityKind::Normal, Vec2::ZERO, renderable());
        let child = f.arena.insert(Object::new("Child"), Some(h));
        let mut c = EntityContainer::gated();
        c.store(h);
        let mut log = MessageLog::new();
        c.notify(&f.arena, "onPause", &mut log);
        assert!(log.received(h, "onPause"));
        assert!(log.received(child, "onPause"));
    }

    #[test]
    fn purge_zombies_drops_records() {
        let mut f = Fixture::new();
        let a = f.spawn(EntityKind::Normal, Vec2::ZERO, renderable());
        let b = f.spawn(EntityKind::Normal, Vec2::ZERO, renderable());
        f.arena.kill(a);
        let mut c = EntityContainer::gated();
        c.store(a);
        c.store(b);
        assert_eq!(c.purge_zombies(&mut f.ctx(ROI)), 1);
        assert_eq!(c.len(), 1);
        assert!(f.registry.contains(b));
        assert!(!f.registry.contains(a));
    }
}
