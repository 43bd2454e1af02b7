use std::collections::HashSet;
use std::time::{Duration, Instant};

use trellis_common::{
    EntityHandle, EntityId, EntityKind, Rect, TAG_AWAKE, TAG_DETACHED, TAG_ENTITY, TAG_PRIVATE,
    Vec2,
};
use trellis_container::{DebugContainer, EntityContainer, FrameContext, Messenger};
use trellis_kernel::{IdGenerator, Object, ObjectArena, TypeCatalog, TypeDescriptor};
use trellis_registry::EntityRegistry;
use trellis_render::{RenderFlags, RenderQueue};
use trellis_stream::{EntityTree, FrameTimer, TreeStats};

use crate::config::ActivationConfig;
use crate::error::{ConfigError, SpawnError};
use crate::guard::ReferenceGuard;

pub const DEBUG_MODE_OBJECT: &str = "Debug Mode";
pub const MSG_LATE_UPDATE: &str = "lateUpdate";
pub const MSG_EXIT: &str = "exit";

/// How deep the entity definition check looks below a spawned entity.
const MAX_INSPECTION_DEPTH: usize = 2;
/// Companion chains longer than this are cut, which also stops cycles.
const MAX_COMPANION_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Auto,
    Debug,
}

/// Snapshot of the manager's counters.
#[derive(Debug, Clone, Default)]
pub struct ManagerStats {
    pub entities: usize,
    pub awake_entities: usize,
    pub debug_entities: usize,
    pub roi_leaves: usize,
    pub retained: usize,
    pub objects: usize,
    pub spawned_total: u64,
    pub refresh_count: u64,
    pub relocation_count: u64,
    pub refresh_average: Duration,
    pub tree: TreeStats,
}

/// Per-level context object of the activation subsystem.
///
/// Owns the object arena, the registry, the awake and debug containers, the
/// entity tree and the reference guard, and drives them through the frame:
/// `begin_frame`, `update`, external simulation, `late_update`, `render`.
pub struct EntityManager {
    config: ActivationConfig,
    catalog: TypeCatalog,
    arena: ObjectArena,
    registry: EntityRegistry,
    ids: IdGenerator,
    debug: DebugContainer,
    awake: EntityContainer,
    tree: EntityTree,
    guard: ReferenceGuard,
    roi: Rect,
    roi_leaves: Vec<usize>,
    dirty_partition: bool,
    level_size: (i32, i32),
    late_update_queue: Vec<EntityHandle>,
    editor_mode: bool,
    spawned_total: u64,
    refresh_count: u64,
    relocation_count: u64,
    refresh_timer: FrameTimer,
}

impl EntityManager {
    /// Manager with the default configuration.
    pub fn new(catalog: TypeCatalog) -> Self {
        Self::build(ActivationConfig::default(), catalog)
    }

    pub fn with_config(config: ActivationConfig, catalog: TypeCatalog) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, catalog))
    }

    fn build(config: ActivationConfig, catalog: TypeCatalog) -> Self {
        let ids = match config.id_seed {
            Some(seed) => IdGenerator::with_seed(seed),
            None => IdGenerator::from_entropy(),
        };
        let tree = EntityTree::new(config.tree_config());
        let level_size = tree.world_size();
        Self {
            refresh_timer: FrameTimer::new(config.timer_capacity),
            config,
            catalog,
            arena: ObjectArena::new(),
            registry: EntityRegistry::new(),
            ids,
            debug: DebugContainer::new(),
            awake: EntityContainer::awake(),
            tree,
            guard: ReferenceGuard::new(),
            roi: Rect::default(),
            roi_leaves: Vec::new(),
            dirty_partition: false,
            level_size,
            late_update_queue: Vec::new(),
            editor_mode: false,
            spawned_total: 0,
            refresh_count: 0,
            relocation_count: 0,
        }
    }

    // --- Spawning ---

    /// Spawn an entity of type `type_name` at a world position.
    pub fn spawn_entity(
        &mut self,
        type_name: &str,
        position: Vec2,
    ) -> Result<EntityHandle, SpawnError> {
        self.spawn_internal(type_name, position, None, Route::Auto, 0)
    }

    /// Spawn an entity at the origin.
    pub fn spawn(&mut self, type_name: &str) -> Result<EntityHandle, SpawnError> {
        self.spawn_entity(type_name, Vec2::ZERO)
    }

    /// Spawn an entity owned by another entity. It is routed like any other
    /// entity but dies with its parent. Detached parents only accept
    /// detached children.
    pub fn spawn_child_entity(
        &mut self,
        parent: EntityHandle,
        type_name: &str,
        position: Vec2,
    ) -> Result<EntityHandle, SpawnError> {
        let parent_kind = match self.arena.get(parent) {
            Some(o) if o.is_alive() && o.is_entity => o.kind,
            _ => {
                let err = SpawnError::InvalidParent {
                    type_name: type_name.to_string(),
                    parent,
                };
                tracing::error!(%err, "spawn rejected");
                return Err(err);
            }
        };
        if parent_kind.is_detached() && !self.catalog.has_tag(type_name, TAG_DETACHED) {
            let err = SpawnError::DetachedParent {
                type_name: type_name.to_string(),
                parent,
            };
            tracing::error!(%err, "spawn rejected");
            return Err(err);
        }
        self.spawn_internal(type_name, position, Some(parent), Route::Auto, 0)
    }

    fn validate_type(&mut self, type_name: &str) -> Result<TypeDescriptor, SpawnError> {
        if !self.catalog.exists(type_name) {
            let err = SpawnError::UnknownType(type_name.to_string());
            tracing::error!(%err, "spawn rejected");
            return Err(err);
        }
        if !self.catalog.has_tag(type_name, TAG_ENTITY) {
            let err = SpawnError::NotAnEntity(type_name.to_string());
            tracing::error!(%err, "spawn rejected");
            return Err(err);
        }
        if self.catalog.has_tag(type_name, TAG_DETACHED)
            && !self.catalog.has_tag(type_name, TAG_PRIVATE)
        {
            tracing::warn!(type_name, "entity is tagged \"detached\" but not \"private\"; tagging it \"private\"");
            self.catalog.add_tag(type_name, TAG_PRIVATE);
        }
        self.catalog
            .get(type_name)
            .cloned()
            .ok_or_else(|| SpawnError::UnknownType(type_name.to_string()))
    }

    fn spawn_internal(
        &mut self,
        type_name: &str,
        position: Vec2,
        parent: Option<EntityHandle>,
        route: Route,
        depth: usize,
    ) -> Result<EntityHandle, SpawnError> {
        let descriptor = self.validate_type(type_name)?;
        let kind = EntityKind::classify(&descriptor.tags);

        let mut object = Object::new(type_name)
            .as_entity(kind)
            .with_position(position)
            .with_traits(descriptor.traits());
        let gated = route == Route::Auto && !kind.is_always_active();
        if gated && !self.roi.contains(position) {
            object.enabled = false;
        }
        let handle = self.arena.insert(object, parent);

        let id = self.ids.next_id();
        let is_persistent = !(descriptor.tags.contains(TAG_PRIVATE)
            || self.catalog.is_setup_object(type_name));
        let is_sleeping = !kind.is_always_active();
        self.registry
            .register(handle, id, position, is_persistent, is_sleeping);

        match route {
            Route::Debug => {
                self.debug.attach(handle);
            }
            Route::Auto if kind.is_always_active() => {
                self.awake.store(handle);
            }
            Route::Auto => {
                self.tree.bubble_down(handle, position);
                self.dirty_partition = true;
            }
        }

        self.guard.retain(handle);
        self.spawn_companions(handle, &descriptor.companions, depth);
        self.inspect_subtree(handle, true, 0);
        self.spawned_total += 1;

        tracing::debug!(type_name, %handle, %id, ?kind, "entity spawned");
        Ok(handle)
    }

    /// Spawn the companion objects declared by a type as children of `owner`.
    /// Companions tagged "entity" go through the full spawn path; unknown
    /// ones are skipped with a warning.
    fn spawn_companions(&mut self, owner: EntityHandle, companions: &[String], depth: usize) {
        if companions.is_empty() {
            return;
        }
        if depth >= MAX_COMPANION_DEPTH {
            tracing::warn!(%owner, "companion chain too deep; not spawning further companions");
            return;
        }
        let position = self.arena.position(owner).unwrap_or_default();
        for name in companions {
            let Some(descriptor) = self.catalog.get(name).cloned() else {
                tracing::warn!(companion = %name, %owner, "companion object doesn't exist; skipping it");
                continue;
            };
            if descriptor.tags.contains(TAG_ENTITY) {
                if let Err(err) =
                    self.spawn_internal(name, position, Some(owner), Route::Auto, depth + 1)
                {
                    tracing::warn!(%err, %owner, "companion entity skipped");
                }
                continue;
            }
            let child = self.arena.insert(
                Object::new(name.as_str())
                    .with_position(position)
                    .with_traits(descriptor.traits()),
                Some(owner),
            );
            self.spawn_companions(child, &descriptor.companions, depth + 1);
        }
    }

    /// Check the entity/component contract below `root`: an object that is
    /// not an entity must not own objects tagged "entity". Offending types
    /// are retagged so that later spawns behave. Returns true if anything
    /// was repaired.
    fn inspect_subtree(&mut self, root: EntityHandle, root_is_entity: bool, depth: usize) -> bool {
        let Some(root_object) = self.arena.get(root) else {
            return false;
        };
        let root_name = root_object.type_name.clone();
        let children = root_object.children().to_vec();

        let mut fixed_root = false;
        let mut fixed_descendant = false;
        for child in children {
            let Some(child_name) = self.arena.get(child).map(|o| o.type_name.clone()) else {
                continue;
            };
            let child_is_entity = self.catalog.has_tag(&child_name, TAG_ENTITY);

            if !root_is_entity && child_is_entity {
                for tag in [TAG_ENTITY, TAG_PRIVATE, TAG_AWAKE, TAG_DETACHED] {
                    self.catalog.add_tag(&root_name, tag);
                }
                tracing::warn!(object = %child_name, "object violates the definition of entity");
                fixed_root = true;
            }

            if depth < MAX_INSPECTION_DEPTH
                && self.inspect_subtree(child, child_is_entity, depth + 1)
            {
                fixed_descendant = true;
            }
        }

        if fixed_root {
            tracing::warn!(object = %root_name, "object should be tagged \"entity\"");
        }
        fixed_root || fixed_descendant
    }

    // --- Lookups ---

    /// First live entity of the given type. Types not tagged "entity" never match.
    pub fn find_entity_by_type(&self, type_name: &str) -> Option<EntityHandle> {
        if !self.catalog.has_tag(type_name, TAG_ENTITY) {
            return None;
        }
        self.entities_of_type(type_name).next()
    }

    pub fn find_entities_by_type(&self, type_name: &str) -> Vec<EntityHandle> {
        if !self.catalog.has_tag(type_name, TAG_ENTITY) {
            return Vec::new();
        }
        self.entities_of_type(type_name).collect()
    }

    fn entities_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = EntityHandle> + 'a {
        self.arena
            .iter()
            .filter(move |(h, o)| {
                o.is_alive() && o.is_entity && o.type_name == type_name && self.registry.contains(*h)
            })
            .map(|(h, _)| h)
    }

    /// Resolve the textual form of a stable id.
    pub fn entity_by_id(&mut self, id: &str) -> Option<EntityHandle> {
        let id: EntityId = id.parse().ok()?;
        self.entity_with_id(id)
    }

    pub fn entity_with_id(&mut self, id: EntityId) -> Option<EntityHandle> {
        let arena = &self.arena;
        self.registry.lookup_by_id(id, |h| arena.is_alive(h))
    }

    /// Textual id of an entity, or an empty string if it has none.
    pub fn id_of(&self, handle: EntityHandle) -> String {
        self.registry
            .id_of(handle)
            .map(|id| id.to_string())
            .unwrap_or_default()
    }

    /// Override the stable id of an entity, e.g. when restoring a save.
    pub fn set_entity_id(&mut self, handle: EntityHandle, id: EntityId) {
        self.registry.set_id(handle, id);
    }

    pub fn set_entity_persistent(&mut self, handle: EntityHandle, is_persistent: bool) {
        self.registry.set_persistent(handle, is_persistent);
    }

    // --- Region of interest ---

    /// Set the region of interest from a camera rectangle. Re-setting the
    /// same rectangle does nothing unless the partition is dirty.
    pub fn set_region_of_interest(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let roi = Rect::from_xywh(x, y, width, height);
        if !self.dirty_partition && roi == self.roi {
            return;
        }
        self.roi = roi;
        self.refresh_partition();
    }

    pub fn roi(&self) -> Rect {
        self.roi
    }

    pub fn is_inside_roi(&self, position: Vec2) -> bool {
        self.roi.contains(position)
    }

    /// Leaves of the entity tree intersecting the region of interest.
    pub fn roi_leaves(&self) -> &[usize] {
        &self.roi_leaves
    }

    /// Track a new level size. Takes effect at the next refresh.
    pub fn set_world_size(&mut self, width: i32, height: i32) {
        if self.level_size != (width, height) {
            self.level_size = (width, height);
            self.dirty_partition = true;
        }
    }

    pub fn is_partition_dirty(&self) -> bool {
        self.dirty_partition
    }

    fn ensure_partition(&mut self) {
        if self.dirty_partition {
            self.refresh_partition();
        }
    }

    fn refresh_partition(&mut self) {
        let _span = tracing::info_span!("refresh_partition").entered();
        let start = Instant::now();
        let arena = &self.arena;
        let position_of = |h: EntityHandle| arena.get(h).filter(|o| o.is_alive()).map(|o| o.position);

        for &leaf in &self.roi_leaves {
            self.tree.bubble_up_leaf(leaf, position_of);
        }

        let (width, height) = self.level_size;
        if self.tree.update_world_size(width, height) {
            tracing::info!(width, height, "world size has changed; relocating all entities");
            self.tree.bubble_up_all(position_of);
            self.relocation_count += 1;
        }

        self.tree.prune_empty();
        self.tree.update_roi(&mut self.roi_leaves, self.roi);
        self.dirty_partition = false;
        self.refresh_count += 1;
        self.refresh_timer.record(start.elapsed());

        tracing::trace!(
            roi = %self.roi,
            leaves = self.roi_leaves.len(),
            "partition refreshed"
        );
    }

    /// Number of partition refreshes so far.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    // --- Frame passes ---

    /// Start a frame: forget last frame's late update requests.
    pub fn begin_frame(&mut self) {
        self.late_update_queue.clear();
    }

    /// Primary pass over the debug container, the awake container and the
    /// gated containers intersecting the region of interest, in that order.
    pub fn update(&mut self, messenger: &mut dyn Messenger) {
        self.ensure_partition();
        let _span = tracing::info_span!("entity_update").entered();

        let mut ctx = FrameContext::new(
            &mut self.arena,
            &mut self.registry,
            self.roi,
            &mut self.late_update_queue,
        );
        self.debug.update(&mut ctx, messenger);
        self.awake.update(&mut ctx, messenger);
        for &leaf in &self.roi_leaves {
            if let Some(container) = self.tree.leaf_mut(leaf) {
                container.update(&mut ctx, messenger);
            }
        }
        let purged = ctx.purged;
        self.tree.forget(&purged);
    }

    pub fn add_to_late_update_queue(&mut self, handle: EntityHandle) {
        self.late_update_queue.push(handle);
    }

    /// Deliver `lateUpdate` to every queued object still alive.
    pub fn late_update(&mut self, messenger: &mut dyn Messenger) {
        let _span = tracing::info_span!("entity_late_update").entered();
        for h in std::mem::take(&mut self.late_update_queue) {
            if let Some(object) = self.arena.get(h).filter(|o| o.is_alive()) {
                messenger.send(h, object, MSG_LATE_UPDATE);
            }
        }
    }

    /// Submit drawable objects: debug, awake, then gated containers.
    pub fn render(&mut self, gizmos: bool, queue: &mut dyn RenderQueue) {
        self.ensure_partition();
        let flags = RenderFlags {
            editor: self.editor_mode || self.is_in_debug_mode(),
            gizmos,
        };

        let mut ctx = FrameContext::new(
            &mut self.arena,
            &mut self.registry,
            self.roi,
            &mut self.late_update_queue,
        );
        self.debug.render(&mut ctx, gizmos, queue);
        self.awake.render(&mut ctx, flags, queue);
        for &leaf in &self.roi_leaves {
            if let Some(container) = self.tree.leaf_mut(leaf) {
                container.render(&mut ctx, flags, queue);
            }
        }
        let purged = ctx.purged;
        self.tree.forget(&purged);
    }

    /// Entities eligible for processing: debug, awake, then gated members
    /// inside the region of interest.
    pub fn active_entities(&mut self, skip_inactive: bool) -> Vec<EntityHandle> {
        self.ensure_partition();
        let mut out = Vec::new();
        self.debug.select_active(&self.arena, self.roi, &mut out);
        self.awake
            .select_active(&self.arena, self.roi, skip_inactive, &mut out);
        for &leaf in &self.roi_leaves {
            if let Some(container) = self.tree.leaf(leaf) {
                container.select_active(&self.arena, self.roi, skip_inactive, &mut out);
            }
        }
        out
    }

    /// Inactive entities are only worth listing in the editor or in debug mode.
    pub fn skip_inactive_policy(&self) -> bool {
        !(self.editor_mode || self.is_in_debug_mode())
    }

    /// Send `message` to every entity of every container, gated ones
    /// included regardless of the region of interest.
    pub fn notify_all(&self, message: &str, messenger: &mut dyn Messenger) {
        self.debug.notify(&self.arena, message, messenger);
        self.awake.notify(&self.arena, message, messenger);
        for (_, leaf) in self.tree.leaves() {
            leaf.notify(&self.arena, message, messenger);
        }
    }

    /// Pause the awake and gated containers. The debug container keeps running.
    pub fn pause_containers(&mut self) {
        self.awake.pause();
        self.tree.pause();
    }

    pub fn resume_containers(&mut self) {
        self.awake.resume();
        self.tree.resume();
    }

    // --- Debug and editor modes ---

    /// Spawn the debug-mode object if it is not there yet.
    pub fn enter_debug_mode(&mut self) -> Result<EntityHandle, SpawnError> {
        if let Some(handle) = self.debug.debug_object() {
            return Ok(handle);
        }
        if !self.catalog.exists(DEBUG_MODE_OBJECT) {
            self.catalog.register(
                TypeDescriptor::new(DEBUG_MODE_OBJECT)
                    .tagged(&[TAG_ENTITY, TAG_AWAKE, TAG_PRIVATE])
                    .renderable(),
            );
        }
        let handle = self.spawn_internal(DEBUG_MODE_OBJECT, Vec2::ZERO, None, Route::Debug, 0)?;
        tracing::debug!(%handle, "entered debug mode");
        Ok(handle)
    }

    /// Tell the debug-mode object to exit and destroy it. No-op outside debug mode.
    pub fn exit_debug_mode(&mut self, messenger: &mut dyn Messenger) {
        let Some(handle) = self.debug.detach() else {
            return;
        };
        if let Some(object) = self.arena.get(handle).filter(|o| o.is_alive()) {
            messenger.send(handle, object, MSG_EXIT);
        }
        self.arena.kill(handle);
        self.registry.remove(handle);
        tracing::debug!(%handle, "left debug mode");
    }

    pub fn is_in_debug_mode(&self) -> bool {
        self.debug.is_in_debug_mode()
    }

    pub fn debug_mode_object(&self) -> Option<EntityHandle> {
        self.debug.debug_object()
    }

    pub fn set_editor_mode(&mut self, enabled: bool) {
        self.editor_mode = enabled;
    }

    pub fn is_editor_mode(&self) -> bool {
        self.editor_mode
    }

    // --- Entity state ---

    pub fn position(&self, handle: EntityHandle) -> Option<Vec2> {
        self.arena.get(handle).filter(|o| o.is_alive()).map(|o| o.position)
    }

    /// Move an object. Gated entities are re-homed in the tree right away.
    pub fn set_position(&mut self, handle: EntityHandle, position: Vec2) -> bool {
        if !self.arena.is_alive(handle) {
            return false;
        }
        self.arena.set_position(handle, position);
        if self.tree.contains(handle) && self.tree.bubble_up(handle, position) {
            self.dirty_partition = true;
        }
        true
    }

    /// Re-home a gated entity after collaborators moved it.
    pub fn bubble_up(&mut self, handle: EntityHandle) -> bool {
        let Some(position) = self.position(handle) else {
            return false;
        };
        if !self.tree.contains(handle) {
            return false;
        }
        let moved = self.tree.bubble_up(handle, position);
        if moved {
            self.dirty_partition = true;
        }
        moved
    }

    /// Kill an entity and everything it owns. Containers drop it lazily.
    pub fn kill_entity(&mut self, handle: EntityHandle) -> bool {
        let killed = self.arena.kill(handle);
        if killed {
            self.dirty_partition = true;
        }
        killed
    }

    /// Garbage collection checkpoint.
    ///
    /// Drops killed entities from every container and the registry, then
    /// reclaims every object that is killed, or that neither the reference
    /// guard nor a container reaches. Returns the number of reclaimed objects.
    pub fn collect_garbage(&mut self) -> usize {
        let _span = tracing::info_span!("collect_garbage").entered();

        let mut ctx = FrameContext::new(
            &mut self.arena,
            &mut self.registry,
            self.roi,
            &mut self.late_update_queue,
        );
        self.awake.purge_zombies(&mut ctx);
        for (_, leaf) in self.tree.leaves_mut() {
            leaf.purge_zombies(&mut ctx);
        }
        let purged = ctx.purged;
        self.tree.forget(&purged);

        let roots: Vec<EntityHandle> = self
            .guard
            .iter()
            .chain(self.debug.members())
            .chain(self.awake.members())
            .chain(self.tree.leaves().flat_map(|(_, c)| c.members().collect::<Vec<_>>()))
            .collect();
        let mut reachable = HashSet::new();
        for root in roots {
            reachable.extend(self.arena.subtree(root));
        }

        let reclaimed = self.arena.sweep(|h, _| reachable.contains(&h));

        let arena = &self.arena;
        let stale_records: Vec<EntityHandle> = self
            .registry
            .records()
            .iter()
            .map(|r| r.handle)
            .filter(|h| !arena.exists(*h))
            .collect();
        for h in &stale_records {
            self.registry.remove(*h);
            self.tree.remove(*h);
            self.awake.remove(*h);
            self.debug.remove(*h);
        }
        let released: Vec<EntityHandle> = self.guard.iter().filter(|h| !arena.exists(*h)).collect();
        for h in released {
            self.guard.release(h);
        }

        tracing::debug!(reclaimed, "garbage collected");
        reclaimed
    }

    /// Release every guard retention. Entities no container references
    /// become collectable.
    pub fn clear_guard(&mut self) {
        self.guard.clear();
    }

    /// Tear the level down: kill every entity, clear the guard and reclaim
    /// everything.
    pub fn end_level(&mut self) {
        let handles: Vec<EntityHandle> = self.registry.records().iter().map(|r| r.handle).collect();
        for h in handles {
            self.arena.kill(h);
        }
        self.debug.detach();
        self.guard.clear();
        self.collect_garbage();
        self.roi_leaves.clear();
        self.late_update_queue.clear();
        self.dirty_partition = true;
        tracing::info!("level torn down");
    }

    /// Mark a type as a level setup object; its instances are not persisted.
    pub fn declare_setup_object(&mut self, type_name: &str) {
        self.catalog.declare_setup_object(type_name);
    }

    // --- Accessors ---

    pub fn config(&self) -> &ActivationConfig {
        &self.config
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut TypeCatalog {
        &mut self.catalog
    }

    pub fn arena(&self) -> &ObjectArena {
        &self.arena
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn tree(&self) -> &EntityTree {
        &self.tree
    }

    /// Take a gated entity out of the entity tree without killing it. It is
    /// no longer selected or updated, and survives garbage collection only
    /// while the reference guard retains it. Returns whether it was tracked.
    pub fn detach_from_partition(&mut self, handle: EntityHandle) -> bool {
        let detached = self.tree.remove(handle);
        if detached {
            tracing::debug!(%handle, "entity detached from partition");
            self.dirty_partition = true;
        }
        detached
    }

    pub fn awake_container(&self) -> &EntityContainer {
        &self.awake
    }

    pub fn debug_container(&self) -> &DebugContainer {
        &self.debug
    }

    pub fn guard(&self) -> &ReferenceGuard {
        &self.guard
    }

    pub fn refresh_timer(&self) -> &FrameTimer {
        &self.refresh_timer
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            entities: self.registry.len(),
            awake_entities: self.awake.len(),
            debug_entities: self.debug.len(),
            roi_leaves: self.roi_leaves.len(),
            retained: self.guard.len(),
            objects: self.arena.len(),
            spawned_total: self.spawned_total,
            refresh_count: self.refresh_count,
            relocation_count: self.relocation_count,
            refresh_average: self.refresh_timer.average(),
            tree: self.tree.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_common::TAG_DISPOSABLE;
    use trellis_container::MessageLog;
    use trellis_render::TextRenderQueue;

    fn catalog() -> TypeCatalog {
        let mut catalog = TypeCatalog::new();
        catalog.register(
            TypeDescriptor::new("Enemy")
                .tagged(&[TAG_ENTITY])
                .renderable()
                .with_late_update(),
        );
        catalog.register(
            TypeDescriptor::new("Player")
                .tagged(&[TAG_ENTITY, TAG_AWAKE])
                .renderable(),
        );
        catalog.register(TypeDescriptor::new("Camera").tagged(&[TAG_ENTITY, TAG_DETACHED]));
        catalog.register(TypeDescriptor::new("Coin").tagged(&[TAG_ENTITY, TAG_DISPOSABLE]));
        catalog.register(TypeDescriptor::new("Decor").renderable());
        catalog.register(
            TypeDescriptor::new("Turret")
                .tagged(&[TAG_ENTITY])
                .with_companions(&["Mount"]),
        );
        catalog.register(TypeDescriptor::new("Mount").with_companions(&["Gun"]));
        catalog.register(TypeDescriptor::new("Gun").tagged(&[TAG_ENTITY]));
        catalog
    }

    fn manager() -> EntityManager {
        let config = ActivationConfig {
            id_seed: Some(42),
            ..ActivationConfig::default()
        };
        let mut manager = EntityManager::with_config(config, catalog()).unwrap();
        manager.set_region_of_interest(0.0, 0.0, 640.0, 480.0);
        manager
    }

    #[test]
    fn detached_entity_leaves_selection_but_stays_alive() {
        let mut m = manager();
        let enemy = m.spawn_entity("Enemy", Vec2::new(100.0, 100.0)).unwrap();
        let player = m.spawn("Player").unwrap();
        assert!(m.active_entities(true).contains(&enemy));

        assert!(m.detach_from_partition(enemy));
        assert!(!m.detach_from_partition(enemy));
        assert!(!m.detach_from_partition(player), "awake entities are not in the tree");
        assert!(!m.tree().contains(enemy));
        assert!(!m.active_entities(true).contains(&enemy));
        assert!(m.arena().is_alive(enemy));
        assert!(m.registry().contains(enemy));
    }

    #[test]
    fn spawn_routes_by_kind() {
        let mut m = manager();
        let enemy = m.spawn_entity("Enemy", Vec2::new(100.0, 100.0)).unwrap();
        let player = m.spawn_entity("Player", Vec2::new(9000.0, 9000.0)).unwrap();
        let camera = m.spawn("Camera").unwrap();

        assert!(m.tree().contains(enemy));
        assert!(m.awake_container().contains(player));
        assert!(m.awake_container().contains(camera));
        assert!(!m.tree().contains(player));
        assert!(m.is_partition_dirty());
        assert!(m.guard().is_retained(enemy));
        assert_eq!(m.registry().len(), 3);
    }

    #[test]
    fn spawn_outside_roi_starts_disabled() {
        let mut m = manager();
        let far = m.spawn_entity("Enemy", Vec2::new(5000.0, 5000.0)).unwrap();
        let near = m.spawn_entity("Enemy", Vec2::new(10.0, 10.0)).unwrap();
        assert!(!m.arena().get(far).unwrap().enabled);
        assert!(m.arena().get(near).unwrap().enabled);
    }

    #[test]
    fn spawn_errors() {
        let mut m = manager();
        assert_eq!(
            m.spawn("Nope"),
            Err(SpawnError::UnknownType("Nope".into()))
        );
        assert_eq!(
            m.spawn("Decor"),
            Err(SpawnError::NotAnEntity("Decor".into()))
        );
        assert!(m.registry().is_empty());
        assert!(m.arena().is_empty());
    }

    #[test]
    fn detached_type_is_made_private() {
        let mut m = manager();
        assert!(!m.catalog().has_tag("Camera", TAG_PRIVATE));
        let camera = m.spawn("Camera").unwrap();
        assert!(m.catalog().has_tag("Camera", TAG_PRIVATE));
        assert!(!m.registry().is_persistent(camera));
        assert!(!m.registry().is_sleeping(camera));
    }

    #[test]
    fn persistence_and_sleep_flags() {
        let mut m = manager();
        m.declare_setup_object("Coin");
        let enemy = m.spawn("Enemy").unwrap();
        let coin = m.spawn("Coin").unwrap();
        assert!(m.registry().is_persistent(enemy));
        assert!(m.registry().is_sleeping(enemy));
        assert!(!m.registry().is_persistent(coin));
    }

    #[test]
    fn companions_are_children_of_their_owner() {
        let mut m = manager();
        let turret = m.spawn_entity("Turret", Vec2::new(5.0, 5.0)).unwrap();
        let children = m.arena().get(turret).unwrap().children().to_vec();
        assert_eq!(children.len(), 1);
        let mount = children[0];
        assert_eq!(m.arena().get(mount).unwrap().type_name, "Mount");
        assert_eq!(m.arena().position(mount), Some(Vec2::new(5.0, 5.0)));
        assert!(!m.registry().contains(mount));

        let gun = m.arena().get(mount).unwrap().children()[0];
        assert!(m.arena().get(gun).unwrap().is_entity);
        assert!(m.registry().contains(gun));
        assert!(m.tree().contains(gun));
        assert_eq!(m.registry().len(), 2);
    }

    #[test]
    fn inspection_retags_offending_component() {
        let mut m = manager();
        assert!(!m.catalog().has_tag("Mount", TAG_ENTITY));
        m.spawn("Turret").unwrap();
        for tag in [TAG_ENTITY, TAG_PRIVATE, TAG_AWAKE, TAG_DETACHED] {
            assert!(m.catalog().has_tag("Mount", tag), "missing {tag}");
        }
        assert!(!m.catalog().has_tag("Turret", TAG_AWAKE));
    }

    #[test]
    fn child_entity_requires_live_parent() {
        let mut m = manager();
        let enemy = m.spawn("Enemy").unwrap();
        let child = m
            .spawn_child_entity(enemy, "Coin", Vec2::new(1.0, 1.0))
            .unwrap();
        assert_eq!(m.arena().get(child).unwrap().parent(), Some(enemy));
        assert!(m.registry().contains(child));

        m.kill_entity(enemy);
        assert!(!m.arena().is_alive(child));
        assert!(matches!(
            m.spawn_child_entity(enemy, "Coin", Vec2::ZERO),
            Err(SpawnError::InvalidParent { .. })
        ));
    }

    #[test]
    fn detached_parent_rejects_world_children() {
        let mut m = manager();
        let camera = m.spawn("Camera").unwrap();
        assert!(matches!(
            m.spawn_child_entity(camera, "Enemy", Vec2::ZERO),
            Err(SpawnError::DetachedParent { .. })
        ));
        assert!(m.spawn_child_entity(camera, "Camera", Vec2::ZERO).is_ok());
    }

    #[test]
    fn find_by_type_ignores_non_entities() {
        let mut m = manager();
        assert_eq!(m.find_entity_by_type("Enemy"), None);
        let a = m.spawn("Enemy").unwrap();
        let b = m.spawn("Enemy").unwrap();
        assert_eq!(m.find_entity_by_type("Enemy"), Some(a));
        assert_eq!(m.find_entities_by_type("Enemy"), vec![a, b]);
        assert_eq!(m.find_entity_by_type("Mount"), None);
        m.kill_entity(a);
        assert_eq!(m.find_entity_by_type("Enemy"), Some(b));
    }

    #[test]
    fn id_round_trip() {
        let mut m = manager();
        let enemy = m.spawn("Enemy").unwrap();
        let text = m.id_of(enemy);
        assert!(!text.is_empty());
        assert_eq!(m.entity_by_id(&text), Some(enemy));
        assert_eq!(m.entity_by_id("not hex"), None);
        assert_eq!(m.id_of(EntityHandle::new(999, 0)), "");
    }

    #[test]
    fn same_roi_twice_does_not_refresh() {
        let mut m = manager();
        let before = m.refresh_count();
        m.set_region_of_interest(0.0, 0.0, 640.0, 480.0);
        assert_eq!(m.refresh_count(), before);
        m.set_region_of_interest(0.5, 0.0, 640.0, 480.0);
        assert_eq!(m.refresh_count(), before, "truncated rect is unchanged");
        m.set_region_of_interest(1.0, 0.0, 640.0, 480.0);
        assert_eq!(m.refresh_count(), before + 1);
    }

    #[test]
    fn dirty_partition_forces_refresh() {
        let mut m = manager();
        let before = m.refresh_count();
        m.spawn("Enemy").unwrap();
        m.set_region_of_interest(0.0, 0.0, 640.0, 480.0);
        assert_eq!(m.refresh_count(), before + 1);
        assert!(!m.is_partition_dirty());
    }

    #[test]
    fn update_delivers_late_updates_in_order() {
        let mut m = manager();
        let a = m.spawn_entity("Enemy", Vec2::new(10.0, 10.0)).unwrap();
        let b = m.spawn_entity("Enemy", Vec2::new(20.0, 10.0)).unwrap();
        m.spawn_entity("Enemy", Vec2::new(3000.0, 3000.0)).unwrap();

        let mut log = MessageLog::new();
        m.begin_frame();
        m.update(&mut log);
        m.late_update(&mut log);
        let late: Vec<EntityHandle> = log
            .sent()
            .iter()
            .filter(|(_, msg)| msg == MSG_LATE_UPDATE)
            .map(|(h, _)| *h)
            .collect();
        assert_eq!(late, vec![a, b]);
    }

    #[test]
    fn late_update_skips_killed_objects() {
        let mut m = manager();
        let a = m.spawn("Enemy").unwrap();
        let mut log = MessageLog::new();
        m.begin_frame();
        m.add_to_late_update_queue(a);
        m.kill_entity(a);
        m.late_update(&mut log);
        assert_eq!(log.count(MSG_LATE_UPDATE), 0);
    }

    #[test]
    fn disposable_dies_outside_roi() {
        let mut m = manager();
        let coin = m.spawn_entity("Coin", Vec2::new(10.0, 10.0)).unwrap();
        let mut log = MessageLog::new();
        m.update(&mut log);
        assert!(m.arena().is_alive(coin));

        m.set_position(coin, Vec2::new(700.0, 10.0));
        m.update(&mut log);
        assert!(!m.arena().is_alive(coin));
        assert!(!m.registry().contains(coin));
        assert!(!m.tree().contains(coin));
    }

    #[test]
    fn editor_render_draws_placeholders() {
        let mut m = manager();
        let enemy = m.spawn_entity("Enemy", Vec2::new(10.0, 10.0)).unwrap();
        let player = m.spawn_entity("Player", Vec2::new(20.0, 20.0)).unwrap();
        let mut queue = TextRenderQueue::new();
        m.render(false, &mut queue);
        assert_eq!(queue.handles(), vec![player, enemy]);

        m.set_editor_mode(true);
        queue.clear();
        m.render(false, &mut queue);
        assert!(queue.calls().iter().all(|c| c.mode == trellis_render::DrawMode::Editor));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn debug_mode_is_idempotent() {
        let mut m = manager();
        assert!(m.skip_inactive_policy());
        let first = m.enter_debug_mode().unwrap();
        let second = m.enter_debug_mode().unwrap();
        assert_eq!(first, second);
        assert!(m.is_in_debug_mode());
        assert!(!m.skip_inactive_policy());
        assert_eq!(m.active_entities(true)[0], first);

        let mut log = MessageLog::new();
        m.exit_debug_mode(&mut log);
        m.exit_debug_mode(&mut log);
        assert_eq!(log.count(MSG_EXIT), 1);
        assert!(!m.is_in_debug_mode());
        assert!(!m.arena().is_alive(first));
    }

    #[test]
    fn pause_silences_awake_and_gated() {
        let mut m = manager();
        let player = m.spawn("Player").unwrap();
        m.spawn("Enemy").unwrap();
        m.pause_containers();
        assert!(m.active_entities(true).is_empty());
        assert_eq!(m.active_entities(false).len(), 2);
        m.resume_containers();
        assert!(m.active_entities(true).contains(&player));
    }

    #[test]
    fn collect_garbage_keeps_guarded_and_contained() {
        let mut m = manager();
        let enemy = m.spawn("Enemy").unwrap();
        let doomed = m.spawn("Enemy").unwrap();
        m.kill_entity(doomed);
        let reclaimed = m.collect_garbage();
        assert_eq!(reclaimed, 1);
        assert!(m.arena().exists(enemy));
        assert!(!m.guard().is_retained(doomed));
        assert!(!m.registry().contains(doomed));
    }

    #[test]
    fn end_level_reclaims_everything() {
        let mut m = manager();
        m.spawn("Enemy").unwrap();
        m.spawn("Player").unwrap();
        m.spawn("Turret").unwrap();
        m.enter_debug_mode().unwrap();
        m.end_level();
        assert!(m.arena().is_empty());
        assert!(m.registry().is_empty());
        assert!(m.guard().is_empty());
        assert!(!m.is_in_debug_mode());
        assert!(m.tree().is_empty());
    }

    #[test]
    fn stats_reflect_state() {
        let mut m = manager();
        m.spawn("Enemy").unwrap();
        m.spawn("Player").unwrap();
        let stats = m.stats();
        assert_eq!(stats.entities, 2);
        assert_eq!(stats.awake_entities, 1);
        assert_eq!(stats.spawned_total, 2);
        assert_eq!(stats.retained, 2);
        assert_eq!(stats.tree.entities, 1);
    }
}
