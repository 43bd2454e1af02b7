use serde::{Deserialize, Serialize};
use trellis_common::{EntityHandle, EntityKind, Vec2};

/// Two-phase lifecycle of an object.
///
/// Killing an object only marks it as a zombie. The slot is reclaimed by
/// [`ObjectArena::sweep`], so structural owners can remove their references
/// lazily on their next traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Life {
    Alive,
    Zombie,
}

/// Per-object behaviour flags copied from the type descriptor at spawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectTraits {
    /// Submitted to the render queue.
    pub renderable: bool,
    /// Receives `lateUpdate` after the primary pass.
    pub late_update: bool,
    /// Destroyed instead of put to sleep when it leaves the region of interest.
    pub disposable: bool,
    /// Only rendered when gizmos are requested.
    pub gizmo: bool,
    /// Helper object: never persisted, never shown in the editor.
    pub private: bool,
}

/// A scripted world object as seen by the activation subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Object {
    pub type_name: String,
    pub is_entity: bool,
    pub kind: EntityKind,
    pub traits: ObjectTraits,
    pub position: Vec2,
    /// Whether the object takes part in the current frame.
    pub enabled: bool,
    parent: Option<EntityHandle>,
    children: Vec<EntityHandle>,
    life: Life,
}

impl Object {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            is_entity: false,
            kind: EntityKind::Normal,
            traits: ObjectTraits::default(),
            position: Vec2::ZERO,
            enabled: true,
            parent: None,
            children: Vec::new(),
            life: Life::Alive,
        }
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn as_entity(mut self, kind: EntityKind) -> Self {
        self.is_entity = true;
        self.kind = kind;
        self
    }

    pub fn with_traits(mut self, traits: ObjectTraits) -> Self {
        self.traits = traits;
        self
    }

    pub fn parent(&self) -> Option<EntityHandle> {
        self.parent
    }

    pub fn children(&self) -> &[EntityHandle] {
        &self.children
    }

    pub fn life(&self) -> Life {
        self.life
    }

    pub fn is_alive(&self) -> bool {
        self.life == Life::Alive
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    object: Option<Object>,
}

/// Slot arena owning every object of a level.
///
/// Handles carry the slot generation, so a handle to a reclaimed object
/// never resolves to whatever reuses its slot.
#[derive(Debug, Clone, Default)]
pub struct ObjectArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    occupied: usize,
}

impl ObjectArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object, optionally as the last child of `parent`.
    ///
    /// A parent that does not resolve is ignored and the object becomes a root.
    pub fn insert(&mut self, mut object: Object, parent: Option<EntityHandle>) -> EntityHandle {
        let parent = parent.filter(|p| self.exists(*p));
        object.parent = parent;
        object.life = Life::Alive;

        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.object = Some(object);
                EntityHandle::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    object: Some(object),
                });
                EntityHandle::new(index, 0)
            }
        };
        self.occupied += 1;

        if let Some(parent_obj) = parent.and_then(|p| self.get_mut(p)) {
            parent_obj.children.push(handle);
        }
        handle
    }

    /// Resolve a handle, including zombies that were not swept yet.
    pub fn get(&self, handle: EntityHandle) -> Option<&Object> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.object.as_ref())
    }

    pub fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut Object> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.object.as_mut())
    }

    /// The slot still holds the object the handle was issued for.
    pub fn exists(&self, handle: EntityHandle) -> bool {
        self.get(handle).is_some()
    }

    /// The object exists and has not been killed.
    pub fn is_alive(&self, handle: EntityHandle) -> bool {
        self.get(handle).is_some_and(Object::is_alive)
    }

    pub fn position(&self, handle: EntityHandle) -> Option<Vec2> {
        self.get(handle).map(|o| o.position)
    }

    pub fn set_position(&mut self, handle: EntityHandle, position: Vec2) -> bool {
        match self.get_mut(handle) {
            Some(object) => {
                object.position = position;
                true
            }
            None => false,
        }
    }

    /// Mark an object and all of its descendants as zombies.
    /// Returns false if the object did not exist or was already dead.
    pub fn kill(&mut self, handle: EntityHandle) -> bool {
        if !self.is_alive(handle) {
            return false;
        }
        for h in self.subtree(handle) {
            if let Some(object) = self.get_mut(h) {
                object.life = Life::Zombie;
            }
        }
        true
    }

    /// Pre-order traversal of an object and its descendants.
    pub fn subtree(&self, root: EntityHandle) -> Vec<EntityHandle> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(h) = stack.pop() {
            let Some(object) = self.get(h) else {
                continue;
            };
            out.push(h);
            stack.extend(object.children.iter().rev().copied());
        }
        out
    }

    /// Pre-order traversal of an object and the descendants that belong to
    /// it. Nested entities are managed on their own and are not entered.
    pub fn components(&self, root: EntityHandle) -> Vec<EntityHandle> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(h) = stack.pop() {
            let Some(object) = self.get(h) else {
                continue;
            };
            out.push(h);
            stack.extend(
                object
                    .children
                    .iter()
                    .rev()
                    .copied()
                    .filter(|c| self.get(*c).is_some_and(|o| !o.is_entity)),
            );
        }
        out
    }

    /// Reclaim every zombie and every object `keep` rejects.
    ///
    /// Reclaimed objects are unlinked from their parent; surviving children of
    /// reclaimed objects become roots. Returns the number of reclaimed slots.
    pub fn sweep(&mut self, mut keep: impl FnMut(EntityHandle, &Object) -> bool) -> usize {
        let doomed: Vec<EntityHandle> = self
            .iter()
            .filter(|(h, o)| !o.is_alive() || !keep(*h, *o))
            .map(|(h, _)| h)
            .collect();

        for &h in &doomed {
            let Some(object) = self.get(h) else {
                continue;
            };
            let parent = object.parent;
            let children = object.children.clone();
            if let Some(parent_obj) = parent.and_then(|p| self.get_mut(p)) {
                parent_obj.children.retain(|c| *c != h);
            }
            for c in children {
                if let Some(child) = self.get_mut(c) {
                    child.parent = None;
                }
            }
            let slot = &mut self.slots[h.index() as usize];
            slot.object = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(h.index());
            self.occupied -= 1;
        }

        if !doomed.is_empty() {
            tracing::debug!(reclaimed = doomed.len(), "object arena swept");
        }
        doomed.len()
    }

    /// Iterate occupied slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, &Object)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.object
                .as_ref()
                .map(|o| (EntityHandle::new(i as u32, slot.generation), o))
        })
    }

    /// Number of occupied slots, zombies included.
    pub fn len(&self) -> usize {
        self.occupied
    }

    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    pub fn alive_count(&self) -> usize {
        self.iter().filter(|(_, o)| o.is_alive()).count()
    }
}
