//! Entity registry: identity and activation metadata of every live entity.
//!
//! Records are stored in a slab indexed through a handle map, with a reverse
//! map from stable id to handle and a single-entry cache in front of the
//! handle map, since the same entity is usually queried several times in a
//! row.
//!
//! # Invariants
//! - `handle -> record` is injective; `id -> handle` is its inverse.
//! - Both maps are updated together by `register`, `set_id` and `remove`.
//! - A stale `id -> handle` entry is purged by the first lookup that finds
//!   the handle dead.
//! - While any record carries an id, `id -> handle` resolves it to one of
//!   those records, even after the entity that won a collision is gone.

use std::cell::Cell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use trellis_common::{EntityHandle, EntityId, Vec2};

/// Metadata kept for each registered entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub handle: EntityHandle,
    pub id: EntityId,
    pub spawn_point: Vec2,
    pub is_persistent: bool,
    pub is_sleeping: bool,
}

#[derive(Debug, Default)]
pub struct EntityRegistry {
    records: Vec<Option<EntityRecord>>,
    free: Vec<usize>,
    slots: HashMap<EntityHandle, usize>,
    by_id: HashMap<EntityId, EntityHandle>,
    cache: Cell<Option<(EntityHandle, usize)>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly spawned entity. Registering the same handle twice
    /// is ignored.
    pub fn register(
        &mut self,
        handle: EntityHandle,
        id: EntityId,
        spawn_point: Vec2,
        is_persistent: bool,
        is_sleeping: bool,
    ) -> bool {
        if self.slots.contains_key(&handle) {
            tracing::warn!(%handle, "entity registered twice; keeping the first record");
            return false;
        }

        let record = EntityRecord {
            handle,
            id,
            spawn_point,
            is_persistent,
            is_sleeping,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.records[slot] = Some(record);
                slot
            }
            None => {
                self.records.push(Some(record));
                self.records.len() - 1
            }
        };
        self.slots.insert(handle, slot);
        if let Some(previous) = self.by_id.insert(id, handle) {
            tracing::warn!(%id, %previous, %handle, "entity id collision; newest entity wins");
        }
        true
    }

    fn slot_of(&self, handle: EntityHandle) -> Option<usize> {
        if let Some((cached, slot)) = self.cache.get()
            && cached == handle
        {
            return Some(slot);
        }
        let slot = *self.slots.get(&handle)?;
        self.cache.set(Some((handle, slot)));
        Some(slot)
    }

    pub fn lookup(&self, handle: EntityHandle) -> Option<&EntityRecord> {
        let slot = self.slot_of(handle)?;
        self.records.get(slot).and_then(Option::as_ref)
    }

    fn lookup_mut(&mut self, handle: EntityHandle) -> Option<&mut EntityRecord> {
        let slot = self.slot_of(handle)?;
        self.records.get_mut(slot).and_then(Option::as_mut)
    }

    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.lookup(handle).is_some()
    }

    /// Resolve a stable id. If the mapped entity is no longer alive its
    /// record is dropped and the lookup falls back to any other entity
    /// still registered under the id.
    pub fn lookup_by_id(
        &mut self,
        id: EntityId,
        is_alive: impl Fn(EntityHandle) -> bool,
    ) -> Option<EntityHandle> {
        loop {
            let handle = *self.by_id.get(&id)?;
            if is_alive(handle) {
                return Some(handle);
            }
            tracing::trace!(%id, %handle, "purging stale entity record");
            self.remove(handle);
        }
    }

    /// Drop the record of an entity. Removing an unknown handle is a no-op.
    pub fn remove(&mut self, handle: EntityHandle) -> bool {
        let Some(slot) = self.slots.remove(&handle) else {
            return false;
        };
        let removed = self.records[slot].take();
        self.free.push(slot);
        self.cache.set(None);
        if let Some(record) = removed {
            self.release_id(record.id, handle);
        }
        true
    }

    /// Change the stable id of an entity, keeping the reverse map in sync.
    pub fn set_id(&mut self, handle: EntityHandle, id: EntityId) {
        let Some(record) = self.lookup_mut(handle) else {
            return;
        };
        let old = std::mem::replace(&mut record.id, id);
        if old == id {
            self.by_id.insert(id, handle);
            return;
        }
        self.release_id(old, handle);
        if let Some(previous) = self.by_id.insert(id, handle)
            && previous != handle
        {
            tracing::warn!(%id, %previous, %handle, "entity id reassigned to another entity");
        }
    }

    /// `handle` no longer answers to `id`. If it owned the reverse mapping,
    /// hand it to another record that still carries the id.
    fn release_id(&mut self, id: EntityId, handle: EntityHandle) {
        if self.by_id.get(&id) != Some(&handle) {
            return;
        }
        let heir = self
            .records
            .iter()
            .flatten()
            .filter(|r| r.id == id && r.handle != handle)
            .map(|r| r.handle)
            .max();
        match heir {
            Some(heir) => {
                tracing::debug!(%id, %heir, "entity id mapping handed to remaining entity");
                self.by_id.insert(id, heir);
            }
            None => {
                self.by_id.remove(&id);
            }
        }
    }

    pub fn set_persistent(&mut self, handle: EntityHandle, is_persistent: bool) {
        if let Some(record) = self.lookup_mut(handle) {
            record.is_persistent = is_persistent;
        }
    }

    pub fn set_sleeping(&mut self, handle: EntityHandle, is_sleeping: bool) {
        if let Some(record) = self.lookup_mut(handle) {
            record.is_sleeping = is_sleeping;
        }
    }

    pub fn id_of(&self, handle: EntityHandle) -> Option<EntityId> {
        self.lookup(handle).map(|r| r.id)
    }

    /// Spawn point, or the origin for unknown entities.
    pub fn spawn_point(&self, handle: EntityHandle) -> Vec2 {
        self.lookup(handle).map_or(Vec2::ZERO, |r| r.spawn_point)
    }

    pub fn is_persistent(&self, handle: EntityHandle) -> bool {
        self.lookup(handle).is_some_and(|r| r.is_persistent)
    }

    /// Unknown entities report as sleeping.
    pub fn is_sleeping(&self, handle: EntityHandle) -> bool {
        self.lookup(handle).is_none_or(|r| r.is_sleeping)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Records ordered by stable id.
    pub fn records(&self) -> Vec<&EntityRecord> {
        let mut out: Vec<&EntityRecord> = self.records.iter().flatten().collect();
        out.sort_by_key(|r| (r.id, r.handle));
        out
    }
}

pub fn crate_info() -> &'static str {
    "trellis-registry v0.1.0"
}
