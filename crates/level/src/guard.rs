use std::collections::HashSet;

use trellis_common::EntityHandle;

/// Set of entities that must survive garbage collection.
///
/// Entities move between containers while the partition rebalances, so at
/// any moment an entity may have no structural owner. Every spawned entity
/// is retained here until the level tears down.
#[derive(Debug, Default)]
pub struct ReferenceGuard {
    retained: HashSet<EntityHandle>,
}

impl ReferenceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retaining twice is a no-op. Returns true if the handle was new.
    pub fn retain(&mut self, handle: EntityHandle) -> bool {
        self.retained.insert(handle)
    }

    pub fn is_retained(&self, handle: EntityHandle) -> bool {
        self.retained.contains(&handle)
    }

    /// Release one handle, e.g. after its entity was reclaimed.
    pub fn release(&mut self, handle: EntityHandle) -> bool {
        self.retained.remove(&handle)
    }

    /// Drop every retention at a checkpoint such as level teardown.
    pub fn clear(&mut self) {
        self.retained.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.retained.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.retained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }
}
