use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use trellis_common::{EntityHandle, EntityId, Vec2};
use trellis_kernel::ObjectArena;
use trellis_level::EntityManager;

use crate::error::SnapshotError;
use crate::store::cbor_serialize;

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 2;

/// One persistent entity as written to a save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedEntity {
    pub id: EntityId,
    pub type_name: String,
    pub spawn_point: Vec2,
    pub position: Vec2,
    /// Id of the closest entity above this one in the object hierarchy.
    #[serde(default)]
    pub owner: Option<EntityId>,
}

/// Content-addressed save state of one level.
///
/// The hash is a SHA-256 over the CBOR encoding of the schema version and
/// the entity list, so any edit to a saved entity is detected on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub schema_version: u32,
    /// Saved entities ordered by id.
    pub entities: Vec<SavedEntity>,
    pub hash: String,
}

impl LevelSnapshot {
    /// Capture every live persistent entity of the level.
    pub fn capture(manager: &EntityManager) -> Result<Self, SnapshotError> {
        let arena = manager.arena();
        let entities: Vec<SavedEntity> = manager
            .registry()
            .records()
            .into_iter()
            .filter(|r| r.is_persistent)
            .filter_map(|r| {
                let object = arena.get(r.handle).filter(|o| o.is_alive())?;
                let owner = owning_entity(arena, r.handle)
                    .and_then(|h| manager.registry().id_of(h));
                Some(SavedEntity {
                    id: r.id,
                    type_name: object.type_name.clone(),
                    spawn_point: r.spawn_point,
                    position: object.position,
                    owner,
                })
            })
            .collect();

        let hash = content_hash(SNAPSHOT_SCHEMA_VERSION, &entities)?;
        tracing::debug!(entities = entities.len(), %hash, "level snapshot captured");
        Ok(Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            entities,
            hash,
        })
    }

    /// Recompute the content hash and compare it with the stored one.
    pub fn verify(&self) -> Result<(), SnapshotError> {
        if self.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(SnapshotError::SchemaMismatch {
                found: self.schema_version,
                expected: SNAPSHOT_SCHEMA_VERSION,
            });
        }
        let actual = content_hash(self.schema_version, &self.entities)?;
        if actual != self.hash {
            return Err(SnapshotError::IntegrityMismatch {
                expected: self.hash.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Spawn the saved entities into `manager`, each at its spawn point, then
    /// move it to its saved position and give it back its saved id.
    ///
    /// Owners are restored before the entities they own. An owned entity
    /// takes over the matching companion its owner spawned with, or is
    /// spawned as a child of the owner when there is none. Entities whose
    /// owner is not part of the snapshot are restored as roots.
    /// Returns the new handles in snapshot order.
    pub fn restore(&self, manager: &mut EntityManager) -> Result<Vec<EntityHandle>, SnapshotError> {
        self.verify()?;
        let saved_ids: HashSet<EntityId> = self.entities.iter().map(|s| s.id).collect();
        let mut restored: HashMap<EntityId, EntityHandle> = HashMap::new();
        let mut claimed: HashSet<EntityHandle> = HashSet::new();
        let mut handles: Vec<Option<EntityHandle>> = vec![None; self.entities.len()];

        loop {
            let mut progressed = false;
            for (slot, saved) in self.entities.iter().enumerate() {
                if handles[slot].is_some() {
                    continue;
                }
                let owner = match saved.owner {
                    Some(id) if saved_ids.contains(&id) => match restored.get(&id) {
                        Some(&owner) => Some(owner),
                        None => continue,
                    },
                    _ => None,
                };
                let handle = restore_entity(manager, saved, owner, &claimed)?;
                claimed.insert(handle);
                restored.insert(saved.id, handle);
                handles[slot] = Some(handle);
                progressed = true;
            }
            if !progressed {
                break;
            }
        }

        let skipped = handles.iter().filter(|h| h.is_none()).count();
        if skipped > 0 {
            tracing::warn!(skipped, "saved entities with cyclic owners were not restored");
        }
        let handles: Vec<EntityHandle> = handles.into_iter().flatten().collect();
        tracing::debug!(entities = handles.len(), "level snapshot restored");
        Ok(handles)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Closest entity above `handle` in the object hierarchy.
fn owning_entity(arena: &ObjectArena, handle: EntityHandle) -> Option<EntityHandle> {
    let mut current = arena.get(handle)?.parent();
    while let Some(h) = current {
        let object = arena.get(h)?;
        if object.is_entity {
            return Some(h);
        }
        current = object.parent();
    }
    None
}

/// Entities directly owned by `owner`, looking through plain components.
fn owned_entities(arena: &ObjectArena, owner: EntityHandle) -> Vec<EntityHandle> {
    let mut out = Vec::new();
    let mut stack: Vec<EntityHandle> = arena
        .get(owner)
        .map(|o| o.children().iter().rev().copied().collect())
        .unwrap_or_default();
    while let Some(h) = stack.pop() {
        let Some(object) = arena.get(h).filter(|o| o.is_alive()) else {
            continue;
        };
        if object.is_entity {
            out.push(h);
        } else {
            stack.extend(object.children().iter().rev().copied());
        }
    }
    out
}

fn restore_entity(
    manager: &mut EntityManager,
    saved: &SavedEntity,
    owner: Option<EntityHandle>,
    claimed: &HashSet<EntityHandle>,
) -> Result<EntityHandle, SnapshotError> {
    let restore_error = |source| SnapshotError::Restore {
        id: saved.id.to_string(),
        source,
    };
    let handle = match owner {
        Some(owner) => {
            let companion = owned_entities(manager.arena(), owner).into_iter().find(|h| {
                !claimed.contains(h)
                    && manager
                        .arena()
                        .get(*h)
                        .is_some_and(|o| o.type_name == saved.type_name)
            });
            match companion {
                Some(h) => h,
                None => manager
                    .spawn_child_entity(owner, &saved.type_name, saved.spawn_point)
                    .map_err(restore_error)?,
            }
        }
        None => manager
            .spawn_entity(&saved.type_name, saved.spawn_point)
            .map_err(restore_error)?,
    };
    if manager.position(handle) != Some(saved.position) {
        manager.set_position(handle, saved.position);
    }
    manager.set_entity_id(handle, saved.id);
    Ok(handle)
}

fn content_hash(schema_version: u32, entities: &[SavedEntity]) -> Result<String, SnapshotError> {
    let bytes = cbor_serialize(&(schema_version, entities))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
