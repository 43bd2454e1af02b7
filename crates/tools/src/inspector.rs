use std::fmt;
use std::time::Duration;

use trellis_common::{EntityHandle, EntityId, EntityKind, Rect, Vec2};
use trellis_level::EntityManager;

/// Activation inspector for developer tooling.
pub struct ActivationInspector;

impl ActivationInspector {
    pub fn summary(manager: &EntityManager) -> LevelSummary {
        let stats = manager.stats();
        LevelSummary {
            entities: stats.entities,
            awake: stats.awake_entities,
            gated: stats.tree.entities,
            debug_mode: manager.is_in_debug_mode(),
            editor_mode: manager.is_editor_mode(),
            roi: manager.roi(),
            roi_leaves: stats.roi_leaves,
            allocated_leaves: stats.tree.leaves,
            world_size: (stats.tree.world_width, stats.tree.world_height),
            refresh_count: stats.refresh_count,
            refresh_average: stats.refresh_average,
        }
    }

    /// Everything the level knows about one registered entity.
    pub fn inspect_entity(manager: &EntityManager, handle: EntityHandle) -> Option<EntityInfo> {
        let record = manager.registry().lookup(handle)?;
        let object = manager.arena().get(handle)?;
        let placement = if manager.debug_container().contains(handle) {
            Placement::Debug
        } else if manager.awake_container().contains(handle) {
            Placement::Awake
        } else if let Some(leaf) = manager.tree().locate(handle) {
            Placement::Leaf(leaf)
        } else {
            Placement::Unowned
        };
        Some(EntityInfo {
            handle,
            id: record.id,
            type_name: object.type_name.clone(),
            kind: object.kind,
            placement,
            position: object.position,
            spawn_point: record.spawn_point,
            alive: object.is_alive(),
            enabled: object.enabled,
            persistent: record.is_persistent,
            sleeping: record.is_sleeping,
        })
    }

    /// Registered entities in id order.
    pub fn list_entities(manager: &EntityManager) -> Vec<EntityHandle> {
        manager.registry().records().iter().map(|r| r.handle).collect()
    }
}

/// Where an entity is currently stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Debug,
    Awake,
    /// Leaf sector index of the entity tree.
    Leaf(usize),
    /// Only the reference guard holds it.
    Unowned,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => f.write_str("debug"),
            Self::Awake => f.write_str("awake"),
            Self::Leaf(i) => write!(f, "leaf {i}"),
            Self::Unowned => f.write_str("unowned"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LevelSummary {
    pub entities: usize,
    pub awake: usize,
    pub gated: usize,
    pub debug_mode: bool,
    pub editor_mode: bool,
    pub roi: Rect,
    pub roi_leaves: usize,
    pub allocated_leaves: usize,
    pub world_size: (i32, i32),
    pub refresh_count: u64,
    pub refresh_average: Duration,
}

impl fmt::Display for LevelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Level: entities={} awake={} gated={} world={}x{} roi={} leaves={}/{} refreshes={} ({:?} avg)",
            self.entities,
            self.awake,
            self.gated,
            self.world_size.0,
            self.world_size.1,
            self.roi,
            self.roi_leaves,
            self.allocated_leaves,
            self.refresh_count,
            self.refresh_average,
        )?;
        if self.debug_mode {
            f.write_str(" [debug]")?;
        }
        if self.editor_mode {
            f.write_str(" [editor]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct EntityInfo {
    pub handle: EntityHandle,
    pub id: EntityId,
    pub type_name: String,
    pub kind: EntityKind,
    pub placement: Placement,
    pub position: Vec2,
    pub spawn_point: Vec2,
    pub alive: bool,
    pub enabled: bool,
    pub persistent: bool,
    pub sleeping: bool,
}

impl fmt::Display for EntityInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entity {} [{}] {} {:?} in {} pos=({:.1}, {:.1}) spawn=({:.1}, {:.1})",
            self.id,
            self.handle,
            self.type_name,
            self.kind,
            self.placement,
            self.position.x,
            self.position.y,
            self.spawn_point.x,
            self.spawn_point.y,
        )?;
        if !self.alive {
            f.write_str(" killed")?;
        }
        if self.sleeping {
            f.write_str(" sleeping")?;
        }
        Ok(())
    }
}
