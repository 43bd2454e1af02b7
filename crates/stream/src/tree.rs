use std::collections::{BTreeMap, HashMap};

use trellis_common::{EntityHandle, Rect, Vec2};
use trellis_container::EntityContainer;

/// Shape of the entity tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Depth of the leaves. The root is at depth 0.
    pub height: u32,
    pub min_world_width: i32,
    pub min_world_height: i32,
    /// World size tracked before the first `update_world_size`.
    pub world_width: i32,
    pub world_height: i32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            height: 5,
            min_world_width: 8192,
            min_world_height: 4096,
            world_width: 32768,
            world_height: 16384,
        }
    }
}

#[derive(Debug, Clone)]
enum SectorKind {
    /// Bit `j` is set when child `j` is allocated.
    Internal { children: u8 },
    Leaf(EntityContainer),
}

#[derive(Debug, Clone)]
struct Sector {
    rect: Rect,
    depth: u32,
    kind: SectorKind,
}

/// Counters describing the current shape of the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub sectors: usize,
    pub leaves: usize,
    pub entities: usize,
    pub world_width: i32,
    pub world_height: i32,
}

/// Quadtree of fixed height over the world rectangle.
///
/// Sector `i` has children `1 + 4i + j`, with `j` in top-left, top-right,
/// bottom-left, bottom-right order. Left and top halves take the extra unit
/// of odd sizes, so every world coordinate lies in exactly one child.
/// Sectors are allocated on demand; sectors at depth `height` are leaves and
/// each owns a spatially gated container.
#[derive(Debug, Clone)]
pub struct EntityTree {
    config: TreeConfig,
    world_width: i32,
    world_height: i32,
    sectors: BTreeMap<usize, Sector>,
    locator: HashMap<EntityHandle, usize>,
    paused: bool,
}

const ROOT: usize = 0;

fn child_index(parent: usize, j: usize) -> usize {
    1 + 4 * parent + j
}

fn parent_index(child: usize) -> usize {
    (child - 1) / 4
}

/// Rectangle of child `j` of a sector covering `rect`.
fn child_rect(rect: Rect, j: usize) -> Rect {
    let left_width = (rect.width() + 1) / 2;
    let top_height = (rect.height() + 1) / 2;
    let (left, right) = if j % 2 == 0 {
        (rect.left, rect.left + left_width - 1)
    } else {
        (rect.left + left_width, rect.right)
    };
    let (top, bottom) = if j < 2 {
        (rect.top, rect.top + top_height - 1)
    } else {
        (rect.top + top_height, rect.bottom)
    };
    Rect::new(left, top, right, bottom)
}

/// Which child of a sector covering `rect` contains `(x, y)`.
fn child_containing(rect: Rect, x: i32, y: i32) -> usize {
    let col = usize::from(x >= rect.left + (rect.width() + 1) / 2);
    let row = usize::from(y >= rect.top + (rect.height() + 1) / 2);
    2 * row + col
}

impl EntityTree {
    pub fn new(config: TreeConfig) -> Self {
        let world_width = config.world_width.max(config.min_world_width);
        let world_height = config.world_height.max(config.min_world_height);
        Self {
            config,
            world_width,
            world_height,
            sectors: BTreeMap::new(),
            locator: HashMap::new(),
            paused: false,
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn world_size(&self) -> (i32, i32) {
        (self.world_width, self.world_height)
    }

    pub fn world_rect(&self) -> Rect {
        Rect::new(0, 0, self.world_width - 1, self.world_height - 1)
    }

    /// Clip a position to the world rectangle.
    fn clip(&self, position: Vec2) -> (i32, i32) {
        (
            (position.x as i32).clamp(0, self.world_width - 1),
            (position.y as i32).clamp(0, self.world_height - 1),
        )
    }

    /// Clamp every bound of `rect` into the world rectangle.
    fn clip_rect(&self, rect: Rect) -> Rect {
        let (w, h) = (self.world_width - 1, self.world_height - 1);
        Rect::new(
            rect.left.clamp(0, w),
            rect.top.clamp(0, h),
            rect.right.clamp(0, w),
            rect.bottom.clamp(0, h),
        )
    }

    fn new_leaf(&self) -> EntityContainer {
        let mut container = EntityContainer::gated();
        if self.paused {
            container.pause();
        }
        container
    }

    /// Allocate sector `index` if needed.
    fn ensure_sector(&mut self, index: usize, rect: Rect, depth: u32) {
        if self.sectors.contains_key(&index) {
            return;
        }
        let kind = if depth >= self.config.height {
            SectorKind::Leaf(self.new_leaf())
        } else {
            SectorKind::Internal { children: 0 }
        };
        self.sectors.insert(index, Sector { rect, depth, kind });
        if index != ROOT
            && let Some(Sector {
                kind: SectorKind::Internal { children },
                ..
            }) = self.sectors.get_mut(&parent_index(index))
        {
            *children |= 1 << ((index - 1) % 4);
        }
    }

    /// Walk from sector `start` down to the leaf containing `(x, y)`,
    /// allocating sectors on the way, and store the entity there.
    fn descend(&mut self, start: usize, handle: EntityHandle, x: i32, y: i32) -> usize {
        let (mut index, mut rect, mut depth) = match self.sectors.get(&start) {
            Some(s) => (start, s.rect, s.depth),
            None => (ROOT, self.world_rect(), 0),
        };
        self.ensure_sector(index, rect, depth);

        while depth < self.config.height {
            let j = child_containing(rect, x, y);
            rect = child_rect(rect, j);
            index = child_index(index, j);
            depth += 1;
            self.ensure_sector(index, rect, depth);
        }

        if let Some(Sector {
            kind: SectorKind::Leaf(container),
            ..
        }) = self.sectors.get_mut(&index)
        {
            container.store(handle);
        }
        self.locator.insert(handle, index);
        index
    }

    /// Insert an entity into the leaf containing its clipped position.
    /// An entity already tracked elsewhere is moved. Returns the leaf index.
    pub fn bubble_down(&mut self, handle: EntityHandle, position: Vec2) -> usize {
        self.remove(handle);
        let (x, y) = self.clip(position);
        self.descend(ROOT, handle, x, y)
    }

    /// Re-home an entity whose position may have left its leaf.
    ///
    /// Climbs to the nearest ancestor containing the clipped position and
    /// descends from there. Untracked entities are inserted. Returns true if
    /// the entity changed leaves.
    pub fn bubble_up(&mut self, handle: EntityHandle, position: Vec2) -> bool {
        let (x, y) = self.clip(position);
        let Some(&leaf) = self.locator.get(&handle) else {
            self.descend(ROOT, handle, x, y);
            return true;
        };
        if self
            .sectors
            .get(&leaf)
            .is_some_and(|s| s.rect.contains_point(x, y))
        {
            return false;
        }

        self.remove(handle);
        let mut ancestor = leaf;
        while ancestor != ROOT {
            ancestor = parent_index(ancestor);
            if self
                .sectors
                .get(&ancestor)
                .is_some_and(|s| s.rect.contains_point(x, y))
            {
                break;
            }
        }
        self.descend(ancestor, handle, x, y);
        true
    }

    /// Stop tracking an entity. Unknown entities are ignored.
    pub fn remove(&mut self, handle: EntityHandle) -> bool {
        let Some(leaf) = self.locator.remove(&handle) else {
            return false;
        };
        if let Some(container) = self.leaf_mut(leaf) {
            container.remove(handle);
        }
        true
    }

    /// Drop locator entries of entities that leaf containers already purged.
    pub fn forget(&mut self, handles: &[EntityHandle]) {
        for h in handles {
            if let Some(&leaf) = self.locator.get(h)
                && !self.leaf(leaf).is_some_and(|c| c.contains(*h))
            {
                self.locator.remove(h);
            }
        }
    }

    /// Bubble up every member of one leaf. `position_of` returns `None` for
    /// killed entities, which are left in place. Returns how many moved.
    pub fn bubble_up_leaf(
        &mut self,
        leaf: usize,
        position_of: impl Fn(EntityHandle) -> Option<Vec2>,
    ) -> usize {
        let members: Vec<EntityHandle> = match self.leaf(leaf) {
            Some(container) => container.members().collect(),
            None => return 0,
        };
        let mut moved = 0;
        for h in members {
            if let Some(position) = position_of(h)
                && self.bubble_up(h, position)
            {
                moved += 1;
            }
        }
        moved
    }

    /// Bubble up the members of every leaf.
    pub fn bubble_up_all(&mut self, position_of: impl Fn(EntityHandle) -> Option<Vec2>) -> usize {
        let leaves: Vec<usize> = self.leaf_indices().collect();
        leaves
            .into_iter()
            .map(|leaf| self.bubble_up_leaf(leaf, &position_of))
            .sum()
    }

    /// Track a new world size, clamped to the configured minimum.
    ///
    /// Returns true if the size changed. Sector rectangles are recomputed
    /// immediately; entities stay in their old leaves until the caller
    /// bubbles them up.
    pub fn update_world_size(&mut self, width: i32, height: i32) -> bool {
        let width = width.max(self.config.min_world_width);
        let height = height.max(self.config.min_world_height);
        if width == self.world_width && height == self.world_height {
            return false;
        }
        self.world_width = width;
        self.world_height = height;

        let world = self.world_rect();
        let indices: Vec<usize> = self.sectors.keys().copied().collect();
        for index in indices {
            let rect = if index == ROOT {
                world
            } else {
                let parent = parent_index(index);
                match self.sectors.get(&parent) {
                    Some(p) => child_rect(p.rect, (index - 1) % 4),
                    None => continue,
                }
            };
            if let Some(sector) = self.sectors.get_mut(&index) {
                sector.rect = rect;
            }
        }
        tracing::debug!(width, height, "entity tree world size updated");
        true
    }

    /// Collect into `output` the allocated leaves whose rectangle intersects
    /// `roi`, in depth-first child order. `output` is cleared first.
    ///
    /// `roi` is clamped into the world first, the same way positions are
    /// clipped on insertion, so a region past the world edge still reaches
    /// the edge leaves holding clipped entities.
    pub fn update_roi(&self, output: &mut Vec<usize>, roi: Rect) {
        output.clear();
        let roi = self.clip_rect(roi);
        let mut stack = vec![ROOT];
        while let Some(index) = stack.pop() {
            let Some(sector) = self.sectors.get(&index) else {
                continue;
            };
            if !sector.rect.intersects(&roi) {
                continue;
            }
            match &sector.kind {
                SectorKind::Leaf(_) => output.push(index),
                SectorKind::Internal { children } => {
                    for j in (0..4).rev() {
                        if children & (1 << j) != 0 {
                            stack.push(child_index(index, j));
                        }
                    }
                }
            }
        }
    }

    /// Free empty leaves and internal sectors left without children.
    /// The root is kept. Returns the number of freed sectors.
    pub fn prune_empty(&mut self) -> usize {
        let indices: Vec<usize> = self.sectors.keys().rev().copied().collect();
        let mut freed = 0;
        for index in indices {
            if index == ROOT {
                continue;
            }
            let empty = match self.sectors.get(&index).map(|s| &s.kind) {
                Some(SectorKind::Leaf(c)) => c.is_empty(),
                Some(SectorKind::Internal { children }) => *children == 0,
                None => false,
            };
            if !empty {
                continue;
            }
            self.sectors.remove(&index);
            freed += 1;
            if let Some(Sector {
                kind: SectorKind::Internal { children },
                ..
            }) = self.sectors.get_mut(&parent_index(index))
            {
                *children &= !(1 << ((index - 1) % 4));
            }
        }
        if freed > 0 {
            tracing::trace!(freed, "pruned empty sectors");
        }
        freed
    }

    pub fn leaf(&self, index: usize) -> Option<&EntityContainer> {
        match self.sectors.get(&index).map(|s| &s.kind) {
            Some(SectorKind::Leaf(c)) => Some(c),
            _ => None,
        }
    }

    pub fn leaf_mut(&mut self, index: usize) -> Option<&mut EntityContainer> {
        match self.sectors.get_mut(&index).map(|s| &mut s.kind) {
            Some(SectorKind::Leaf(c)) => Some(c),
            _ => None,
        }
    }

    pub fn leaf_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.sectors
            .iter()
            .filter(|(_, s)| matches!(s.kind, SectorKind::Leaf(_)))
            .map(|(i, _)| *i)
    }

    pub fn leaves(&self) -> impl Iterator<Item = (usize, &EntityContainer)> {
        self.sectors.iter().filter_map(|(i, s)| match &s.kind {
            SectorKind::Leaf(c) => Some((*i, c)),
            SectorKind::Internal { .. } => None,
        })
    }

    pub fn leaves_mut(&mut self) -> impl Iterator<Item = (usize, &mut EntityContainer)> {
        self.sectors.iter_mut().filter_map(|(i, s)| match &mut s.kind {
            SectorKind::Leaf(c) => Some((*i, c)),
            SectorKind::Internal { .. } => None,
        })
    }

    pub fn sector_rect(&self, index: usize) -> Option<Rect> {
        self.sectors.get(&index).map(|s| s.rect)
    }

    /// Leaf currently holding an entity.
    pub fn locate(&self, handle: EntityHandle) -> Option<usize> {
        self.locator.get(&handle).copied()
    }

    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.locator.contains_key(&handle)
    }

    /// Number of tracked entities.
    pub fn len(&self) -> usize {
        self.locator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locator.is_empty()
    }

    pub fn pause(&mut self) {
        self.paused = true;
        for (_, leaf) in self.leaves_mut() {
            leaf.pause();
        }
    }

    pub fn resume(&mut self) {
        self.paused = false;
        for (_, leaf) in self.leaves_mut() {
            leaf.resume();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            sectors: self.sectors.len(),
            leaves: self.leaf_indices().count(),
            entities: self.locator.len(),
            world_width: self.world_width,
            world_height: self.world_height,
        }
    }
}

impl Default for EntityTree {
    fn default() -> Self {
        Self::new(TreeConfig::default())
    }
}
