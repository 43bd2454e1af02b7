use std::fmt;
use std::str::FromStr;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Generation-checked reference to an object slot in the object arena.
///
/// A handle never keeps its object alive. Once the slot is reclaimed and
/// reused, the generation no longer matches and every lookup through the
/// stale handle fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityHandle {
    index: u32,
    generation: u32,
}

impl EntityHandle {
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the arena.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot at the time the handle was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Stable, serializable identifier of an entity.
///
/// Only the low 32 bits are meaningful. The textual form is lower-case
/// hexadecimal without leading zeros, and parses back to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    pub const MASK: u64 = 0xFFFF_FFFF;

    /// Build an id from raw bits, discarding the high half.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw & Self::MASK)
    }

    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Error produced when an entity id string is not valid hexadecimal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    #[error("empty entity id")]
    Empty,
    #[error("invalid entity id {0:?}")]
    Invalid(String),
}

impl FromStr for EntityId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(IdParseError::Empty);
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IdParseError::Invalid(s.to_string()));
        }
        u64::from_str_radix(s, 16)
            .map(Self::from_raw)
            .map_err(|_| IdParseError::Invalid(s.to_string()))
    }
}

/// Axis-aligned rectangle with inclusive integer bounds.
///
/// `y` grows downwards, so `top <= bottom` for any non-empty rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub top: i32,
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
}

impl Rect {
    #[must_use]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Build the inclusive rectangle covering `w x h` units starting at
    /// `(x, y)`. Sizes below one unit are treated as one unit and every
    /// coordinate is truncated towards zero.
    #[must_use]
    pub fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            left: x as i32,
            top: y as i32,
            right: (x + w.max(1.0) - 1.0) as i32,
            bottom: (y + h.max(1.0) - 1.0) as i32,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left + 1
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top + 1
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    /// Whether a world position lies inside, after truncating it to integers.
    pub fn contains(&self, position: Vec2) -> bool {
        self.contains_point(position.x as i32, position.y as i32)
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.right < other.left
            || self.left > other.right
            || self.bottom < other.top
            || self.top > other.bottom)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{} .. {},{}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}
