use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub const TAG_ENTITY: &str = "entity";
pub const TAG_AWAKE: &str = "awake";
pub const TAG_DETACHED: &str = "detached";
pub const TAG_PRIVATE: &str = "private";
pub const TAG_DISPOSABLE: &str = "disposable";

/// Set of tags declared on an object type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the tag was not present before.
    pub fn insert(&mut self, tag: &str) -> bool {
        self.0.insert(tag.to_string())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for TagSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

/// Activation class of an entity, fixed when the entity is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Spatially gated and persistent.
    Normal,
    /// Simulated every frame regardless of the region of interest.
    Awake,
    /// Always active and conceptually outside world space, e.g. HUD elements.
    Detached,
    /// Spatially gated, never persisted.
    PrivateHelper,
}

impl EntityKind {
    /// Classify from the type's tags. `detached` wins over `awake`,
    /// which wins over `private`.
    pub fn classify(tags: &TagSet) -> Self {
        if tags.contains(TAG_DETACHED) {
            Self::Detached
        } else if tags.contains(TAG_AWAKE) {
            Self::Awake
        } else if tags.contains(TAG_PRIVATE) {
            Self::PrivateHelper
        } else {
            Self::Normal
        }
    }

    /// Awake and detached entities bypass the spatial partition.
    pub fn is_always_active(self) -> bool {
        matches!(self, Self::Awake | Self::Detached)
    }

    pub fn is_detached(self) -> bool {
        self == Self::Detached
    }
}
