use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use trellis_common::{TAG_DISPOSABLE, TAG_PRIVATE, TagSet};

use crate::arena::ObjectTraits;

/// Declaration of an object type: its tags, the companion objects spawned
/// alongside it and the hooks it implements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default)]
    pub companions: Vec<String>,
    #[serde(default)]
    pub renderable: bool,
    #[serde(default)]
    pub late_update: bool,
    #[serde(default)]
    pub gizmo: bool,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn tagged(mut self, tags: &[&str]) -> Self {
        for tag in tags {
            self.tags.insert(tag);
        }
        self
    }

    pub fn with_companions(mut self, companions: &[&str]) -> Self {
        self.companions
            .extend(companions.iter().map(|c| (*c).to_string()));
        self
    }

    pub fn renderable(mut self) -> Self {
        self.renderable = true;
        self
    }

    pub fn with_late_update(mut self) -> Self {
        self.late_update = true;
        self
    }

    pub fn gizmo(mut self) -> Self {
        self.gizmo = true;
        self
    }

    /// Flags copied onto every instance of this type.
    pub fn traits(&self) -> ObjectTraits {
        ObjectTraits {
            renderable: self.renderable,
            late_update: self.late_update,
            disposable: self.tags.contains(TAG_DISPOSABLE),
            gizmo: self.gizmo,
            private: self.tags.contains(TAG_PRIVATE),
        }
    }
}

/// Registry of known object types.
///
/// Stands in for the scripting runtime's object model: the activation
/// subsystem only asks whether a type exists, which tags it carries, and
/// occasionally adds a tag to repair a malformed definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeCatalog {
    types: BTreeMap<String, TypeDescriptor>,
    #[serde(default)]
    setup_objects: BTreeSet<String>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type, returning the previous declaration of the same name.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> Option<TypeDescriptor> {
        self.types.insert(descriptor.name.clone(), descriptor)
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn has_tag(&self, name: &str, tag: &str) -> bool {
        self.types.get(name).is_some_and(|t| t.tags.contains(tag))
    }

    /// Add a tag to an existing type. Returns true if the tag was new.
    pub fn add_tag(&mut self, name: &str, tag: &str) -> bool {
        match self.types.get_mut(name) {
            Some(t) => t.tags.insert(tag),
            None => false,
        }
    }

    /// Mark a type as a level setup object. Setup objects are never persisted.
    pub fn declare_setup_object(&mut self, name: &str) {
        self.setup_objects.insert(name.to_string());
    }

    pub fn is_setup_object(&self, name: &str) -> bool {
        self.setup_objects.contains(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}
