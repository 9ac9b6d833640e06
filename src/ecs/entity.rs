use std::any::TypeId;

/// A generational entity identifier. The generation lets a stale handle
/// (held across a `despawn`/respawn at the same slot) be detected rather
/// than silently aliasing a new entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl Entity {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}#{})", self.index, self.generation)
    }
}

/// Identifies a component type for the per-entity component map. A thin
/// wrapper over `TypeId` rather than a manually assigned integer tag,
/// since Rust gives us a stable per-type identity for free.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentTypeId(TypeId);

impl ComponentTypeId {
    pub fn of<T: 'static>() -> Self {
        Self(TypeId::of::<T>())
    }
}
