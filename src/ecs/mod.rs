//! Entity-component-system scene core.
//!
//! Components are stored per-entity in a `type_tag -> component` map
//! (not archetype-based — entities in this engine gain and lose
//! components dynamically often enough, e.g. streaming SDF/surface-cache
//! state, that archetype migration cost would dominate). Systems observe
//! component lifecycle and world ticks; a typed synchronous event bus
//! with veto-on-`false` semantics lets a system cancel another system's
//! action (e.g. refusing to start a bake while one is already in flight).

mod entity;
mod event;
mod system;
mod world;

pub use entity::{ComponentTypeId, Entity};
pub use event::{EventBus, SubscriptionId};
pub use system::System;
pub use world::{ComponentAssigned, ComponentRemoved, EntitySpawned, EntityView, World};
