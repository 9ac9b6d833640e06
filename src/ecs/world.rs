use std::any::Any;
use std::marker::PhantomData;

use rustc_hash::FxHashMap;

use super::entity::{ComponentTypeId, Entity};
use super::event::EventBus;
use super::system::System;
use crate::concurrency::MpscQueue;

/// Broadcast on the world's `EventBus` whenever `T` is assigned to an
/// entity (including re-assignment, which replaces the previous value).
pub struct ComponentAssigned<T> {
    pub entity: Entity,
    _marker: PhantomData<T>,
}

/// Broadcast on the world's `EventBus` just before `T` is erased from an
/// entity, whether by [`World::remove`] or by [`World::despawn`] sweeping
/// every remaining component.
pub struct ComponentRemoved<T> {
    pub entity: Entity,
    _marker: PhantomData<T>,
}

/// Broadcast once a deferred spawn (queued from a background thread) has
/// been realized on the owning thread.
pub struct EntitySpawned(pub Entity);

/// A type-erased component value paired with the callback that
/// broadcasts its typed [`ComponentRemoved`] event. Carrying the
/// callback alongside the value (rather than looking it up by
/// [`ComponentTypeId`] at removal time) is what lets [`World::despawn`]
/// fire `ComponentRemoved<T>` for every remaining component without
/// knowing their concrete types statically.
struct ComponentBox {
    value: Box<dyn Any + Send>,
    removed: Box<dyn Fn(&mut EventBus, Entity) + Send>,
}

struct EntitySlot {
    generation: u32,
    alive: bool,
    /// Set by [`World::destroy`] when called with `immediate = false`;
    /// cleared and swept into a real [`World::despawn`] by
    /// [`World::cleanup`], which [`World::tick`] runs before flushing
    /// deferred spawns. [`World::view`] skips these entities unless the
    /// caller opts in with [`World::view_including_pending_destroy`].
    pending_destroy: bool,
    components: FxHashMap<ComponentTypeId, ComponentBox>,
}

type DeferredSpawnFn = Box<dyn FnOnce(&mut World, Entity) + Send>;

/// The entity-component store and system scheduler.
///
/// Components live in a `type -> component` map per entity rather than in
/// archetype tables: entities here gain and lose components dynamically
/// often enough (streaming distance-field/surface-cache state as chunks
/// enter and leave range) that archetype migration would dominate the
/// cost this design is trying to avoid.
pub struct World {
    slots: Vec<EntitySlot>,
    free_list: Vec<u32>,
    systems: Vec<Box<dyn System>>,
    disabled_systems: Vec<Box<dyn System>>,
    event_bus: EventBus,
    pending_spawns: MpscQueue<DeferredSpawnFn>,
}

impl World {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            systems: Vec::new(),
            disabled_systems: Vec::new(),
            event_bus: EventBus::new(),
            pending_spawns: MpscQueue::new(),
        }
    }

    pub fn event_bus(&mut self) -> &mut EventBus {
        &mut self.event_bus
    }

    // ------------------------------------------------------------------
    // Entity lifecycle
    // ------------------------------------------------------------------

    /// Creates a new entity immediately, reusing a freed slot (with its
    /// generation bumped) if one is available.
    pub fn spawn(&mut self) -> Entity {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            slot.pending_destroy = false;
            slot.components.clear();
            Entity::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(EntitySlot {
                generation: 0,
                alive: true,
                pending_destroy: false,
                components: FxHashMap::default(),
            });
            Entity::new(index, 0)
        }
    }

    /// Destroys an entity, firing `ComponentRemoved<T>` for every
    /// component it still carries, then bumping its slot's generation so
    /// stale `Entity` handles are rejected by [`World::is_alive`] and
    /// every accessor.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let index = entity.index() as usize;
        let components = std::mem::take(&mut self.slots[index].components);
        for boxed in components.into_values() {
            (boxed.removed)(&mut self.event_bus, entity);
        }
        let slot = &mut self.slots[index];
        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(entity.index());
        true
    }

    /// Destroys `entity`. If `immediate` is `true`, behaves exactly like
    /// [`World::despawn`]. Otherwise marks the entity `pending_destroy`
    /// and leaves it alive (and invisible to [`World::view`]) until the
    /// next [`World::cleanup`] sweeps it — the path used when destruction
    /// is decided mid-tick but other systems still iterating this tick
    /// should not observe the entity disappearing out from under them.
    /// Returns `false` if `entity` is not alive.
    pub fn destroy(&mut self, entity: Entity, immediate: bool) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        if immediate {
            return self.despawn(entity);
        }
        self.slots[entity.index() as usize].pending_destroy = true;
        true
    }

    /// Sweeps every entity marked `pending_destroy` via
    /// [`World::destroy`] into a real [`World::despawn`]. Called by
    /// [`World::tick`] at the top of every tick.
    pub fn cleanup(&mut self) {
        let pending: Vec<Entity> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.alive && slot.pending_destroy)
            .map(|(index, slot)| Entity::new(index as u32, slot.generation))
            .collect();
        for entity in pending {
            self.despawn(entity);
        }
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index() as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation())
    }

    /// Queues a spawn to be realized on this world's owning thread the
    /// next time [`World::flush_deferred_spawns`] runs. `configure` runs
    /// with the freshly spawned entity and a `&mut World`, so it can
    /// assign components immediately. Intended for background asset
    /// loading threads that finish work off-thread but must not touch
    /// `World` directly.
    pub fn spawn_deferred<F>(&self, configure: F)
    where
        F: FnOnce(&mut World, Entity) + Send + 'static,
    {
        self.pending_spawns.push(Box::new(configure));
    }

    /// Realizes every spawn queued since the last flush. Broadcasts
    /// [`EntitySpawned`] for each one. Systems should call this (or rely
    /// on `World::tick` calling it) before reading entity state for the
    /// frame, so deferred spawns are visible no later than one frame
    /// after being queued.
    pub fn flush_deferred_spawns(&mut self) {
        while let Some(configure) = self.pending_spawns.pop() {
            let entity = self.spawn();
            configure(self, entity);
            self.event_bus.broadcast(&EntitySpawned(entity));
        }
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    /// Assigns (or replaces) component `T` on `entity`. Broadcasts
    /// `ComponentAssigned<T>` before the value is stored; if any
    /// subscriber vetoes (returns `false`), the assignment is aborted and
    /// the component is not stored. Overwriting an existing `T` replaces
    /// its value in place and does not fire `ComponentRemoved<T>`.
    /// Returns `false` if `entity` is not alive or the assignment was
    /// vetoed.
    pub fn assign<T: 'static + Send>(&mut self, entity: Entity, component: T) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        if !self.event_bus.broadcast(&ComponentAssigned::<T> {
            entity,
            _marker: PhantomData,
        }) {
            return false;
        }
        let slot = &mut self.slots[entity.index() as usize];
        slot.components.insert(
            ComponentTypeId::of::<T>(),
            ComponentBox {
                value: Box::new(component),
                removed: Box::new(|bus, entity| {
                    bus.broadcast(&ComponentRemoved::<T> {
                        entity,
                        _marker: PhantomData,
                    });
                }),
            },
        );
        true
    }

    /// Removes and returns component `T` from `entity`, if present.
    /// Broadcasts `ComponentRemoved<T>` before the container is freed.
    pub fn remove<T: 'static + Send>(&mut self, entity: Entity) -> Option<T> {
        if !self.is_alive(entity) {
            return None;
        }
        let index = entity.index() as usize;
        let boxed = self.slots[index]
            .components
            .remove(&ComponentTypeId::of::<T>())?;
        (boxed.removed)(&mut self.event_bus, entity);
        boxed.value.downcast::<T>().ok().map(|b| *b)
    }

    pub fn contains<T: 'static>(&self, entity: Entity) -> bool {
        self.is_alive(entity)
            && self.slots[entity.index() as usize]
                .components
                .contains_key(&ComponentTypeId::of::<T>())
    }

    pub fn get<T: 'static>(&self, entity: Entity) -> Option<&T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.slots[entity.index() as usize]
            .components
            .get(&ComponentTypeId::of::<T>())
            .and_then(|b| b.value.downcast_ref::<T>())
    }

    pub fn get_mut<T: 'static>(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.slots[entity.index() as usize]
            .components
            .get_mut(&ComponentTypeId::of::<T>())
            .and_then(|b| b.value.downcast_mut::<T>())
    }

    /// Iterates every live entity that has every component type in `Q`,
    /// yielding shared references. `Q` is a tuple of 1 to 4 component
    /// types, e.g. `world.view::<(Transform, Mesh)>()`.
    pub fn view<'w, Q: ComponentQuery<'w>>(&'w self) -> EntityView<'w, Q> {
        EntityView {
            world: self,
            next_index: 0,
            include_pending_destroy: false,
            _marker: PhantomData,
        }
    }

    /// Like [`World::view`], but also yields entities marked
    /// `pending_destroy` (not yet swept by [`World::cleanup`]). Intended
    /// for systems that must react to a destruction before it lands, e.g.
    /// to release an external handle the component points at.
    pub fn view_including_pending_destroy<'w, Q: ComponentQuery<'w>>(
        &'w self,
    ) -> EntityView<'w, Q> {
        EntityView {
            world: self,
            next_index: 0,
            include_pending_destroy: true,
            _marker: PhantomData,
        }
    }

    // ------------------------------------------------------------------
    // Systems
    // ------------------------------------------------------------------

    pub fn add_system<S: System + 'static>(&mut self, mut system: S) {
        system.init(self);
        self.systems.push(Box::new(system));
    }

    /// Removes the named system from the active set, calling
    /// [`System::destroy`] before dropping it. Also removes it from the
    /// disabled set if it was parked there. Returns `false` if no system
    /// with that name is registered.
    pub fn remove_system(&mut self, name: &str) -> bool {
        if let Some(index) = self.systems.iter().position(|s| s.name() == name) {
            let mut system = self.systems.remove(index);
            system.destroy(self);
            return true;
        }
        if let Some(index) = self.disabled_systems.iter().position(|s| s.name() == name) {
            let mut system = self.disabled_systems.remove(index);
            system.destroy(self);
            return true;
        }
        false
    }

    /// Moves the named active system to the disabled set. It keeps
    /// running its `init`-time subscriptions but is no longer ticked.
    /// Neither `init` nor `destroy` is called — the system's lifetime is
    /// unaffected, only its participation in `tick`.
    pub fn disable_system(&mut self, name: &str) -> bool {
        if let Some(index) = self.systems.iter().position(|s| s.name() == name) {
            let system = self.systems.remove(index);
            self.disabled_systems.push(system);
            true
        } else {
            false
        }
    }

    /// Moves the named disabled system back to the active set.
    pub fn enable_system(&mut self, name: &str) -> bool {
        if let Some(index) = self.disabled_systems.iter().position(|s| s.name() == name) {
            let system = self.disabled_systems.remove(index);
            self.systems.push(system);
            true
        } else {
            false
        }
    }

    /// Flushes deferred spawns, then ticks every registered system in
    /// registration order.
    pub fn tick(&mut self, dt: f32) {
        self.cleanup();
        self.flush_deferred_spawns();
        let mut systems = std::mem::take(&mut self.systems);
        for system in &mut systems {
            system.tick(self, dt);
        }
        self.systems = systems;
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for World {
    fn drop(&mut self) {
        let mut systems = std::mem::take(&mut self.systems);
        for system in &mut systems {
            system.destroy(self);
        }
        let mut disabled = std::mem::take(&mut self.disabled_systems);
        for system in &mut disabled {
            system.destroy(self);
        }
    }
}

/// A tuple of component types fetchable together from a [`World`] by
/// [`World::view`]. Implemented for tuples of 1 to 4 types.
pub trait ComponentQuery<'w> {
    type Item;
    fn fetch(world: &'w World, entity: Entity) -> Option<Self::Item>;
}

macro_rules! impl_component_query {
    ($($t:ident),+) => {
        impl<'w, $($t: 'static),+> ComponentQuery<'w> for ($($t,)+) {
            type Item = ($(&'w $t,)+);

            #[allow(non_snake_case)]
            fn fetch(world: &'w World, entity: Entity) -> Option<Self::Item> {
                $(let $t = world.get::<$t>(entity)?;)+
                Some(($($t,)+))
            }
        }
    };
}

impl_component_query!(A);
impl_component_query!(A, B);
impl_component_query!(A, B, C);
impl_component_query!(A, B, C, D);

/// A filtering iterator over entities that have every component type in
/// `Q`. Returned by [`World::view`].
pub struct EntityView<'w, Q> {
    world: &'w World,
    next_index: u32,
    include_pending_destroy: bool,
    _marker: PhantomData<Q>,
}

impl<'w, Q: ComponentQuery<'w>> Iterator for EntityView<'w, Q> {
    type Item = (Entity, Q::Item);

    fn next(&mut self) -> Option<Self::Item> {
        while (self.next_index as usize) < self.world.slots.len() {
            let index = self.next_index;
            self.next_index += 1;
            let slot = &self.world.slots[index as usize];
            if !slot.alive || (slot.pending_destroy && !self.include_pending_destroy) {
                continue;
            }
            let entity = Entity::new(index, slot.generation);
            if let Some(item) = Q::fetch(self.world, entity) {
                return Some((entity, item));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Transform(f32);
    struct Mesh(u32);

    #[test]
    fn spawn_and_despawn_roundtrip() {
        let mut world = World::new();
        let e = world.spawn();
        assert!(world.is_alive(e));
        assert!(world.despawn(e));
        assert!(!world.is_alive(e));
    }

    #[test]
    fn despawned_slot_generation_rejects_stale_handle() {
        let mut world = World::new();
        let e1 = world.spawn();
        world.despawn(e1);
        let e2 = world.spawn();
        assert_eq!(e1.index(), e2.index());
        assert_ne!(e1.generation(), e2.generation());
        assert!(!world.is_alive(e1));
        assert!(world.is_alive(e2));
    }

    #[test]
    fn assign_get_remove_roundtrip() {
        let mut world = World::new();
        let e = world.spawn();
        assert!(world.assign(e, Transform(1.0)));
        assert!(world.contains::<Transform>(e));
        assert_eq!(world.get::<Transform>(e).unwrap().0, 1.0);
        let removed = world.remove::<Transform>(e).unwrap();
        assert_eq!(removed.0, 1.0);
        assert!(!world.contains::<Transform>(e));
    }

    #[test]
    fn assign_on_dead_entity_fails() {
        let mut world = World::new();
        let e = world.spawn();
        world.despawn(e);
        assert!(!world.assign(e, Transform(1.0)));
    }

    #[test]
    fn view_only_yields_entities_with_all_components() {
        let mut world = World::new();
        let a = world.spawn();
        world.assign(a, Transform(1.0));
        world.assign(a, Mesh(7));

        let b = world.spawn();
        world.assign(b, Transform(2.0));

        let results: Vec<_> = world.view::<(Transform, Mesh)>().collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, a);
        assert_eq!(results[0].1 .0 .0, 1.0);
        assert_eq!(results[0].1 .1 .0, 7);
    }

    #[test]
    fn deferred_spawn_realized_on_flush() {
        let world = std::sync::Arc::new(parking_lot::Mutex::new(World::new()));
        {
            let guard = world.lock();
            guard.spawn_deferred(|w, e| {
                w.assign(e, Mesh(42));
            });
        }
        let mut guard = world.lock();
        assert_eq!(guard.slots.len(), 0);
        guard.flush_deferred_spawns();
        assert_eq!(guard.slots.len(), 1);
        let e = Entity::new(0, 0);
        assert_eq!(guard.get::<Mesh>(e).unwrap().0, 42);
    }

    #[test]
    fn vetoed_assignment_is_not_stored() {
        let mut world = World::new();
        world
            .event_bus()
            .subscribe::<ComponentAssigned<Transform>, _>(|_| false);
        let e = world.spawn();
        assert!(!world.assign(e, Transform(1.0)));
        assert!(!world.contains::<Transform>(e));
    }

    #[test]
    fn remove_fires_component_removed_before_freeing() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_handler = seen.clone();
        let mut world = World::new();
        world
            .event_bus()
            .subscribe::<ComponentRemoved<Transform>, _>(move |ev| {
                seen_handler.lock().push(ev.entity);
                true
            });
        let e = world.spawn();
        world.assign(e, Transform(1.0));
        let removed = world.remove::<Transform>(e);
        assert!(removed.is_some());
        assert_eq!(*seen.lock(), vec![e]);
    }

    #[test]
    fn despawn_fires_component_removed_for_every_remaining_component() {
        let seen = Arc::new(parking_lot::Mutex::new(0u32));
        let seen_transform = seen.clone();
        let seen_mesh = seen.clone();
        let mut world = World::new();
        world
            .event_bus()
            .subscribe::<ComponentRemoved<Transform>, _>(move |_| {
                *seen_transform.lock() += 1;
                true
            });
        world
            .event_bus()
            .subscribe::<ComponentRemoved<Mesh>, _>(move |_| {
                *seen_mesh.lock() += 1;
                true
            });
        let e = world.spawn();
        world.assign(e, Transform(1.0));
        world.assign(e, Mesh(7));
        world.despawn(e);
        assert_eq!(*seen.lock(), 2);
    }

    #[test]
    fn deferred_destroy_stays_alive_and_hidden_until_cleanup() {
        let mut world = World::new();
        let e = world.spawn();
        world.assign(e, Transform(1.0));

        assert!(world.destroy(e, false));
        assert!(world.is_alive(e));
        assert_eq!(world.view::<(Transform,)>().count(), 0);
        assert_eq!(
            world.view_including_pending_destroy::<(Transform,)>().count(),
            1
        );

        world.cleanup();
        assert!(!world.is_alive(e));
    }

    #[test]
    fn immediate_destroy_matches_despawn() {
        let mut world = World::new();
        let e = world.spawn();
        assert!(world.destroy(e, true));
        assert!(!world.is_alive(e));
    }

    #[test]
    fn tick_sweeps_pending_destroy_at_its_start() {
        let mut world = World::new();
        let e = world.spawn();
        world.destroy(e, false);
        world.tick(1.0 / 60.0);
        assert!(!world.is_alive(e));
    }

    #[test]
    fn overwriting_assignment_does_not_fire_removed() {
        let removed_calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let removed_handler = removed_calls.clone();
        let mut world = World::new();
        world
            .event_bus()
            .subscribe::<ComponentRemoved<Transform>, _>(move |_| {
                removed_handler.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                true
            });
        let e = world.spawn();
        world.assign(e, Transform(1.0));
        world.assign(e, Transform(2.0));
        assert_eq!(world.get::<Transform>(e).unwrap().0, 2.0);
        assert_eq!(removed_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
