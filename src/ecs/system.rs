use super::world::World;

/// A unit of per-frame world logic.
///
/// Systems are owned by the `World` they're registered with and run in
/// registration order. `init`/`destroy` bracket a system's lifetime
/// (subscribe to events on `init`, unsubscribe on `destroy` — the world
/// does not do this automatically, since a system may intentionally want
/// its subscriptions to outlive it via a cloned `EventBus` handle).
pub trait System: Send {
    /// A human-readable name, used in logging and profiling spans.
    fn name(&self) -> &str;

    /// Called once when the system is added to the world, before any
    /// `tick`.
    fn init(&mut self, _world: &mut World) {}

    /// Called once per frame with the elapsed time in seconds.
    fn tick(&mut self, world: &mut World, dt: f32);

    /// Called once when the system is removed from the world or the
    /// world itself is torn down.
    fn destroy(&mut self, _world: &mut World) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingSystem {
        ticks: Arc<AtomicU32>,
    }

    impl System for CountingSystem {
        fn name(&self) -> &str {
            "counting"
        }

        fn tick(&mut self, _world: &mut World, _dt: f32) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn system_tick_runs_through_world() {
        let ticks = Arc::new(AtomicU32::new(0));
        let mut world = World::new();
        world.add_system(CountingSystem {
            ticks: ticks.clone(),
        });
        world.tick(1.0 / 60.0);
        world.tick(1.0 / 60.0);
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn disabled_system_does_not_tick_until_reenabled() {
        let ticks = Arc::new(AtomicU32::new(0));
        let mut world = World::new();
        world.add_system(CountingSystem {
            ticks: ticks.clone(),
        });

        world.tick(1.0 / 60.0);
        assert!(world.disable_system("counting"));
        world.tick(1.0 / 60.0);
        world.tick(1.0 / 60.0);
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        assert!(world.enable_system("counting"));
        world.tick(1.0 / 60.0);
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn remove_system_calls_destroy() {
        struct DestroyTrackingSystem {
            destroyed: Arc<AtomicU32>,
        }
        impl System for DestroyTrackingSystem {
            fn name(&self) -> &str {
                "destroy-tracking"
            }
            fn tick(&mut self, _world: &mut World, _dt: f32) {}
            fn destroy(&mut self, _world: &mut World) {
                self.destroyed.fetch_add(1, Ordering::SeqCst);
            }
        }

        let destroyed = Arc::new(AtomicU32::new(0));
        let mut world = World::new();
        world.add_system(DestroyTrackingSystem {
            destroyed: destroyed.clone(),
        });
        assert!(world.remove_system("destroy-tracking"));
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(!world.remove_system("destroy-tracking"));
    }
}
