use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

/// A token returned by [`EventBus::subscribe`], used to remove a single
/// handler with [`EventBus::unsubscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type HandlerList<T> = Vec<(u64, Box<dyn FnMut(&T) -> bool + Send>)>;

/// A typed, synchronous multicast event bus.
///
/// Handlers for an event type `T` run in subscription order on the
/// calling thread. Each handler returns `bool`: `true` to let dispatch
/// continue to the next handler, `false` to veto — [`EventBus::broadcast`]
/// stops calling further handlers and returns `false` itself. This is the
/// same veto-on-`false` convention the original engine's `Boardcast<T>`
/// uses (a handler vetoes, for example, to refuse starting a bake while
/// one is already running), and also backs the delegate-style hooks
/// (`UpdateGlobalSdf`, `GenerateSdf`, `GenerateSurfaceCache`) that the
/// original exposes as a separate multicast-delegate type — both dispatch
/// synchronously in registration order, so this engine unifies them onto
/// one bus.
#[derive(Default)]
pub struct EventBus {
    handlers: FxHashMap<TypeId, Box<dyn Any + Send>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for event type `T`. Returns a subscription
    /// token usable with [`EventBus::unsubscribe`].
    pub fn subscribe<T, F>(&mut self, handler: F) -> SubscriptionId
    where
        T: 'static,
        F: FnMut(&T) -> bool + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let list = self
            .handlers
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(HandlerList::<T>::new()))
            .downcast_mut::<HandlerList<T>>()
            .expect("event handler list type mismatch");
        list.push((id, Box::new(handler)));
        SubscriptionId(id)
    }

    /// Removes a single handler by its subscription token.
    pub fn unsubscribe<T: 'static>(&mut self, id: SubscriptionId) {
        if let Some(list) = self.handlers.get_mut(&TypeId::of::<T>()) {
            if let Some(list) = list.downcast_mut::<HandlerList<T>>() {
                list.retain(|(handler_id, _)| *handler_id != id.0);
            }
        }
    }

    /// Removes every handler registered for event type `T`.
    pub fn unsubscribe_all<T: 'static>(&mut self) {
        self.handlers.remove(&TypeId::of::<T>());
    }

    /// Dispatches `event` to every handler of type `T` in subscription
    /// order. Returns `false` as soon as a handler vetoes (and does not
    /// call any handler after it); returns `true` if every handler (or no
    /// handler) ran to completion.
    pub fn broadcast<T: 'static>(&mut self, event: &T) -> bool {
        let Some(list) = self.handlers.get_mut(&TypeId::of::<T>()) else {
            return true;
        };
        let Some(list) = list.downcast_mut::<HandlerList<T>>() else {
            return true;
        };
        for (_, handler) in list.iter_mut() {
            if !handler(event) {
                return false;
            }
        }
        true
    }

    pub fn has_subscribers<T: 'static>(&self) -> bool {
        self.handlers
            .get(&TypeId::of::<T>())
            .and_then(|list| list.downcast_ref::<HandlerList<T>>())
            .is_some_and(|list| !list.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Damage(u32);
    struct AssetLoaded(&'static str);

    #[test]
    fn handlers_run_in_subscription_order() {
        let mut bus = EventBus::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        bus.subscribe::<Damage, _>(move |_| {
            o1.lock().push(1);
            true
        });
        bus.subscribe::<Damage, _>(move |_| {
            o2.lock().push(2);
            true
        });
        assert!(bus.broadcast(&Damage(10)));
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn veto_stops_remaining_handlers() {
        let mut bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c1 = calls.clone();
        let c2 = calls.clone();
        bus.subscribe::<Damage, _>(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
            false
        });
        bus.subscribe::<Damage, _>(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
            true
        });
        assert!(!bus.broadcast(&Damage(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_removes_only_that_handler() {
        let mut bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c1 = calls.clone();
        let id = bus.subscribe::<AssetLoaded, _>(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
            true
        });
        bus.unsubscribe::<AssetLoaded>(id);
        bus.broadcast(&AssetLoaded("mesh.bin"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn distinct_event_types_do_not_cross_dispatch() {
        let mut bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c1 = calls.clone();
        bus.subscribe::<Damage, _>(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
            true
        });
        bus.broadcast(&AssetLoaded("other.bin"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
