use std::any::Any;

use rustc_hash::FxHashMap;

use crate::errors::{EngineError, Result};

/// A named, typed blackboard passes use to hand resources to each other
/// across the graph — `IRenderResourceCache::{Collect,Require}` in the
/// original. `collect` publishes a value under a name; `require` fetches
/// it back by name and expected type, failing loudly (rather than
/// returning `None`) since a pass depending on a resource another pass
/// was supposed to produce is a graph wiring bug, not a recoverable
/// runtime condition.
#[derive(Default)]
pub struct ResourceCache {
    entries: FxHashMap<String, Box<dyn Any + Send>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `value` under `name`. Returns
    /// [`EngineError::ResourceCacheCollision`] if `name` is already
    /// taken — collection is expected to happen at most once per name
    /// per compile, since a second writer almost always indicates two
    /// passes accidentally claimed the same resource name.
    pub fn collect<T: Send + 'static>(&mut self, name: &str, value: T) -> Result<()> {
        if self.entries.contains_key(name) {
            return Err(EngineError::ResourceCacheCollision(name.to_string()));
        }
        self.entries.insert(name.to_string(), Box::new(value));
        Ok(())
    }

    /// Overwrites (or inserts) `name` unconditionally. Used by
    /// per-frame-refreshed resources (e.g. the current frame buffer)
    /// that are expected to be re-collected every compile.
    pub fn collect_overwrite<T: Send + 'static>(&mut self, name: &str, value: T) {
        self.entries.insert(name.to_string(), Box::new(value));
    }

    pub fn require<T: Send + 'static>(&self, name: &str) -> Result<&T> {
        self.entries
            .get(name)
            .ok_or_else(|| EngineError::ResourceCacheMiss(name.to_string()))?
            .downcast_ref::<T>()
            .ok_or_else(|| {
                EngineError::ResourceCacheMiss(format!("{name} (wrong type requested)"))
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Drops every entry, called at the start of each graph compile so
    /// stale resources from a previous compile can't leak into a new
    /// one.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_then_require_roundtrips() {
        let mut cache = ResourceCache::new();
        cache.collect("depth", 42u32).unwrap();
        assert_eq!(*cache.require::<u32>("depth").unwrap(), 42);
    }

    #[test]
    fn collecting_the_same_name_twice_errors() {
        let mut cache = ResourceCache::new();
        cache.collect("depth", 1u32).unwrap();
        assert!(cache.collect("depth", 2u32).is_err());
    }

    #[test]
    fn requiring_missing_name_errors() {
        let cache = ResourceCache::new();
        assert!(cache.require::<u32>("missing").is_err());
    }

    #[test]
    fn requiring_wrong_type_errors() {
        let mut cache = ResourceCache::new();
        cache.collect("depth", 42u32).unwrap();
        assert!(cache.require::<f32>("depth").is_err());
    }
}
