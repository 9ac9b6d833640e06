use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies an RHI interface a [`RhiObject`] might implement, queried
/// via [`query_interface`]. A thin wrapper over `TypeId` — the Rust
/// equivalent of the original's compile-time IID constants, since `TypeId`
/// already gives every type a stable identity without hand-maintained
/// GUID tables.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Iid(TypeId);

impl Iid {
    pub fn of<T: 'static>() -> Self {
        Self(TypeId::of::<T>())
    }
}

impl fmt::Debug for Iid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Iid({:?})", self.0)
    }
}

/// An atomic reference count with COM-style `add_ref`/`release`
/// semantics: `release` returns the count remaining *after* the
/// decrement, so the caller knows when it reached zero and the backing
/// resource should be torn down.
///
/// Overflow and double-release are programmer errors, not recoverable
/// conditions — both panic, matching the original's debug assertions
/// (release builds there would silently corrupt the count; here we'd
/// rather fail loudly in every build, since a leaked or double-freed GPU
/// resource is worse than a panic).
pub struct RefCount(AtomicU32);

impl RefCount {
    /// Every `RhiObject` starts life with one implicit reference held by
    /// its creator, matching the original's `New()` returning an
    /// already-ref'd pointer.
    pub fn new() -> Self {
        Self(AtomicU32::new(1))
    }

    pub fn add_ref(&self) -> u32 {
        let prev = self.0.fetch_add(1, Ordering::AcqRel);
        assert!(prev < u32::MAX, "RefCount overflow: add_ref on a count already at u32::MAX");
        prev + 1
    }

    /// Decrements the count. Panics if the count was already zero
    /// (double release).
    pub fn release(&self) -> u32 {
        let prev = self.0.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "RefCount double release: release called with count already 0");
        prev - 1
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-unique object id, used by every concrete RHI
/// object for debug logging and GPU-object-table keys. Mirrors the
/// teacher's `Tracked<T>` id-tagging pattern
/// (`renderer/core/resources/tracked.rs`), generalized here to the base
/// of the whole object hierarchy rather than one resource wrapper.
pub fn next_object_id() -> u64 {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

/// The base trait every RHI object implements. `query_interface` is the
/// Rust-idiomatic stand-in for COM's `QueryInterface`: instead of a
/// vtable/IID lookup table, it downcasts a type-erased `Arc` through
/// `Any`.
pub trait RhiObject: Any + Send + Sync {
    fn object_id(&self) -> u64;
    fn type_name(&self) -> &'static str;

    /// Exposes `self` as `Arc<dyn Any>` so [`query_interface`] can
    /// downcast it. Implementations should simply return `self`.
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>
    where
        Self: Sized,
    {
        self
    }
}

/// Attempts to downcast a type-erased RHI object to the concrete
/// interface `T`. Returns `None` (not an error) when the object doesn't
/// implement `T` — callers that require the interface should turn that
/// into an [`crate::errors::EngineError::UnsupportedInterface`].
pub fn query_interface<T>(object: Arc<dyn Any + Send + Sync>) -> Option<Arc<T>>
where
    T: Send + Sync + 'static,
{
    object.downcast::<T>().ok()
}

/// A ref-counted handle to an RHI object, mirroring the original's
/// `AddRef`/`Release` pointer idiom without raw pointers: `Ref<T>` owns
/// one logical reference (tracked in the pointee's own [`RefCount`]).
/// Cloning a `Ref` calls `add_ref`; dropping (or explicitly
/// [`Ref::release`]ing) it calls `release`.
pub struct Ref<T: ?Sized> {
    inner: Option<Arc<T>>,
}

impl<T: ?Sized> Ref<T> {
    /// Wraps an already-ref'd `Arc<T>` (i.e. one whose `RefCount` has
    /// already counted this reference, as happens immediately after
    /// construction). Use [`Ref::clone`] rather than this constructor to
    /// take out additional references to an existing object.
    pub fn from_arc(arc: Arc<T>) -> Self {
        Self { inner: Some(arc) }
    }

    pub fn get(&self) -> &T {
        self.inner
            .as_ref()
            .expect("Ref used after release")
    }

    /// Explicitly releases this handle before it would otherwise drop.
    /// Panics if called twice on the same handle (double release),
    /// matching [`RefCount::release`]'s contract.
    pub fn release(&mut self) {
        self.inner
            .take()
            .expect("Ref double release: release() called twice");
    }

    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }
}

impl<T: ?Sized> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ?Sized> std::ops::Deref for Ref<T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_count_starts_at_one() {
        let rc = RefCount::new();
        assert_eq!(rc.count(), 1);
    }

    #[test]
    fn add_ref_then_release_returns_to_one() {
        let rc = RefCount::new();
        assert_eq!(rc.add_ref(), 2);
        assert_eq!(rc.release(), 1);
    }

    #[test]
    #[should_panic(expected = "double release")]
    fn releasing_past_zero_panics() {
        let rc = RefCount::new();
        rc.release();
        rc.release();
    }

    #[test]
    #[should_panic(expected = "double release")]
    fn ref_release_called_twice_panics() {
        struct Dummy;
        let mut r = Ref::from_arc(Arc::new(Dummy));
        r.release();
        r.release();
    }

    #[test]
    fn query_interface_succeeds_for_matching_type() {
        trait Shape: Send + Sync {}
        struct Circle;
        impl Shape for Circle {}

        let any: Arc<dyn Any + Send + Sync> = Arc::new(Circle);
        let circle = query_interface::<Circle>(any);
        assert!(circle.is_some());
    }

    #[test]
    fn query_interface_fails_for_mismatched_type() {
        struct Circle;
        struct Square;

        let any: Arc<dyn Any + Send + Sync> = Arc::new(Circle);
        let square = query_interface::<Square>(any);
        assert!(square.is_none());
    }
}
