//! # Handles
//!
//! Opaque integer names for objects handed across a boundary that can't carry references, such as
//! checkouts given to a renderer. A [`HandleRegistry`] owns the objects and a handle only names a slot,
//! so a stale or forged handle finds nothing instead of dangling.

use std::sync::atomic::{AtomicU64, Ordering};

/// Names one object in a [`HandleRegistry<T>`]. Never zero, never reused within a registry.
pub struct Handle<T> {
    id: std::num::NonZeroU64,
    // Namespace marker. `fn() -> T` keeps the handle Send + Sync whatever T is.
    _phantom: std::marker::PhantomData<fn() -> T>,
}
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}
impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<T> Eq for Handle<T> {}
impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Skip the full path of T, it's noise in logs.
        let name = std::any::type_name::<T>().rsplit("::").next().unwrap_or_default();
        write!(f, "Handle<{name}>#{}", self.id)
    }
}
impl<T> Handle<T> {
    /// The integer form, for crossing the boundary.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.id.get()
    }
    /// Rebuild from the integer form. Zero is never a valid handle.
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        std::num::NonZeroU64::new(raw).map(|id| Self {
            id,
            _phantom: std::marker::PhantomData,
        })
    }
}

/// Arena of objects named by [`Handle`]s.
pub struct HandleRegistry<T> {
    slots: parking_lot::Mutex<hashbrown::HashMap<u64, T>>,
    next: AtomicU64,
}
impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self {
            slots: parking_lot::Mutex::new(hashbrown::HashMap::new()),
            next: AtomicU64::new(1),
        }
    }
}
impl<T> HandleRegistry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    pub fn insert(&self, value: T) -> Handle<T> {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        self.slots.lock().insert(raw, value);
        // Unwrap OK - starts at one and a u64 won't wrap in practice.
        Handle::from_raw(raw).unwrap()
    }
    /// Take the object out, ending the handle's life.
    pub fn remove(&self, handle: Handle<T>) -> Option<T> {
        self.slots.lock().remove(&handle.raw())
    }
    #[must_use]
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.slots.lock().contains_key(&handle.raw())
    }
    /// Run `f` on the object, if the handle is live.
    pub fn with<R>(&self, handle: Handle<T>, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.slots.lock().get(&handle.raw()).map(f)
    }
    /// Number of live handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
impl<T: Clone> HandleRegistry<T> {
    #[must_use]
    pub fn get(&self, handle: Handle<T>) -> Option<T> {
        self.with(handle, T::clone)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn handles_are_unique_and_die() {
        let registry = HandleRegistry::<&'static str>::new();
        let a = registry.insert("a");
        let b = registry.insert("b");
        assert_ne!(a, b);
        assert_eq!(registry.get(b), Some("b"));
        assert_eq!(registry.remove(a), Some("a"));
        assert_eq!(registry.remove(a), None);
        assert_eq!(registry.len(), 1);
        // A handle that was never issued names nothing.
        assert_eq!(registry.get(Handle::from_raw(999).unwrap()), None);
        assert!(Handle::<u8>::from_raw(0).is_none());
    }
}
