use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// A read-only reference to one published version of a document or dynamic-shape set.
///
/// The version stays alive for as long as the checkout does, even if newer versions are published in the
/// meantime. Released on drop.
pub struct Checkout<'a, T> {
    value: Arc<T>,
    outstanding: &'a AtomicUsize,
}
impl<'a, T> Checkout<'a, T> {
    pub(super) fn new(value: Arc<T>, outstanding: &'a AtomicUsize) -> Self {
        outstanding.fetch_add(1, Ordering::AcqRel);
        Self { value, outstanding }
    }
    /// The shared version itself, to hold past the checkout's lifetime.
    #[must_use]
    pub fn shared(&self) -> Arc<T> {
        self.value.clone()
    }
}
impl<T> std::ops::Deref for Checkout<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.value
    }
}
impl<T> Drop for Checkout<'_, T> {
    fn drop(&mut self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}
