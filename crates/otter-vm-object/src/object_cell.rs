//! Thread-confined interior mutability for object state.
//!
//! `ObjectCell<T>` wraps a `RefCell<T>` so object state (shape, slots,
//! element storage) can be mutated through shared handles. Overlapping
//! mutable borrows panic in every build mode, which is how reentrancy bugs
//! surface: no borrow may be held across a call into a getter, setter or
//! proxy trap.
//!
//! # Safety
//!
//! Objects belong to one execution thread at a time. Only shapes and their
//! transition caches are shared between threads, and those use `DashMap`
//! rather than this cell.

use std::cell::{Ref, RefCell, RefMut};
use std::ops::{Deref, DerefMut};

/// Thread-confined interior mutability wrapper used inside `JsObject`.
pub struct ObjectCell<T> {
    value: RefCell<T>,
}

impl<T> ObjectCell<T> {
    /// Create a new `ObjectCell` with the given value.
    #[inline]
    pub fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
        }
    }

    /// Borrow the value immutably.
    ///
    /// Panics if an exclusive borrow is active.
    #[inline]
    pub fn borrow(&self) -> ObjectCellRef<'_, T> {
        ObjectCellRef {
            inner: self.value.borrow(),
        }
    }

    /// Borrow the value mutably.
    ///
    /// Panics if any borrow (shared or exclusive) is active.
    #[inline]
    pub fn borrow_mut(&self) -> ObjectCellRefMut<'_, T> {
        ObjectCellRefMut {
            inner: self.value.borrow_mut(),
        }
    }

    /// Replace the value, returning the old one.
    #[inline]
    pub fn replace(&self, value: T) -> T {
        self.value.replace(value)
    }
}

// SAFETY: object state is confined to the thread running the owning
// context; see the module docs.
unsafe impl<T: Send> Send for ObjectCell<T> {}
unsafe impl<T: Send + Sync> Sync for ObjectCell<T> {}

impl<T: std::fmt::Debug> std::fmt::Debug for ObjectCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.value.try_borrow() {
            Ok(value) => f.debug_tuple("ObjectCell").field(&*value).finish(),
            Err(_) => f.debug_tuple("ObjectCell").field(&"<borrowed>").finish(),
        }
    }
}

/// Immutable borrow guard for `ObjectCell<T>`.
pub struct ObjectCellRef<'a, T> {
    inner: Ref<'a, T>,
}

impl<T> Deref for ObjectCellRef<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.inner
    }
}

/// Mutable borrow guard for `ObjectCell<T>`.
pub struct ObjectCellRefMut<'a, T> {
    inner: RefMut<'a, T>,
}

impl<T> Deref for ObjectCellRefMut<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for ObjectCellRefMut<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_borrow_and_replace() {
        let cell = ObjectCell::new(vec![1, 2]);
        cell.borrow_mut().push(3);
        assert_eq!(cell.borrow().len(), 3);
        let old = cell.replace(Vec::new());
        assert_eq!(old, vec![1, 2, 3]);
        assert!(cell.borrow().is_empty());
    }

    #[test]
    #[should_panic(expected = "already borrowed")]
    fn test_reentrant_mutation_panics() {
        let cell = ObjectCell::new(0u32);
        let _reader = cell.borrow();
        let _writer = cell.borrow_mut();
    }
}
