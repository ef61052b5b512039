//! Heap handles for object model values.
//!
//! Objects are reference counted. Identity comparisons go through
//! [`same_ref`], never through value equality. Reference cycles (an object
//! whose prototype chain or proxy handler points back at itself) are not
//! reclaimed; collection lives in the embedding VM.

use std::sync::Arc;

/// Handle to a heap-allocated object model value.
pub type GcRef<T> = Arc<T>;

/// Identity comparison of two handles.
#[inline]
pub fn same_ref<T: ?Sized>(a: &GcRef<T>, b: &GcRef<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Stable address of a handle, for logging and hashing by identity.
#[inline]
pub fn address_of<T: ?Sized>(handle: &GcRef<T>) -> usize {
    Arc::as_ptr(handle) as *const () as usize
}
