//! ArrayBuffer and SharedArrayBuffer storage.
//!
//! The byte vector is `None` once detached. Detachment is one-way and every
//! typed array viewing the buffer observes it, since views hold the buffer
//! object rather than a copy of its bytes. Shared buffers cannot be detached.

use crate::error::{VmError, VmResult};
use crate::gc::GcRef;
use crate::object::{JsObject, ObjectData};
use crate::value::{Value, same_value};
use parking_lot::RwLock;

/// Raw bytes behind an `ArrayBuffer` object
#[derive(Debug)]
pub struct JsArrayBuffer {
    data: RwLock<Option<Vec<u8>>>,
    shared: bool,
    detach_key: Value,
}

fn detached_error() -> VmError {
    VmError::type_error("Cannot perform operation on a detached ArrayBuffer")
}

impl JsArrayBuffer {
    /// A zero-filled buffer
    pub fn new(byte_length: usize) -> Self {
        Self::from_bytes(vec![0; byte_length])
    }

    /// A buffer owning `bytes`
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(Some(bytes)),
            shared: false,
            detach_key: Value::undefined(),
        }
    }

    /// A zero-filled `SharedArrayBuffer`
    pub fn new_shared(byte_length: usize) -> Self {
        Self {
            shared: true,
            ..Self::new(byte_length)
        }
    }

    /// Require `key` on [`Self::detach`]
    pub fn with_detach_key(mut self, key: Value) -> Self {
        self.detach_key = key;
        self
    }

    /// Whether this is a `SharedArrayBuffer`
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Check if the buffer is detached
    #[inline]
    pub fn is_detached(&self) -> bool {
        self.data.read().is_none()
    }

    /// Byte length (0 if detached)
    pub fn byte_length(&self) -> usize {
        self.data.read().as_ref().map_or(0, Vec::len)
    }

    /// DetachArrayBuffer. `key` must match the buffer's detach key.
    pub fn detach(&self, key: &Value) -> VmResult<()> {
        if self.shared {
            return Err(VmError::type_error("Cannot detach a SharedArrayBuffer"));
        }
        if !same_value(&self.detach_key, key) {
            return Err(VmError::type_error("ArrayBuffer detach key mismatch"));
        }
        let released = self.data.write().take();
        if let Some(bytes) = released {
            tracing::debug!(
                target: "otter::object",
                byte_length = bytes.len(),
                "array buffer detached"
            );
        }
        Ok(())
    }

    /// Move the bytes into a new buffer and detach this one
    pub fn transfer(&self) -> VmResult<JsArrayBuffer> {
        if self.shared {
            return Err(VmError::type_error("Cannot transfer a SharedArrayBuffer"));
        }
        let bytes = self.data.write().take().ok_or_else(detached_error)?;
        tracing::debug!(
            target: "otter::object",
            byte_length = bytes.len(),
            "array buffer transferred"
        );
        Ok(JsArrayBuffer::from_bytes(bytes))
    }

    /// Copy bytes `start..end` (clamped) into a new buffer
    pub fn slice(&self, start: usize, end: usize) -> VmResult<JsArrayBuffer> {
        let guard = self.data.read();
        let data = guard.as_ref().ok_or_else(detached_error)?;
        let start = start.min(data.len());
        let end = end.clamp(start, data.len());
        Ok(JsArrayBuffer::from_bytes(data[start..end].to_vec()))
    }

    /// Read a byte at the given index
    pub fn get(&self, index: usize) -> Option<u8> {
        self.data.read().as_ref()?.get(index).copied()
    }

    /// Write a byte at the given index
    pub fn set(&self, index: usize, value: u8) -> bool {
        self.write_bytes(index, &[value])
    }

    /// Read bytes into a slice
    pub fn read_bytes(&self, offset: usize, dest: &mut [u8]) -> bool {
        let guard = self.data.read();
        match guard.as_ref().and_then(|d| d.get(offset..offset + dest.len())) {
            Some(src) => {
                dest.copy_from_slice(src);
                true
            }
            None => false,
        }
    }

    /// Write bytes from a slice
    pub fn write_bytes(&self, offset: usize, src: &[u8]) -> bool {
        let mut guard = self.data.write();
        match guard.as_mut().and_then(|d| d.get_mut(offset..offset + src.len())) {
            Some(dest) => {
                dest.copy_from_slice(src);
                true
            }
            None => false,
        }
    }

    /// Run `f` over the bytes; `None` if detached
    pub fn with_data<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&[u8]) -> R,
    {
        self.data.read().as_deref().map(f)
    }

    /// Run `f` over the bytes mutably; `None` if detached
    pub fn with_data_mut<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        self.data.write().as_deref_mut().map(f)
    }
}

impl JsObject {
    /// Create an `ArrayBuffer` (or `SharedArrayBuffer`) object
    pub fn array_buffer(prototype: Option<GcRef<JsObject>>, buffer: JsArrayBuffer) -> GcRef<Self> {
        Self::with_data(prototype, ObjectData::ArrayBuffer(buffer))
    }
}
