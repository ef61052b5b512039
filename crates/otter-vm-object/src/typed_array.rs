//! TypedArray views.
//!
//! A typed array is a fixed-kind window over an `ArrayBuffer` object. All
//! eleven kinds share one implementation through [`TypedArrayKind`]; element
//! bytes are little-endian.
//!
//! Keys that are canonical numeric strings never reach the ordinary property
//! store: valid indices hit the buffer, everything else numeric is absent.
//! Once the buffer is detached the view reads as empty and element writes
//! are dropped; only the explicit operations (`fill`, `subarray`, `slice`,
//! `copy_within`, `reverse`, `validate`) throw.

use crate::array_buffer::JsArrayBuffer;
use crate::context::NativeContext;
use crate::convert::{
    canonical_numeric_index_string, to_bigint64, to_biguint64, to_int8, to_int16, to_int32,
    to_uint8, to_uint8_clamp, to_uint16, to_uint32,
};
use crate::error::{VmError, VmResult, reject};
use crate::gc::GcRef;
use crate::object::{JsObject, ObjectData, receiver_is};
use crate::ordinary;
use crate::property::{DefineDescriptor, PropertyAttributes, PropertyDescriptor, PropertyKey};
use crate::value::Value;
use num_bigint::BigInt;

/// The kind of TypedArray - determines element size and interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypedArrayKind {
    /// Int8Array - 8-bit signed integers
    Int8,
    /// Uint8Array - 8-bit unsigned integers
    Uint8,
    /// Uint8ClampedArray - 8-bit unsigned integers (clamped)
    Uint8Clamped,
    /// Int16Array - 16-bit signed integers
    Int16,
    /// Uint16Array - 16-bit unsigned integers
    Uint16,
    /// Int32Array - 32-bit signed integers
    Int32,
    /// Uint32Array - 32-bit unsigned integers
    Uint32,
    /// Float32Array - 32-bit floating point
    Float32,
    /// Float64Array - 64-bit floating point
    Float64,
    /// BigInt64Array - 64-bit signed integers (BigInt)
    BigInt64,
    /// BigUint64Array - 64-bit unsigned integers (BigInt)
    BigUint64,
}

impl TypedArrayKind {
    /// All kinds, in constructor order
    pub const ALL: [TypedArrayKind; 11] = [
        TypedArrayKind::Int8,
        TypedArrayKind::Uint8,
        TypedArrayKind::Uint8Clamped,
        TypedArrayKind::Int16,
        TypedArrayKind::Uint16,
        TypedArrayKind::Int32,
        TypedArrayKind::Uint32,
        TypedArrayKind::Float32,
        TypedArrayKind::Float64,
        TypedArrayKind::BigInt64,
        TypedArrayKind::BigUint64,
    ];

    /// Get the byte size of each element
    pub fn element_size(&self) -> usize {
        match self {
            TypedArrayKind::Int8 | TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => 1,
            TypedArrayKind::Int16 | TypedArrayKind::Uint16 => 2,
            TypedArrayKind::Int32 | TypedArrayKind::Uint32 | TypedArrayKind::Float32 => 4,
            TypedArrayKind::Float64 | TypedArrayKind::BigInt64 | TypedArrayKind::BigUint64 => 8,
        }
    }

    /// Get the name of this TypedArray type
    pub fn name(&self) -> &'static str {
        match self {
            TypedArrayKind::Int8 => "Int8Array",
            TypedArrayKind::Uint8 => "Uint8Array",
            TypedArrayKind::Uint8Clamped => "Uint8ClampedArray",
            TypedArrayKind::Int16 => "Int16Array",
            TypedArrayKind::Uint16 => "Uint16Array",
            TypedArrayKind::Int32 => "Int32Array",
            TypedArrayKind::Uint32 => "Uint32Array",
            TypedArrayKind::Float32 => "Float32Array",
            TypedArrayKind::Float64 => "Float64Array",
            TypedArrayKind::BigInt64 => "BigInt64Array",
            TypedArrayKind::BigUint64 => "BigUint64Array",
        }
    }

    /// Check if this is a BigInt typed array
    pub fn is_bigint(&self) -> bool {
        matches!(self, TypedArrayKind::BigInt64 | TypedArrayKind::BigUint64)
    }

    /// Decode one element from little-endian bytes
    fn decode(&self, bytes: &[u8]) -> Value {
        let mut raw = [0u8; 8];
        raw[..bytes.len()].copy_from_slice(bytes);
        let [b0, b1, b2, b3, ..] = raw;
        match self {
            TypedArrayKind::Int8 => Value::int32(i32::from(b0 as i8)),
            TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => Value::int32(i32::from(b0)),
            TypedArrayKind::Int16 => Value::int32(i32::from(i16::from_le_bytes([b0, b1]))),
            TypedArrayKind::Uint16 => Value::int32(i32::from(u16::from_le_bytes([b0, b1]))),
            TypedArrayKind::Int32 => Value::int32(i32::from_le_bytes([b0, b1, b2, b3])),
            TypedArrayKind::Uint32 => Value::number(f64::from(u32::from_le_bytes([b0, b1, b2, b3]))),
            TypedArrayKind::Float32 => Value::number(f64::from(f32::from_le_bytes([b0, b1, b2, b3]))),
            TypedArrayKind::Float64 => Value::number(f64::from_le_bytes(raw)),
            TypedArrayKind::BigInt64 => Value::bigint(BigInt::from(i64::from_le_bytes(raw))),
            TypedArrayKind::BigUint64 => Value::bigint(BigInt::from(u64::from_le_bytes(raw))),
        }
    }

    /// Encode a converted element into little-endian bytes
    fn encode(&self, value: &ElementValue) -> [u8; 8] {
        let mut out = [0u8; 8];
        match (self, value) {
            (TypedArrayKind::Int8, ElementValue::Number(n)) => out[0] = to_int8(*n) as u8,
            (TypedArrayKind::Uint8, ElementValue::Number(n)) => out[0] = to_uint8(*n),
            (TypedArrayKind::Uint8Clamped, ElementValue::Number(n)) => out[0] = to_uint8_clamp(*n),
            (TypedArrayKind::Int16, ElementValue::Number(n)) => {
                out[..2].copy_from_slice(&to_int16(*n).to_le_bytes())
            }
            (TypedArrayKind::Uint16, ElementValue::Number(n)) => {
                out[..2].copy_from_slice(&to_uint16(*n).to_le_bytes())
            }
            (TypedArrayKind::Int32, ElementValue::Number(n)) => {
                out[..4].copy_from_slice(&to_int32(*n).to_le_bytes())
            }
            (TypedArrayKind::Uint32, ElementValue::Number(n)) => {
                out[..4].copy_from_slice(&to_uint32(*n).to_le_bytes())
            }
            (TypedArrayKind::Float32, ElementValue::Number(n)) => {
                out[..4].copy_from_slice(&(*n as f32).to_le_bytes())
            }
            (TypedArrayKind::Float64, ElementValue::Number(n)) => out = n.to_le_bytes(),
            (TypedArrayKind::BigInt64, ElementValue::BigInt(b)) => out = to_bigint64(b).to_le_bytes(),
            (TypedArrayKind::BigUint64, ElementValue::BigInt(b)) => out = to_biguint64(b).to_le_bytes(),
            // Conversion picks the variant from the kind, so these cannot meet.
            _ => {}
        }
        out
    }
}

/// A value already converted for storage in some kind
#[derive(Debug, Clone)]
enum ElementValue {
    Number(f64),
    BigInt(BigInt),
}

/// A view over an `ArrayBuffer` object
#[derive(Debug)]
pub struct JsTypedArray {
    buffer: GcRef<JsObject>,
    byte_offset: usize,
    length: usize,
    kind: TypedArrayKind,
}

fn detached_error() -> VmError {
    VmError::type_error("Cannot perform operation on a detached ArrayBuffer")
}

/// Clamp a relative index (negative counts from the end) into `0..=len`
fn relative_index(relative: i64, len: usize) -> usize {
    if relative < 0 {
        (len as i64 + relative).max(0) as usize
    } else {
        (relative as usize).min(len)
    }
}

impl JsTypedArray {
    /// View `buffer` from `byte_offset`, covering `length` elements or, when
    /// omitted, the rest of the buffer
    pub fn new(
        buffer: GcRef<JsObject>,
        kind: TypedArrayKind,
        byte_offset: usize,
        length: Option<usize>,
    ) -> VmResult<Self> {
        let Some(data) = buffer.as_array_buffer() else {
            return Err(VmError::type_error("First argument to TypedArray constructor must be an ArrayBuffer"));
        };
        if data.is_detached() {
            return Err(detached_error());
        }
        let elem_size = kind.element_size();
        if byte_offset % elem_size != 0 {
            return Err(VmError::range_error(format!(
                "start offset of {} should be a multiple of {elem_size}",
                kind.name()
            )));
        }
        let buffer_length = data.byte_length();
        let length = match length {
            Some(length) => {
                let end = length
                    .checked_mul(elem_size)
                    .and_then(|bytes| bytes.checked_add(byte_offset));
                if end.is_none_or(|end| end > buffer_length) {
                    return Err(VmError::range_error(format!("Invalid typed array length: {length}")));
                }
                length
            }
            None => {
                if buffer_length % elem_size != 0 {
                    return Err(VmError::range_error(format!(
                        "byte length of {} should be a multiple of {elem_size}",
                        kind.name()
                    )));
                }
                if byte_offset > buffer_length {
                    return Err(VmError::range_error(format!(
                        "Start offset {byte_offset} is outside the bounds of the buffer"
                    )));
                }
                (buffer_length - byte_offset) / elem_size
            }
        };
        Ok(Self {
            buffer,
            byte_offset,
            length,
            kind,
        })
    }

    /// A zero-filled array with its own buffer
    pub fn with_length(kind: TypedArrayKind, length: usize) -> Self {
        let buffer = JsObject::array_buffer(None, JsArrayBuffer::new(length * kind.element_size()));
        Self {
            buffer,
            byte_offset: 0,
            length,
            kind,
        }
    }

    /// Get the kind of this TypedArray
    pub fn kind(&self) -> TypedArrayKind {
        self.kind
    }

    /// The buffer object
    pub fn buffer(&self) -> &GcRef<JsObject> {
        &self.buffer
    }

    fn data(&self) -> Option<&JsArrayBuffer> {
        self.buffer.as_array_buffer().filter(|data| !data.is_detached())
    }

    /// Get the byte offset into the buffer
    pub fn byte_offset(&self) -> usize {
        if self.is_detached() { 0 } else { self.byte_offset }
    }

    /// Get the byte length of the view (0 once detached)
    pub fn byte_length(&self) -> usize {
        self.length() * self.kind.element_size()
    }

    /// Get the number of elements (0 once detached)
    pub fn length(&self) -> usize {
        if self.is_detached() { 0 } else { self.length }
    }

    /// Check if the underlying buffer is detached
    pub fn is_detached(&self) -> bool {
        self.data().is_none()
    }

    /// ValidateTypedArray: fail on a detached buffer
    pub fn validate(&self) -> VmResult<()> {
        if self.is_detached() {
            return Err(detached_error());
        }
        Ok(())
    }

    /// IsValidIntegerIndex
    pub fn valid_index(&self, index: f64) -> Option<usize> {
        if index.fract() != 0.0 || index < 0.0 || (index == 0.0 && index.is_sign_negative()) {
            return None;
        }
        let length = self.length();
        (index < length as f64).then_some(index as usize)
    }

    /// Read element `index`
    pub fn get(&self, index: usize) -> Option<Value> {
        if index >= self.length() {
            return None;
        }
        let size = self.kind.element_size();
        let mut bytes = [0u8; 8];
        let data = self.data()?;
        data.read_bytes(self.byte_offset + index * size, &mut bytes[..size])
            .then(|| self.kind.decode(&bytes[..size]))
    }

    fn convert(&self, ncx: &mut NativeContext, value: &Value) -> VmResult<ElementValue> {
        if self.kind.is_bigint() {
            Ok(ElementValue::BigInt(ncx.to_bigint(value)?))
        } else {
            Ok(ElementValue::Number(ncx.to_number(value)?))
        }
    }

    fn write_converted(&self, index: usize, value: &ElementValue) -> bool {
        if index >= self.length() {
            return false;
        }
        let size = self.kind.element_size();
        let bytes = self.kind.encode(value);
        self.data()
            .is_some_and(|data| data.write_bytes(self.byte_offset + index * size, &bytes[..size]))
    }

    /// TypedArraySetElement: convert `value` (which may run script), then
    /// store it if `index` is still valid. Out-of-range and detached writes
    /// are dropped.
    pub fn set_element(&self, ncx: &mut NativeContext, index: f64, value: &Value) -> VmResult<()> {
        let converted = self.convert(ncx, value)?;
        if let Some(index) = self.valid_index(index) {
            self.write_converted(index, &converted);
        }
        Ok(())
    }

    /// `fill(value, start, end)`
    pub fn fill(&self, ncx: &mut NativeContext, value: &Value, start: Option<i64>, end: Option<i64>) -> VmResult<()> {
        self.validate()?;
        let converted = self.convert(ncx, value)?;
        self.validate()?;
        let len = self.length();
        let start = start.map_or(0, |s| relative_index(s, len));
        let end = end.map_or(len, |e| relative_index(e, len));
        for i in start..end {
            self.write_converted(i, &converted);
        }
        Ok(())
    }

    /// `subarray(begin, end)`: a new view over the same buffer
    pub fn subarray(&self, begin: i64, end: Option<i64>) -> VmResult<JsTypedArray> {
        self.validate()?;
        let len = self.length;
        let start = relative_index(begin, len);
        let end = end.map_or(len, |e| relative_index(e, len));
        Ok(JsTypedArray {
            buffer: self.buffer.clone(),
            byte_offset: self.byte_offset + start * self.kind.element_size(),
            length: end.saturating_sub(start),
            kind: self.kind,
        })
    }

    /// `slice(begin, end)`: a copy in a fresh buffer
    pub fn slice(&self, begin: i64, end: Option<i64>) -> VmResult<JsTypedArray> {
        let data = self.data().ok_or_else(detached_error)?;
        let len = self.length;
        let start = relative_index(begin, len);
        let end = end.map_or(len, |e| relative_index(e, len));
        let size = self.kind.element_size();
        let from = self.byte_offset + start * size;
        let to = self.byte_offset + end.max(start) * size;
        let copy = data.slice(from, to)?;
        let buffer_proto = self.buffer.prototype();
        Ok(JsTypedArray {
            buffer: JsObject::array_buffer(buffer_proto, copy),
            byte_offset: 0,
            length: end.saturating_sub(start),
            kind: self.kind,
        })
    }

    /// `copyWithin(target, start, end)`
    pub fn copy_within(&self, target: i64, start: i64, end: Option<i64>) -> VmResult<()> {
        let data = self.data().ok_or_else(detached_error)?;
        let len = self.length;
        let to = relative_index(target, len);
        let from = relative_index(start, len);
        let end = end.map_or(len, |e| relative_index(e, len));
        let count = end.saturating_sub(from).min(len - to);
        if count == 0 {
            return Ok(());
        }
        let size = self.kind.element_size();
        let src = self.byte_offset + from * size;
        let dst = self.byte_offset + to * size;
        data.with_data_mut(|bytes| bytes.copy_within(src..src + count * size, dst))
            .ok_or_else(detached_error)
    }

    /// `reverse()` in place
    pub fn reverse(&self) -> VmResult<()> {
        let data = self.data().ok_or_else(detached_error)?;
        let len = self.length;
        if len <= 1 {
            return Ok(());
        }
        let size = self.kind.element_size();
        let offset = self.byte_offset;
        data.with_data_mut(|bytes| {
            let view = &mut bytes[offset..offset + len * size];
            let (mut i, mut j) = (0, len - 1);
            while i < j {
                for k in 0..size {
                    view.swap(i * size + k, j * size + k);
                }
                i += 1;
                j -= 1;
            }
        })
        .ok_or_else(detached_error)
    }
}

impl JsObject {
    /// Create a typed array object
    pub fn typed_array(prototype: Option<GcRef<JsObject>>, view: JsTypedArray) -> GcRef<Self> {
        Self::with_data(prototype, ObjectData::TypedArray(view))
    }
}

/// Numeric value of `key` when it is a canonical numeric string
fn numeric_key(key: &PropertyKey) -> Option<f64> {
    match key {
        PropertyKey::Index(i) => Some(f64::from(*i)),
        PropertyKey::String(s) => canonical_numeric_index_string(s.as_str()),
        PropertyKey::Symbol(_) => None,
    }
}

/// Attributes every live element reports
const ELEMENT_ATTRIBUTES: PropertyAttributes =
    PropertyAttributes::WRITABLE.union(PropertyAttributes::ENUMERABLE);

/// `[[GetOwnProperty]]`
pub(crate) fn get_own_property(obj: &JsObject, ta: &JsTypedArray, key: &PropertyKey) -> Option<PropertyDescriptor> {
    match numeric_key(key) {
        Some(n) => {
            let value = ta.get(ta.valid_index(n)?)?;
            Some(PropertyDescriptor::data_with_attrs(value, ELEMENT_ATTRIBUTES))
        }
        None => ordinary::get_own_property(obj, key),
    }
}

/// `[[HasProperty]]`
pub(crate) fn has_property(
    ncx: &mut NativeContext,
    obj: &GcRef<JsObject>,
    ta: &JsTypedArray,
    key: &PropertyKey,
) -> VmResult<bool> {
    match numeric_key(key) {
        Some(n) => Ok(ta.valid_index(n).is_some()),
        None => ordinary::has_property(ncx, obj, key),
    }
}

/// `[[DefineOwnProperty]]`
pub(crate) fn define_own_property(
    ncx: &mut NativeContext,
    obj: &GcRef<JsObject>,
    ta: &JsTypedArray,
    key: &PropertyKey,
    desc: &DefineDescriptor,
    do_throw: bool,
) -> VmResult<bool> {
    let Some(n) = numeric_key(key) else {
        return ordinary::define_own_property(obj, key, desc, do_throw);
    };
    if ta.valid_index(n).is_none() {
        return reject(do_throw, || format!("Invalid typed array index: {key}"));
    }
    let incompatible = desc.configurable == Some(true)
        || desc.enumerable == Some(false)
        || desc.is_accessor_descriptor()
        || desc.writable == Some(false);
    if incompatible {
        return reject(do_throw, || format!("Cannot redefine property: {key}"));
    }
    if let Some(value) = &desc.value {
        ta.set_element(ncx, n, value)?;
    }
    Ok(true)
}

/// `[[Get]]`
pub(crate) fn get(
    ncx: &mut NativeContext,
    obj: &GcRef<JsObject>,
    ta: &JsTypedArray,
    key: &PropertyKey,
    receiver: &Value,
) -> VmResult<Value> {
    match numeric_key(key) {
        Some(n) => Ok(ta
            .valid_index(n)
            .and_then(|i| ta.get(i))
            .unwrap_or_default()),
        None => ordinary::get(ncx, obj, key, receiver),
    }
}

/// `[[Set]]`
pub(crate) fn set(
    ncx: &mut NativeContext,
    obj: &GcRef<JsObject>,
    ta: &JsTypedArray,
    key: &PropertyKey,
    value: Value,
    receiver: &Value,
) -> VmResult<bool> {
    match numeric_key(key) {
        Some(n) if receiver_is(obj, receiver) => {
            ta.set_element(ncx, n, &value)?;
            Ok(true)
        }
        Some(n) if ta.valid_index(n).is_none() => Ok(true),
        _ => ordinary::set(ncx, obj, key, value, receiver),
    }
}

/// `[[Delete]]`
pub(crate) fn delete(obj: &JsObject, ta: &JsTypedArray, key: &PropertyKey) -> bool {
    match numeric_key(key) {
        Some(n) => ta.valid_index(n).is_none(),
        None => ordinary::delete(obj, key),
    }
}

/// `[[OwnPropertyKeys]]`: live indices, then ordinary keys
pub(crate) fn own_property_keys(obj: &JsObject, ta: &JsTypedArray) -> Vec<PropertyKey> {
    let mut keys: Vec<PropertyKey> = (0..ta.length() as u64).map(PropertyKey::from_u64).collect();
    keys.extend(ordinary::own_property_keys(obj));
    keys
}

/// SetIntegrityLevel. Elements are already non-configurable, so sealing
/// only touches named properties; freezing fails while elements exist, after
/// the object has already been made non-extensible.
pub(crate) fn set_integrity_level(
    _ncx: &mut NativeContext,
    obj: &GcRef<JsObject>,
    ta: &JsTypedArray,
    frozen: bool,
) -> VmResult<bool> {
    ordinary::prevent_extensions(obj);
    if frozen && ta.length() > 0 {
        return Err(VmError::type_error("Cannot freeze array buffer views with elements"));
    }
    ordinary::set_integrity_level_fast(obj, frozen);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int32_array(values: &[i32]) -> JsTypedArray {
        let ta = JsTypedArray::with_length(TypedArrayKind::Int32, values.len());
        let mut ncx = NativeContext::new();
        for (i, v) in values.iter().enumerate() {
            ta.set_element(&mut ncx, i as f64, &Value::int32(*v)).unwrap();
        }
        ta
    }

    fn detach(ta: &JsTypedArray) {
        ta.buffer()
            .as_array_buffer()
            .unwrap()
            .detach(&Value::undefined())
            .unwrap();
    }

    #[test]
    fn test_create_int32_array() {
        let buffer = JsObject::array_buffer(None, JsArrayBuffer::new(16));
        let ta = JsTypedArray::new(buffer, TypedArrayKind::Int32, 0, Some(4)).unwrap();
        assert_eq!(ta.length(), 4);
        assert_eq!(ta.byte_length(), 16);
        assert_eq!(ta.byte_offset(), 0);
    }

    #[test]
    fn test_construction_errors() {
        let buffer = JsObject::array_buffer(None, JsArrayBuffer::new(10));
        let misaligned = JsTypedArray::new(buffer.clone(), TypedArrayKind::Int32, 1, Some(1));
        assert!(misaligned.unwrap_err().is_range_error());
        let too_long = JsTypedArray::new(buffer.clone(), TypedArrayKind::Int32, 4, Some(2));
        assert!(too_long.unwrap_err().is_range_error());
        let remainder = JsTypedArray::new(buffer.clone(), TypedArrayKind::Int32, 0, None);
        assert!(remainder.unwrap_err().is_range_error());
        let derived = JsTypedArray::new(buffer.clone(), TypedArrayKind::Int16, 4, None).unwrap();
        assert_eq!(derived.length(), 3);

        buffer.as_array_buffer().unwrap().detach(&Value::undefined()).unwrap();
        let detached = JsTypedArray::new(buffer, TypedArrayKind::Int8, 0, None);
        assert!(detached.unwrap_err().is_type_error());

        let not_buffer = JsTypedArray::new(JsObject::ordinary(None), TypedArrayKind::Int8, 0, None);
        assert!(not_buffer.unwrap_err().is_type_error());
    }

    #[test]
    fn test_element_conversions() {
        let mut ncx = NativeContext::new();
        let cases: [(TypedArrayKind, f64, Value); 8] = [
            (TypedArrayKind::Int8, 200.0, Value::int32(-56)),
            (TypedArrayKind::Uint8, -1.0, Value::int32(255)),
            (TypedArrayKind::Uint8Clamped, 300.0, Value::int32(255)),
            (TypedArrayKind::Uint8Clamped, 2.5, Value::int32(2)),
            (TypedArrayKind::Int16, 40000.0, Value::int32(-25536)),
            (TypedArrayKind::Uint32, -1.0, Value::number(4294967295.0)),
            (TypedArrayKind::Float32, 0.1, Value::number(f64::from(0.1f32))),
            (TypedArrayKind::Float64, -0.0, Value::number(-0.0)),
        ];
        for (kind, input, expected) in cases {
            let ta = JsTypedArray::with_length(kind, 1);
            ta.set_element(&mut ncx, 0.0, &Value::number(input)).unwrap();
            assert_eq!(ta.get(0), Some(expected), "{}", kind.name());
        }
    }

    #[test]
    fn test_bigint_kinds() {
        let mut ncx = NativeContext::new();
        let ta = JsTypedArray::with_length(TypedArrayKind::BigUint64, 1);
        ta.set_element(&mut ncx, 0.0, &Value::bigint(BigInt::from(-1))).unwrap();
        assert_eq!(ta.get(0), Some(Value::bigint(BigInt::from(u64::MAX))));
        let err = ta.set_element(&mut ncx, 0.0, &Value::int32(1)).unwrap_err();
        assert!(err.is_type_error());

        let signed = JsTypedArray::with_length(TypedArrayKind::BigInt64, 1);
        signed.set_element(&mut ncx, 0.0, &Value::bigint(BigInt::from(u64::MAX))).unwrap();
        assert_eq!(signed.get(0), Some(Value::bigint(BigInt::from(-1))));
    }

    #[test]
    fn test_invalid_indices_are_ignored() {
        let mut ncx = NativeContext::new();
        let ta = int32_array(&[1, 2]);
        ta.set_element(&mut ncx, 2.0, &Value::int32(9)).unwrap();
        ta.set_element(&mut ncx, 0.5, &Value::int32(9)).unwrap();
        ta.set_element(&mut ncx, -0.0, &Value::int32(9)).unwrap();
        assert_eq!(ta.get(0), Some(Value::int32(1)));
        assert_eq!(ta.valid_index(-0.0), None);
        assert_eq!(ta.valid_index(f64::NAN), None);
        assert_eq!(ta.valid_index(1.0), Some(1));
    }

    #[test]
    fn test_subarray_shares_buffer() {
        let mut ncx = NativeContext::new();
        let ta = int32_array(&[0, 1, 2, 3, 4, 5]);
        let sub = ta.subarray(2, Some(-1)).unwrap();
        assert_eq!(sub.length(), 3);
        assert_eq!(sub.get(0), Some(Value::int32(2)));
        sub.set_element(&mut ncx, 0.0, &Value::int32(100)).unwrap();
        assert_eq!(ta.get(2), Some(Value::int32(100)));
    }

    #[test]
    fn test_slice_copies() {
        let mut ncx = NativeContext::new();
        let ta = int32_array(&[0, 1, 2, 3]);
        let sliced = ta.slice(1, Some(3)).unwrap();
        assert_eq!(sliced.length(), 2);
        sliced.set_element(&mut ncx, 0.0, &Value::int32(50)).unwrap();
        assert_eq!(ta.get(1), Some(Value::int32(1)));
    }

    #[test]
    fn test_fill_copy_within_reverse() {
        let mut ncx = NativeContext::new();
        let ta = int32_array(&[1, 2, 3, 4, 5]);
        ta.copy_within(0, 3, None).unwrap();
        let values: Vec<Value> = (0..5).filter_map(|i| ta.get(i)).collect();
        assert_eq!(values, [4, 5, 3, 4, 5].map(Value::int32));

        ta.reverse().unwrap();
        let values: Vec<Value> = (0..5).filter_map(|i| ta.get(i)).collect();
        assert_eq!(values, [5, 4, 3, 5, 4].map(Value::int32));

        ta.fill(&mut ncx, &Value::int32(7), Some(-2), None).unwrap();
        assert_eq!(ta.get(3), Some(Value::int32(7)));
        assert_eq!(ta.get(2), Some(Value::int32(3)));
    }

    #[test]
    fn test_detached_view() {
        let mut ncx = NativeContext::new();
        let buffer = JsObject::array_buffer(None, JsArrayBuffer::new(16));
        let ta = JsTypedArray::new(buffer, TypedArrayKind::Int32, 4, Some(2)).unwrap();
        ta.set_element(&mut ncx, 0.0, &Value::int32(42)).unwrap();
        detach(&ta);

        assert!(ta.is_detached());
        assert_eq!(ta.length(), 0);
        assert_eq!(ta.byte_length(), 0);
        assert_eq!(ta.get(0), None);
        ta.set_element(&mut ncx, 0.0, &Value::int32(1)).unwrap();

        assert!(ta.validate().unwrap_err().is_type_error());
        assert!(ta.fill(&mut ncx, &Value::int32(0), None, None).is_err());
        assert!(ta.subarray(0, None).is_err());
        assert!(ta.slice(0, None).is_err());
        assert!(ta.copy_within(0, 1, None).is_err());
        assert!(ta.reverse().is_err());
    }

    #[test]
    fn test_exotic_methods() {
        let mut ncx = NativeContext::new();
        let obj = JsObject::typed_array(None, int32_array(&[10, 20]));
        let key = PropertyKey::index(1);
        let desc = obj.get_own_property(&mut ncx, &key).unwrap().unwrap();
        assert!(desc.is_writable() && desc.is_enumerable() && !desc.is_configurable());

        assert_eq!(obj.get_value(&mut ncx, &PropertyKey::string("-0")).unwrap(), Value::undefined());
        assert!(!obj.has_property(&mut ncx, &PropertyKey::string("1.5")).unwrap());
        assert!(obj.has_property(&mut ncx, &key).unwrap());
        // Non-canonical numeric strings are ordinary keys.
        obj.put(&mut ncx, &PropertyKey::string("01"), Value::int32(3), true).unwrap();
        assert!(obj.has_own_property(&mut ncx, &PropertyKey::string("01")).unwrap());

        assert!(!obj.delete(&mut ncx, &key).unwrap());
        assert!(obj.delete(&mut ncx, &PropertyKey::index(7)).unwrap());
        assert!(obj.put(&mut ncx, &PropertyKey::index(7), Value::int32(1), true).unwrap());

        let keys = obj.own_property_keys(&mut ncx).unwrap();
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["0", "1", "01"]);
    }

    #[test]
    fn test_define_element_rules() {
        let mut ncx = NativeContext::new();
        let obj = JsObject::typed_array(None, int32_array(&[10, 20]));
        let key = PropertyKey::index(0);
        let ok = DefineDescriptor::value(Value::int32(5))
            .with_writable(true)
            .with_enumerable(true)
            .with_configurable(false);
        assert!(obj.define_own_property(&mut ncx, &key, &ok, true).unwrap());
        assert_eq!(obj.get_value(&mut ncx, &key).unwrap(), Value::int32(5));

        let configurable = DefineDescriptor::value(Value::int32(1)).with_configurable(true);
        assert!(obj.define_own_property(&mut ncx, &key, &configurable, true).is_err());
        let read_only = DefineDescriptor::default().with_writable(false);
        assert!(!obj.define_own_property(&mut ncx, &key, &read_only, false).unwrap());
        let past_end = DefineDescriptor::value(Value::int32(1));
        assert!(!obj.define_own_property(&mut ncx, &PropertyKey::index(2), &past_end, false).unwrap());
    }

    #[test]
    fn test_integrity_levels() {
        let mut ncx = NativeContext::new();
        let obj = JsObject::typed_array(None, int32_array(&[1]));
        let err = obj.set_integrity_level(&mut ncx, true, true).unwrap_err();
        assert!(err.is_type_error());
        assert!(!obj.is_extensible(&mut ncx).unwrap());
        assert!(obj.set_integrity_level(&mut ncx, false, true).unwrap());
        assert!(obj.test_integrity_level(&mut ncx, false).unwrap());

        let empty = JsObject::typed_array(None, JsTypedArray::with_length(TypedArrayKind::Uint8, 0));
        assert!(empty.set_integrity_level(&mut ncx, true, true).unwrap());
        assert!(empty.test_integrity_level(&mut ncx, true).unwrap());
    }
}
