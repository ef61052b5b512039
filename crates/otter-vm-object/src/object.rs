//! JavaScript objects and internal-method dispatch.
//!
//! A `JsObject` is a shape, a slot vector, an optional dictionary map and a
//! prototype link, plus a kind-specific payload ([`ObjectData`]). The
//! essential internal methods (`[[GetOwnProperty]]`, `[[DefineOwnProperty]]`,
//! `[[Get]]`, `[[Set]]`, ...) live here and dispatch on the payload:
//!
//! - ordinary objects, functions and arguments use [`crate::ordinary`]
//! - arrays route index keys and `length` through [`crate::array_operations`]
//! - typed arrays route numeric keys through [`crate::typed_array`]
//! - proxies route everything through [`crate::proxy_operations`]
//!
//! Object state sits in an [`ObjectCell`]. Borrows are always released
//! before calling into a getter, setter or trap.

use crate::array::{ArrayElements, ArrayStoreKind};
use crate::array_buffer::JsArrayBuffer;
use crate::array_operations;
use crate::context::NativeContext;
use crate::dictionary::DictionaryMap;
use crate::error::{VmError, VmResult, reject};
use crate::function::FunctionData;
use crate::gc::{GcRef, same_ref};
use crate::object_cell::{ObjectCell, ObjectCellRef, ObjectCellRefMut};
use crate::ordinary;
use crate::property::{DefineDescriptor, PropertyAttributes, PropertyDescriptor, PropertyKey};
use crate::proxy::JsProxy;
use crate::proxy_operations;
use crate::shape::{INLINE_SLOTS, ObjectKind, Shape, SlotKind, SlotLocation};
use crate::typed_array::{self, JsTypedArray};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Contents of one property slot
#[derive(Clone, Debug, PartialEq)]
pub enum SlotValue {
    /// Data property value
    Data(Value),
    /// Accessor pair, `None` for undefined
    Accessor {
        /// Getter
        get: Option<Value>,
        /// Setter
        set: Option<Value>,
    },
}

impl Default for SlotValue {
    fn default() -> Self {
        Self::Data(Value::undefined())
    }
}

impl SlotValue {
    /// Storage form of a complete descriptor
    pub fn from_descriptor(desc: &PropertyDescriptor) -> Self {
        match desc {
            PropertyDescriptor::Data { value, .. } => Self::Data(value.clone()),
            PropertyDescriptor::Accessor { get, set, .. } => Self::Accessor {
                get: get.clone(),
                set: set.clone(),
            },
        }
    }

    /// Rebuild a descriptor from slot contents and attributes
    pub fn to_descriptor(&self, attributes: PropertyAttributes) -> PropertyDescriptor {
        match self {
            Self::Data(value) => PropertyDescriptor::data_with_attrs(value.clone(), attributes),
            Self::Accessor { get, set } => {
                PropertyDescriptor::accessor(get.clone(), set.clone(), attributes)
            }
        }
    }
}

/// Inline slots plus an overflow block
#[derive(Debug, Default)]
pub(crate) struct SlotStorage {
    inline: [SlotValue; INLINE_SLOTS],
    overflow: Vec<SlotValue>,
}

impl SlotStorage {
    pub(crate) fn get(&self, location: SlotLocation) -> Option<&SlotValue> {
        match location {
            SlotLocation::Inline(i) => self.inline.get(i as usize),
            SlotLocation::Overflow(i) => self.overflow.get(i as usize),
            SlotLocation::Virtual => None,
        }
    }

    pub(crate) fn get_mut(&mut self, location: SlotLocation) -> Option<&mut SlotValue> {
        match location {
            SlotLocation::Inline(i) => self.inline.get_mut(i as usize),
            SlotLocation::Overflow(i) => self.overflow.get_mut(i as usize),
            SlotLocation::Virtual => None,
        }
    }

    pub(crate) fn set(&mut self, location: SlotLocation, value: SlotValue) {
        match location {
            SlotLocation::Inline(i) => self.inline[i as usize] = value,
            SlotLocation::Overflow(i) => {
                let i = i as usize;
                if i >= self.overflow.len() {
                    self.overflow.resize_with(i + 1, SlotValue::default);
                }
                self.overflow[i] = value;
            }
            SlotLocation::Virtual => {}
        }
    }

    /// Number of overflow slots in use
    pub(crate) fn overflow_len(&self) -> usize {
        self.overflow.len()
    }
}

/// Mutable per-object state
#[derive(Debug)]
pub(crate) struct ObjectState {
    pub(crate) shape: Arc<Shape>,
    pub(crate) slots: SlotStorage,
    pub(crate) dictionary: Option<Box<DictionaryMap>>,
    pub(crate) prototype: Option<GcRef<JsObject>>,
}

impl ObjectState {
    /// Move slot contents to match `new_shape`'s layout
    pub(crate) fn relayout(&mut self, new_shape: Arc<Shape>) {
        let mut slots = SlotStorage::default();
        for (key, slot) in new_shape.properties() {
            if slot.location == SlotLocation::Virtual {
                continue;
            }
            let value = self
                .shape
                .lookup(key)
                .and_then(|old| self.slots.get(old.location))
                .cloned()
                .unwrap_or_default();
            slots.set(slot.location, value);
        }
        self.slots = slots;
        self.shape = new_shape;
    }
}

/// Kind-specific payload
pub enum ObjectData {
    /// Plain object
    Ordinary,
    /// Arguments object
    Arguments,
    /// Array exotic object
    Array(ObjectCell<ArrayElements>),
    /// Function
    Function(FunctionData),
    /// ArrayBuffer
    ArrayBuffer(JsArrayBuffer),
    /// Typed array view
    TypedArray(JsTypedArray),
    /// Proxy
    Proxy(JsProxy),
}

impl ObjectData {
    /// Kind tag for shapes
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Ordinary => ObjectKind::Ordinary,
            Self::Arguments => ObjectKind::Arguments,
            Self::Array(_) => ObjectKind::Array,
            Self::Function(_) => ObjectKind::Function,
            Self::ArrayBuffer(_) => ObjectKind::ArrayBuffer,
            Self::TypedArray(_) => ObjectKind::TypedArray,
            Self::Proxy(_) => ObjectKind::Proxy,
        }
    }
}

/// A JavaScript object
pub struct JsObject {
    state: ObjectCell<ObjectState>,
    data: ObjectData,
}

impl fmt::Debug for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsObject")
            .field("kind", &self.kind())
            .field("shape", &self.state.borrow().shape)
            .finish_non_exhaustive()
    }
}

/// Attributes of array `length` on a fresh array
const ARRAY_LENGTH_ATTRIBUTES: PropertyAttributes = PropertyAttributes::WRITABLE;

impl JsObject {
    /// Create an object with the given payload
    pub fn with_data(prototype: Option<GcRef<JsObject>>, data: ObjectData) -> GcRef<Self> {
        let mut shape = Shape::root(data.kind());
        if let ObjectData::Array(elements) = &data {
            let mut attributes = ARRAY_LENGTH_ATTRIBUTES;
            if !elements.borrow().is_length_writable() {
                attributes.remove(PropertyAttributes::WRITABLE);
            }
            shape = shape.add_property(PropertyKey::string("length"), attributes, SlotKind::ArrayLength);
        }
        GcRef::new(Self {
            state: ObjectCell::new(ObjectState {
                shape,
                slots: SlotStorage::default(),
                dictionary: None,
                prototype,
            }),
            data,
        })
    }

    /// Create an ordinary object
    pub fn ordinary(prototype: Option<GcRef<JsObject>>) -> GcRef<Self> {
        Self::with_data(prototype, ObjectData::Ordinary)
    }

    /// Create an array object over `elements`
    pub fn array(prototype: Option<GcRef<JsObject>>, elements: ArrayElements) -> GcRef<Self> {
        Self::with_data(prototype, ObjectData::Array(ObjectCell::new(elements)))
    }

    /// Create an array from a literal's values
    pub fn array_from_values(prototype: Option<GcRef<JsObject>>, values: Vec<Value>) -> GcRef<Self> {
        Self::array(prototype, ArrayElements::from_values(values))
    }

    /// Create an arguments object
    pub fn arguments(prototype: Option<GcRef<JsObject>>, args: &[Value]) -> GcRef<Self> {
        let obj = Self::with_data(prototype, ObjectData::Arguments);
        for (i, arg) in args.iter().enumerate() {
            obj.define_builtin(PropertyKey::from_u64(i as u64), arg.clone(), PropertyAttributes::data());
        }
        obj.define_builtin(
            PropertyKey::string("length"),
            Value::number(args.len() as f64),
            PropertyAttributes::builtin_method(),
        );
        obj
    }

    /// Create a function object whose body runs on the script host
    pub fn script_function(id: u64, constructor: bool) -> GcRef<Self> {
        Self::with_data(None, ObjectData::Function(FunctionData::Script { id, constructor }))
    }

    /// Kind-specific payload
    #[inline]
    pub fn data(&self) -> &ObjectData {
        &self.data
    }

    /// Kind tag
    #[inline]
    pub fn kind(&self) -> ObjectKind {
        self.data.kind()
    }

    /// Current shape
    pub fn shape(&self) -> Arc<Shape> {
        self.state.borrow().shape.clone()
    }

    /// Whether ordinary properties live in a dictionary map
    pub fn is_dictionary_mode(&self) -> bool {
        self.state.borrow().dictionary.is_some()
    }

    /// Raw prototype link (no proxy traps)
    pub fn prototype(&self) -> Option<GcRef<JsObject>> {
        self.state.borrow().prototype.clone()
    }

    pub(crate) fn state(&self) -> ObjectCellRef<'_, ObjectState> {
        self.state.borrow()
    }

    pub(crate) fn state_mut(&self) -> ObjectCellRefMut<'_, ObjectState> {
        self.state.borrow_mut()
    }

    /// Has `[[Call]]`
    pub fn is_callable(&self) -> bool {
        match &self.data {
            ObjectData::Function(_) => true,
            ObjectData::Proxy(proxy) => proxy.is_callable(),
            _ => false,
        }
    }

    /// Has `[[Construct]]`
    pub fn is_constructor(&self) -> bool {
        match &self.data {
            ObjectData::Function(func) => func.is_constructor(),
            ObjectData::Proxy(proxy) => proxy.is_constructor(),
            _ => false,
        }
    }

    /// Is an Array exotic object (does not look through proxies)
    pub fn is_array(&self) -> bool {
        matches!(self.data, ObjectData::Array(_))
    }

    /// Is a proxy
    pub fn is_proxy(&self) -> bool {
        matches!(self.data, ObjectData::Proxy(_))
    }

    /// Array element storage
    pub fn as_array(&self) -> Option<&ObjectCell<ArrayElements>> {
        match &self.data {
            ObjectData::Array(elements) => Some(elements),
            _ => None,
        }
    }

    /// Typed array view
    pub fn as_typed_array(&self) -> Option<&JsTypedArray> {
        match &self.data {
            ObjectData::TypedArray(ta) => Some(ta),
            _ => None,
        }
    }

    /// ArrayBuffer contents
    pub fn as_array_buffer(&self) -> Option<&JsArrayBuffer> {
        match &self.data {
            ObjectData::ArrayBuffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    /// Proxy record
    pub fn as_proxy(&self) -> Option<&JsProxy> {
        match &self.data {
            ObjectData::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    /// Array length, `None` for non-arrays
    pub fn array_length(&self) -> Option<u64> {
        self.as_array().map(|elements| elements.borrow().length())
    }

    /// Array storage strategy, `None` for non-arrays
    pub fn array_store_kind(&self) -> Option<ArrayStoreKind> {
        self.as_array().map(|elements| elements.borrow().store_kind())
    }

    /// Define a property during object setup, bypassing extensibility checks.
    ///
    /// Used for builtin properties (`name`, `length`, arguments entries)
    /// on objects no script has seen yet.
    pub fn define_builtin(&self, key: PropertyKey, value: Value, attributes: PropertyAttributes) {
        ordinary::write_property(
            self,
            &key,
            &PropertyDescriptor::data_with_attrs(value, attributes),
        );
    }

    // ------------------------------------------------------------------
    // Essential internal methods
    // ------------------------------------------------------------------

    /// `[[GetOwnProperty]]`
    pub fn get_own_property(
        self: &GcRef<Self>,
        ncx: &mut NativeContext,
        key: &PropertyKey,
    ) -> VmResult<Option<PropertyDescriptor>> {
        match &self.data {
            ObjectData::Proxy(_) => proxy_operations::proxy_get_own_property(ncx, self, key),
            ObjectData::TypedArray(ta) => Ok(typed_array::get_own_property(self, ta, key)),
            ObjectData::Array(elements) => Ok(array_operations::get_own_property(self, elements, key)),
            _ => Ok(ordinary::get_own_property(self, key)),
        }
    }

    /// `[[DefineOwnProperty]]`; failure throws a `TypeError` when `do_throw`
    pub fn define_own_property(
        self: &GcRef<Self>,
        ncx: &mut NativeContext,
        key: &PropertyKey,
        desc: &DefineDescriptor,
        do_throw: bool,
    ) -> VmResult<bool> {
        match &self.data {
            ObjectData::Proxy(_) => {
                let ok = proxy_operations::proxy_define_own_property(ncx, self, key, desc)?;
                if ok {
                    return Ok(true);
                }
                reject(do_throw, || format!("'defineProperty' on proxy: trap returned falsish for property '{key}'"))
            }
            ObjectData::TypedArray(ta) => typed_array::define_own_property(ncx, self, ta, key, desc, do_throw),
            ObjectData::Array(elements) => {
                array_operations::define_own_property(ncx, self, elements, key, desc, do_throw)
            }
            _ => ordinary::define_own_property(self, key, desc, do_throw),
        }
    }

    /// DefinePropertyOrThrow
    pub fn define_property_or_throw(
        self: &GcRef<Self>,
        ncx: &mut NativeContext,
        key: &PropertyKey,
        desc: &DefineDescriptor,
    ) -> VmResult<()> {
        self.define_own_property(ncx, key, desc, true).map(|_| ())
    }

    /// CreateDataProperty
    pub fn create_data_property(
        self: &GcRef<Self>,
        ncx: &mut NativeContext,
        key: &PropertyKey,
        value: Value,
    ) -> VmResult<bool> {
        self.define_own_property(ncx, key, &DefineDescriptor::data(value, PropertyAttributes::data()), false)
    }

    /// `[[HasProperty]]`
    pub fn has_property(self: &GcRef<Self>, ncx: &mut NativeContext, key: &PropertyKey) -> VmResult<bool> {
        match &self.data {
            ObjectData::Proxy(_) => proxy_operations::proxy_has(ncx, self, key),
            ObjectData::TypedArray(ta) => typed_array::has_property(ncx, self, ta, key),
            _ => ordinary::has_property(ncx, self, key),
        }
    }

    /// HasOwnProperty
    pub fn has_own_property(self: &GcRef<Self>, ncx: &mut NativeContext, key: &PropertyKey) -> VmResult<bool> {
        Ok(self.get_own_property(ncx, key)?.is_some())
    }

    /// `[[Get]]`
    pub fn get(self: &GcRef<Self>, ncx: &mut NativeContext, key: &PropertyKey, receiver: &Value) -> VmResult<Value> {
        match &self.data {
            ObjectData::Proxy(_) => proxy_operations::proxy_get(ncx, self, key, receiver.clone()),
            ObjectData::TypedArray(ta) => typed_array::get(ncx, self, ta, key, receiver),
            _ => ordinary::get(ncx, self, key, receiver),
        }
    }

    /// `[[Get]]` with this object as receiver
    pub fn get_value(self: &GcRef<Self>, ncx: &mut NativeContext, key: &PropertyKey) -> VmResult<Value> {
        self.get(ncx, key, &Value::object(self.clone()))
    }

    /// `[[Set]]`
    pub fn set(
        self: &GcRef<Self>,
        ncx: &mut NativeContext,
        key: &PropertyKey,
        value: Value,
        receiver: &Value,
    ) -> VmResult<bool> {
        match &self.data {
            ObjectData::Proxy(_) => proxy_operations::proxy_set(ncx, self, key, value, receiver.clone()),
            ObjectData::TypedArray(ta) => typed_array::set(ncx, self, ta, key, value, receiver),
            ObjectData::Array(elements) => {
                if array_operations::try_fast_set(self, elements, key, &value, receiver, ncx.config()) {
                    return Ok(true);
                }
                ordinary::set(ncx, self, key, value, receiver)
            }
            _ => ordinary::set(ncx, self, key, value, receiver),
        }
    }

    /// `obj[key] = value` with this object as receiver; a failed assignment
    /// throws in strict mode
    pub fn put(self: &GcRef<Self>, ncx: &mut NativeContext, key: &PropertyKey, value: Value, strict: bool) -> VmResult<bool> {
        let ok = self.set(ncx, key, value, &Value::object(self.clone()))?;
        if ok {
            return Ok(true);
        }
        reject(strict, || format!("Cannot assign to read only property '{key}' of object"))
    }

    /// `[[Delete]]`
    pub fn delete(self: &GcRef<Self>, ncx: &mut NativeContext, key: &PropertyKey) -> VmResult<bool> {
        match &self.data {
            ObjectData::Proxy(_) => proxy_operations::proxy_delete(ncx, self, key),
            ObjectData::TypedArray(ta) => Ok(typed_array::delete(self, ta, key)),
            ObjectData::Array(elements) => Ok(array_operations::delete(self, elements, key)),
            _ => Ok(ordinary::delete(self, key)),
        }
    }

    /// `delete obj[key]`; failure throws in strict mode
    pub fn delete_property(self: &GcRef<Self>, ncx: &mut NativeContext, key: &PropertyKey, strict: bool) -> VmResult<bool> {
        if self.delete(ncx, key)? {
            return Ok(true);
        }
        reject(strict, || format!("Cannot delete property '{key}' of object"))
    }

    /// `[[OwnPropertyKeys]]`
    pub fn own_property_keys(self: &GcRef<Self>, ncx: &mut NativeContext) -> VmResult<Vec<PropertyKey>> {
        match &self.data {
            ObjectData::Proxy(_) => proxy_operations::proxy_own_keys(ncx, self),
            ObjectData::TypedArray(ta) => Ok(typed_array::own_property_keys(self, ta)),
            ObjectData::Array(elements) => Ok(array_operations::own_property_keys(self, elements)),
            _ => Ok(ordinary::own_property_keys(self)),
        }
    }

    /// `[[PreventExtensions]]`
    pub fn prevent_extensions(self: &GcRef<Self>, ncx: &mut NativeContext) -> VmResult<bool> {
        match &self.data {
            ObjectData::Proxy(_) => proxy_operations::proxy_prevent_extensions(ncx, self),
            ObjectData::Array(elements) => {
                elements.borrow_mut().prevent_extensions();
                ordinary::prevent_extensions(self);
                Ok(true)
            }
            _ => {
                ordinary::prevent_extensions(self);
                Ok(true)
            }
        }
    }

    /// `[[IsExtensible]]`
    pub fn is_extensible(self: &GcRef<Self>, ncx: &mut NativeContext) -> VmResult<bool> {
        match &self.data {
            ObjectData::Proxy(_) => proxy_operations::proxy_is_extensible(ncx, self),
            _ => Ok(self.state.borrow().shape.is_extensible()),
        }
    }

    /// `[[GetPrototypeOf]]`
    pub fn get_prototype_of(self: &GcRef<Self>, ncx: &mut NativeContext) -> VmResult<Option<GcRef<JsObject>>> {
        match &self.data {
            ObjectData::Proxy(_) => proxy_operations::proxy_get_prototype_of(ncx, self),
            _ => Ok(self.prototype()),
        }
    }

    /// `[[SetPrototypeOf]]`
    pub fn set_prototype_of(
        self: &GcRef<Self>,
        ncx: &mut NativeContext,
        prototype: Option<GcRef<JsObject>>,
    ) -> VmResult<bool> {
        match &self.data {
            ObjectData::Proxy(_) => proxy_operations::proxy_set_prototype_of(ncx, self, prototype),
            _ => ordinary::set_prototype_of(ncx, self, prototype),
        }
    }

    /// SetIntegrityLevel (`Object.seal` / `Object.freeze`)
    pub fn set_integrity_level(self: &GcRef<Self>, ncx: &mut NativeContext, frozen: bool, do_throw: bool) -> VmResult<bool> {
        let done = match &self.data {
            ObjectData::Proxy(_) => ordinary::set_integrity_level_generic(ncx, self, frozen)?,
            ObjectData::TypedArray(ta) => typed_array::set_integrity_level(ncx, self, ta, frozen)?,
            ObjectData::Array(elements) => {
                array_operations::set_integrity_level(self, elements, frozen);
                true
            }
            _ => {
                if self.is_dictionary_mode() {
                    ordinary::set_integrity_level_generic(ncx, self, frozen)?
                } else {
                    ordinary::set_integrity_level_fast(self, frozen);
                    true
                }
            }
        };
        if done {
            return Ok(true);
        }
        reject(do_throw, || "Cannot prevent extensions".to_string())
    }

    /// TestIntegrityLevel (`Object.isSealed` / `Object.isFrozen`)
    pub fn test_integrity_level(self: &GcRef<Self>, ncx: &mut NativeContext, frozen: bool) -> VmResult<bool> {
        if self.is_extensible(ncx)? {
            return Ok(false);
        }
        for key in self.own_property_keys(ncx)? {
            if let Some(desc) = self.get_own_property(ncx, &key)? {
                if desc.is_configurable() {
                    return Ok(false);
                }
                if frozen && desc.is_writable() {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// `[[Call]]`
    pub fn call(self: &GcRef<Self>, ncx: &mut NativeContext, this: Value, args: &[Value]) -> VmResult<Value> {
        ncx.call_function(&Value::object(self.clone()), this, args)
    }

    /// `[[Construct]]` with this object as `new.target`
    pub fn construct(self: &GcRef<Self>, ncx: &mut NativeContext, args: &[Value]) -> VmResult<Value> {
        let callee = Value::object(self.clone());
        ncx.construct(&callee, args, &callee)
    }

    /// Whether `other` is this object
    pub fn is(self: &GcRef<Self>, other: &GcRef<JsObject>) -> bool {
        same_ref(self, other)
    }
}

/// Receiver check shared by the fast paths: `receiver` is `obj` itself
pub(crate) fn receiver_is(obj: &GcRef<JsObject>, receiver: &Value) -> bool {
    matches!(receiver, Value::Object(r) if same_ref(r, obj))
}

/// Require an object argument
pub(crate) fn require_object<'a>(value: &'a Value, what: &str) -> VmResult<&'a GcRef<JsObject>> {
    value
        .as_object()
        .ok_or_else(|| VmError::type_error(format!("{what} must be an object")))
}
