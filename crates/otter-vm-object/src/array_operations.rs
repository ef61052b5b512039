//! Array exotic object internal methods.
//!
//! Index keys go to the element store, `length` goes through ArraySetLength,
//! everything else is ordinary. `length` also has a shape slot
//! (`SlotKind::ArrayLength`) whose attributes mirror the store's
//! `LENGTH_NOT_WRITABLE` flag.

use crate::array::ArrayElements;
use crate::config::ObjectModelConfig;
use crate::context::NativeContext;
use crate::convert::to_uint32;
use crate::error::{VmError, VmResult, reject};
use crate::gc::GcRef;
use crate::object::{JsObject, ObjectData, SlotValue, receiver_is};
use crate::object_cell::ObjectCell;
use crate::ordinary;
use crate::property::{
    DefineDescriptor, PropertyAttributes, PropertyDescriptor, PropertyKey, validate_and_apply,
};
use crate::value::Value;

fn length_key() -> PropertyKey {
    PropertyKey::string("length")
}

/// `[[GetOwnProperty]]`
pub(crate) fn get_own_property(
    obj: &JsObject,
    elements: &ObjectCell<ArrayElements>,
    key: &PropertyKey,
) -> Option<PropertyDescriptor> {
    match key {
        PropertyKey::Index(i) => elements.borrow().element_descriptor(u64::from(*i)),
        _ => ordinary::get_own_property(obj, key),
    }
}

/// `[[DefineOwnProperty]]`
pub(crate) fn define_own_property(
    ncx: &mut NativeContext,
    obj: &GcRef<JsObject>,
    elements: &ObjectCell<ArrayElements>,
    key: &PropertyKey,
    desc: &DefineDescriptor,
    do_throw: bool,
) -> VmResult<bool> {
    match key {
        PropertyKey::Index(i) => {
            elements.borrow_mut().configure(ncx.config());
            define_index(obj, elements, u64::from(*i), desc, do_throw)
        }
        _ if key.is_str("length") => set_length(ncx, obj, elements, desc, do_throw),
        _ => ordinary::define_own_property(obj, key, desc, do_throw),
    }
}

fn define_index(
    obj: &JsObject,
    elements: &ObjectCell<ArrayElements>,
    index: u64,
    desc: &DefineDescriptor,
    do_throw: bool,
) -> VmResult<bool> {
    let extensible = obj.shape().is_extensible();
    let mut elements = elements.borrow_mut();
    if index >= elements.length() && !elements.is_length_writable() {
        return reject(do_throw, || {
            format!("Cannot define property {index}, array length is read-only")
        });
    }
    let current = elements.element_descriptor(index);
    let Some(applied) = validate_and_apply(extensible, desc, current.as_ref()) else {
        return reject(do_throw, || match current {
            None => format!("Cannot define property {index}, object is not extensible"),
            Some(_) => format!("Cannot redefine property: {index}"),
        });
    };
    elements.define_element(index, SlotValue::from_descriptor(&applied), applied.attributes());
    Ok(true)
}

/// Apply the attribute part of a `length` definition and keep the element
/// store's flag in sync
fn write_length_attributes(obj: &JsObject, elements: &ObjectCell<ArrayElements>, applied: &PropertyDescriptor) {
    ordinary::write_property(obj, &length_key(), applied);
    if !applied.is_writable() {
        elements.borrow_mut().set_length_not_writable();
    }
}

/// ArraySetLength
fn set_length(
    ncx: &mut NativeContext,
    obj: &GcRef<JsObject>,
    elements: &ObjectCell<ArrayElements>,
    desc: &DefineDescriptor,
    do_throw: bool,
) -> VmResult<bool> {
    let key = length_key();
    let Some(current) = ordinary::get_own_property(obj, &key) else {
        return Err(VmError::internal("array without a length slot"));
    };

    let Some(value) = &desc.value else {
        let Some(applied) = validate_and_apply(true, desc, Some(&current)) else {
            return reject(do_throw, || "Cannot redefine property: length".to_string());
        };
        write_length_attributes(obj, elements, &applied);
        return Ok(true);
    };

    // Two separate conversions; a `valueOf` runs twice.
    let new_len = to_uint32(ncx.to_number(value)?);
    let number_len = ncx.to_number(value)?;
    if f64::from(new_len) != number_len {
        return Err(VmError::range_error("Invalid array length"));
    }
    let new_len = u64::from(new_len);

    // Deletion happens while `length` is still writable; a requested
    // `writable: false` is applied afterwards.
    let mut with_value = desc.clone();
    with_value.value = Some(Value::number(new_len as f64));
    let defer_read_only = with_value.writable == Some(false);
    if defer_read_only {
        with_value.writable = None;
    }
    let Some(mut applied) = validate_and_apply(true, &with_value, Some(&current)) else {
        return reject(do_throw, || "Cannot redefine property: length".to_string());
    };

    let shrunk = elements.borrow_mut().set_length(new_len, false)?;
    if defer_read_only {
        let mut attributes = applied.attributes();
        attributes.remove(PropertyAttributes::WRITABLE);
        applied = applied.with_attributes(attributes);
    }
    write_length_attributes(obj, elements, &applied);
    if shrunk {
        return Ok(true);
    }
    let pinned = elements.borrow().length().saturating_sub(1);
    reject(do_throw, || format!("Cannot delete property '{pinned}' of [object Array]"))
}

/// Whether some object on `obj`'s prototype chain could answer `key` for
/// an index, which rules out the element fast paths
fn prototype_chain_has_index(obj: &JsObject, key: &PropertyKey) -> bool {
    let mut cursor = obj.prototype();
    while let Some(proto) = cursor {
        let found = match proto.data() {
            ObjectData::Proxy(_) | ObjectData::TypedArray(_) => true,
            ObjectData::Array(elements) => get_own_property(&proto, elements, key).is_some(),
            _ => ordinary::get_own_property(&proto, key).is_some(),
        };
        if found {
            return true;
        }
        cursor = proto.prototype();
    }
    false
}

fn prototype_chain_has_elements(obj: &JsObject) -> bool {
    let mut cursor = obj.prototype();
    while let Some(proto) = cursor {
        let found = match proto.data() {
            ObjectData::Proxy(_) | ObjectData::TypedArray(_) => true,
            ObjectData::Array(elements) => elements.borrow().first_element_index().is_some(),
            _ => ordinary::own_property_keys(&proto).first().is_some_and(PropertyKey::is_index),
        };
        if found {
            return true;
        }
        cursor = proto.prototype();
    }
    false
}

/// `obj[index] = value` straight into the element store. Returns `false`
/// when the generic `[[Set]]` is needed.
pub(crate) fn try_fast_set(
    obj: &GcRef<JsObject>,
    elements: &ObjectCell<ArrayElements>,
    key: &PropertyKey,
    value: &Value,
    receiver: &Value,
    config: &ObjectModelConfig,
) -> bool {
    let PropertyKey::Index(i) = key else {
        return false;
    };
    if !receiver_is(obj, receiver) {
        return false;
    }
    let index = u64::from(*i);
    let existing = elements.borrow().element_slot(index);
    match existing {
        Some((SlotValue::Data(_), attributes)) if attributes.writable() => {}
        Some(_) => return false,
        None => {
            if !obj.shape().is_extensible() || prototype_chain_has_index(obj, key) {
                return false;
            }
        }
    }
    let mut elements = elements.borrow_mut();
    elements.configure(config);
    matches!(elements.set_element(index, value.clone(), false), Ok(true))
}

/// `[[Delete]]`
pub(crate) fn delete(obj: &JsObject, elements: &ObjectCell<ArrayElements>, key: &PropertyKey) -> bool {
    match key {
        PropertyKey::Index(i) => matches!(
            elements.borrow_mut().delete_element(u64::from(*i), false),
            Ok(true)
        ),
        _ => ordinary::delete(obj, key),
    }
}

/// `[[OwnPropertyKeys]]`: element indices, then `length`, then the
/// ordinary keys
pub(crate) fn own_property_keys(obj: &JsObject, elements: &ObjectCell<ArrayElements>) -> Vec<PropertyKey> {
    let mut keys: Vec<PropertyKey> = elements
        .borrow()
        .element_indices()
        .into_iter()
        .map(PropertyKey::from_u64)
        .collect();
    keys.extend(ordinary::own_property_keys(obj));
    keys
}

/// Seal or freeze elements and named properties together
pub(crate) fn set_integrity_level(obj: &JsObject, elements: &ObjectCell<ArrayElements>, frozen: bool) {
    {
        let mut elements = elements.borrow_mut();
        if frozen {
            elements.freeze();
        } else {
            elements.seal();
        }
    }
    ordinary::set_integrity_level_fast(obj, frozen);
}

impl JsObject {
    fn plain_array_elements(&self) -> Option<&ObjectCell<ArrayElements>> {
        let elements = self.as_array()?;
        let usable = {
            let el = elements.borrow();
            el.is_extensible()
                && el.is_length_writable()
                && el.store_kind() != crate::array::ArrayStoreKind::Sparse
        };
        (usable && self.shape().is_extensible() && !prototype_chain_has_elements(self)).then_some(elements)
    }

    /// `Array.prototype.push` for a single value
    pub fn array_push(self: &GcRef<Self>, ncx: &mut NativeContext, value: Value) -> VmResult<u64> {
        if let Some(elements) = self.plain_array_elements() {
            let mut elements = elements.borrow_mut();
            elements.configure(ncx.config());
            return elements.push(value);
        }
        let len = self.length_of_array_like(ncx)?;
        self.put(ncx, &PropertyKey::from_u64(len), value, true)?;
        self.put(ncx, &length_key(), Value::number((len + 1) as f64), true)?;
        Ok(len + 1)
    }

    /// `Array.prototype.shift`.
    ///
    /// Plain arrays slide their storage window; anything else runs the
    /// generic get/set/delete loop.
    pub fn array_shift(self: &GcRef<Self>, ncx: &mut NativeContext) -> VmResult<Value> {
        if let Some(elements) = self.plain_array_elements() {
            return Ok(elements.borrow_mut().shift());
        }
        let len = self.length_of_array_like(ncx)?;
        if len == 0 {
            self.put(ncx, &length_key(), Value::int32(0), true)?;
            return Ok(Value::undefined());
        }
        let first = self.get_value(ncx, &PropertyKey::index(0))?;
        for k in 1..len {
            let from = PropertyKey::from_u64(k);
            let to = PropertyKey::from_u64(k - 1);
            if self.has_property(ncx, &from)? {
                let value = self.get_value(ncx, &from)?;
                self.put(ncx, &to, value, true)?;
            } else {
                self.delete_property(ncx, &to, true)?;
            }
        }
        self.delete_property(ncx, &PropertyKey::from_u64(len - 1), true)?;
        self.put(ncx, &length_key(), Value::number((len - 1) as f64), true)?;
        Ok(first)
    }

    /// LengthOfArrayLike
    pub fn length_of_array_like(self: &GcRef<Self>, ncx: &mut NativeContext) -> VmResult<u64> {
        let value = self.get_value(ncx, &length_key())?;
        let n = ncx.to_number(&value)?;
        Ok(crate::convert::to_length(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArrayStoreKind;
    use crate::function::native_function;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn array(values: &[i32]) -> GcRef<JsObject> {
        JsObject::array_from_values(None, values.iter().map(|n| Value::int32(*n)).collect())
    }

    fn length(ncx: &mut NativeContext, obj: &GcRef<JsObject>) -> Value {
        obj.get_value(ncx, &length_key()).unwrap()
    }

    #[test]
    fn test_index_set_updates_length() {
        let mut ncx = NativeContext::new();
        let arr = array(&[1, 2, 3]);
        arr.put(&mut ncx, &PropertyKey::index(5), Value::int32(6), true).unwrap();
        assert_eq!(length(&mut ncx, &arr), Value::int32(6));
        assert_eq!(arr.array_store_kind(), Some(ArrayStoreKind::Holes));
        assert!(!arr.has_own_property(&mut ncx, &PropertyKey::index(4)).unwrap());
    }

    #[test]
    fn test_length_shrink_deletes() {
        let mut ncx = NativeContext::new();
        let arr = array(&[1, 2, 3, 4]);
        arr.put(&mut ncx, &length_key(), Value::int32(1), true).unwrap();
        assert_eq!(arr.array_length(), Some(1));
        assert_eq!(arr.get_value(&mut ncx, &PropertyKey::index(1)).unwrap(), Value::undefined());
    }

    #[test]
    fn test_invalid_length_is_range_error() {
        let mut ncx = NativeContext::new();
        let arr = array(&[1]);
        let err = arr
            .put(&mut ncx, &length_key(), Value::number(1.5), true)
            .unwrap_err();
        assert!(err.is_range_error());
        let err = arr
            .put(&mut ncx, &length_key(), Value::number(-1.0), true)
            .unwrap_err();
        assert!(err.is_range_error());
        assert_eq!(arr.array_length(), Some(1));
    }

    #[test]
    fn test_length_value_converted_through_value_of() {
        let mut ncx = NativeContext::new();
        let arr = array(&[1, 2, 3]);
        let holder = JsObject::ordinary(None);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let value_of = native_function("valueOf", 0, move |_, _, _| {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(Value::int32(2))
        });
        holder.define_builtin(PropertyKey::string("valueOf"), Value::object(value_of), PropertyAttributes::data());
        arr.put(&mut ncx, &length_key(), Value::object(holder), true).unwrap();
        assert_eq!(arr.array_length(), Some(2));
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_non_writable_length() {
        let mut ncx = NativeContext::new();
        let arr = array(&[1, 2, 3]);
        let desc = DefineDescriptor::value(Value::int32(2)).with_writable(false);
        assert!(arr.define_own_property(&mut ncx, &length_key(), &desc, true).unwrap());
        assert_eq!(arr.array_length(), Some(2));

        let length_desc = arr.get_own_property(&mut ncx, &length_key()).unwrap().unwrap();
        assert!(!length_desc.is_writable());

        assert!(!arr.put(&mut ncx, &PropertyKey::index(5), Value::int32(1), false).unwrap());
        assert!(arr.put(&mut ncx, &PropertyKey::index(0), Value::int32(9), true).unwrap());
        assert!(arr.put(&mut ncx, &length_key(), Value::int32(0), true).is_err());
    }

    #[test]
    fn test_length_shrink_blocked_by_non_configurable_element() {
        let mut ncx = NativeContext::new();
        let arr = array(&[1, 2, 3, 4]);
        let pinned = DefineDescriptor::default().with_configurable(false);
        arr.define_own_property(&mut ncx, &PropertyKey::index(1), &pinned, true).unwrap();
        assert_eq!(arr.array_store_kind(), Some(ArrayStoreKind::Sparse));

        let desc = DefineDescriptor::value(Value::int32(0)).with_writable(false);
        assert!(!arr.define_own_property(&mut ncx, &length_key(), &desc, false).unwrap());
        assert_eq!(arr.array_length(), Some(2));
        let length_desc = arr.get_own_property(&mut ncx, &length_key()).unwrap().unwrap();
        assert!(!length_desc.is_writable());
    }

    #[test]
    fn test_own_keys_order() {
        let mut ncx = NativeContext::new();
        let arr = array(&[1, 2]);
        arr.put(&mut ncx, &PropertyKey::string("foo"), Value::int32(0), true).unwrap();
        let keys = arr.own_property_keys(&mut ncx).unwrap();
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["0", "1", "length", "foo"]);
    }

    #[test]
    fn test_freeze_array() {
        let mut ncx = NativeContext::new();
        let arr = array(&[1, 2]);
        arr.set_integrity_level(&mut ncx, true, true).unwrap();
        assert!(arr.test_integrity_level(&mut ncx, true).unwrap());
        assert!(!arr.put(&mut ncx, &PropertyKey::index(0), Value::int32(5), false).unwrap());
        assert!(!arr.put(&mut ncx, &PropertyKey::index(2), Value::int32(5), false).unwrap());
        assert!(!arr.delete(&mut ncx, &PropertyKey::index(1)).unwrap());
        assert_eq!(arr.get_value(&mut ncx, &PropertyKey::index(0)).unwrap(), Value::int32(1));
    }

    #[test]
    fn test_seal_array_keeps_values_writable() {
        let mut ncx = NativeContext::new();
        let arr = array(&[1, 2]);
        arr.set_integrity_level(&mut ncx, false, true).unwrap();
        assert!(arr.test_integrity_level(&mut ncx, false).unwrap());
        assert!(!arr.test_integrity_level(&mut ncx, true).unwrap());
        assert!(arr.put(&mut ncx, &PropertyKey::index(0), Value::int32(5), true).unwrap());
        assert!(!arr.put(&mut ncx, &length_key(), Value::int32(0), false).unwrap());
        assert_eq!(arr.array_length(), Some(2));
    }

    #[test]
    fn test_shift_fast_path() {
        let mut ncx = NativeContext::new();
        let arr = array(&[1, 2, 3]);
        assert_eq!(arr.array_shift(&mut ncx).unwrap(), Value::int32(1));
        assert_eq!(arr.array_length(), Some(2));
        assert_eq!(arr.as_array().unwrap().borrow().array_offset(), 1);
        assert_eq!(arr.get_value(&mut ncx, &PropertyKey::index(0)).unwrap(), Value::int32(2));
    }

    #[test]
    fn test_shift_generic_on_sealed() {
        let mut ncx = NativeContext::new();
        let arr = array(&[1, 2, 3]);
        arr.set_integrity_level(&mut ncx, false, true).unwrap();
        // The final delete hits a non-configurable element.
        let err = arr.array_shift(&mut ncx).unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_hole_reads_through_prototype() {
        let mut ncx = NativeContext::new();
        let proto = JsObject::ordinary(None);
        proto.define_builtin(PropertyKey::index(1), Value::string("inherited"), PropertyAttributes::data());
        let arr = JsObject::array(Some(proto), ArrayElements::from_holes(vec![Some(Value::int32(0)), None, Some(Value::int32(2))]));
        assert_eq!(
            arr.get_value(&mut ncx, &PropertyKey::index(1)).unwrap(),
            Value::string("inherited")
        );
        assert_eq!(arr.array_shift(&mut ncx).unwrap(), Value::int32(0));
        assert_eq!(
            arr.get_value(&mut ncx, &PropertyKey::index(0)).unwrap(),
            Value::string("inherited")
        );
        assert!(arr.has_own_property(&mut ncx, &PropertyKey::index(0)).unwrap());
    }

    #[test]
    fn test_push() {
        let mut ncx = NativeContext::new();
        let arr = array(&[]);
        assert_eq!(arr.array_push(&mut ncx, Value::int32(1)).unwrap(), 1);
        assert_eq!(arr.array_push(&mut ncx, Value::number(0.5)).unwrap(), 2);
        assert_eq!(arr.array_store_kind(), Some(ArrayStoreKind::PackedDouble));
    }

    #[test]
    fn test_accessor_element_called_with_receiver() {
        let mut ncx = NativeContext::new();
        let arr = array(&[1, 2]);
        let getter = native_function("get", 0, |_, this, _| Ok(this.clone()));
        let desc = DefineDescriptor::accessor(Value::object(getter), Value::undefined(), PropertyAttributes::data());
        arr.define_own_property(&mut ncx, &PropertyKey::index(0), &desc, true).unwrap();
        let got = arr.get_value(&mut ncx, &PropertyKey::index(0)).unwrap();
        assert!(matches!(got, Value::Object(o) if o.is(&arr)));
        assert_eq!(arr.get_value(&mut ncx, &PropertyKey::index(1)).unwrap(), Value::int32(2));
    }
}
