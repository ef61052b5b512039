//! Ordinary object internal methods.
//!
//! Properties live either in shape-described slots or, for dictionary-mode
//! objects, in the dictionary map (hidden keys stay in the shape either
//! way). Exotic objects reuse these for their non-exotic keys.

use crate::context::NativeContext;
use crate::dictionary;
use crate::error::{VmError, VmResult, reject};
use crate::gc::{GcRef, same_ref};
use crate::object::{JsObject, ObjectData, ObjectState, SlotValue};
use crate::property::{
    DefineDescriptor, PropertyAttributes, PropertyDescriptor, PropertyKey, validate_and_apply,
};
use crate::shape::{PropertySlot, SlotKind};
use crate::value::Value;

fn slot_descriptor(obj: &JsObject, state: &ObjectState, slot: PropertySlot) -> PropertyDescriptor {
    match slot.kind {
        SlotKind::ArrayLength => {
            let length = obj.array_length().unwrap_or(0);
            PropertyDescriptor::data_with_attrs(Value::number(length as f64), slot.attributes)
        }
        _ => state
            .slots
            .get(slot.location)
            .cloned()
            .unwrap_or_default()
            .to_descriptor(slot.attributes),
    }
}

/// OrdinaryGetOwnProperty
pub(crate) fn get_own_property(obj: &JsObject, key: &PropertyKey) -> Option<PropertyDescriptor> {
    let state = obj.state();
    if let Some(map) = &state.dictionary
        && !key.is_hidden()
    {
        return map.get(key).cloned();
    }
    let slot = state.shape.lookup(key)?;
    Some(slot_descriptor(obj, &state, slot))
}

/// Store `desc` under `key`, adding or updating the shape as needed.
/// Validation has already happened.
pub(crate) fn write_property(obj: &JsObject, key: &PropertyKey, desc: &PropertyDescriptor) {
    let mut state = obj.state_mut();
    if !key.is_hidden()
        && let Some(map) = state.dictionary.as_mut()
    {
        map.insert(key.clone(), desc.clone());
        return;
    }

    let attributes = desc.attributes();
    let kind = if desc.is_accessor() {
        SlotKind::Accessor
    } else {
        SlotKind::Data
    };
    match state.shape.lookup(key) {
        Some(slot) if slot.kind == SlotKind::ArrayLength => {
            state.shape = state
                .shape
                .change_attributes(key.clone(), attributes, SlotKind::ArrayLength);
        }
        Some(slot) => {
            if slot.attributes != attributes || slot.kind != kind {
                state.shape = state.shape.change_attributes(key.clone(), attributes, kind);
            }
            state.slots.set(slot.location, SlotValue::from_descriptor(desc));
        }
        None => {
            let shape = state.shape.add_property(key.clone(), attributes, kind);
            if let Some(slot) = shape.lookup(key) {
                state.slots.set(slot.location, SlotValue::from_descriptor(desc));
            }
            state.shape = shape;
        }
    }
}

/// OrdinaryDefineOwnProperty
pub(crate) fn define_own_property(
    obj: &JsObject,
    key: &PropertyKey,
    desc: &DefineDescriptor,
    do_throw: bool,
) -> VmResult<bool> {
    let current = get_own_property(obj, key);
    let (extensible, in_dictionary) = {
        let state = obj.state();
        (
            state.shape.is_extensible(),
            state.dictionary.is_some() && !key.is_hidden(),
        )
    };

    if in_dictionary {
        if current.is_none() && extensible {
            if let Some(map) = obj.state_mut().dictionary.as_mut() {
                map.insert(key.clone(), desc.to_complete());
            }
            return Ok(true);
        }
        dictionary::make_ordinary(obj, "redefine or non-extensible define");
    }

    let Some(applied) = validate_and_apply(extensible, desc, current.as_ref()) else {
        return reject(do_throw, || match current {
            None => format!("Cannot define property {key}, object is not extensible"),
            Some(_) => format!("Cannot redefine property: {key}"),
        });
    };
    write_property(obj, key, &applied);
    Ok(true)
}

/// Whether `[[Get]]`/`[[Has]]`/`[[Set]]` must hand over to `obj`'s own
/// internal method instead of walking it as an ordinary object
fn has_exotic_lookup(obj: &JsObject) -> bool {
    matches!(obj.data(), ObjectData::Proxy(_) | ObjectData::TypedArray(_))
}

/// OrdinaryHasProperty
pub(crate) fn has_property(ncx: &mut NativeContext, obj: &GcRef<JsObject>, key: &PropertyKey) -> VmResult<bool> {
    let mut current = obj.clone();
    loop {
        if current.get_own_property(ncx, key)?.is_some() {
            return Ok(true);
        }
        let Some(parent) = current.get_prototype_of(ncx)? else {
            return Ok(false);
        };
        if has_exotic_lookup(&parent) {
            return parent.has_property(ncx, key);
        }
        current = parent;
    }
}

/// OrdinaryGet
pub(crate) fn get(
    ncx: &mut NativeContext,
    obj: &GcRef<JsObject>,
    key: &PropertyKey,
    receiver: &Value,
) -> VmResult<Value> {
    let mut current = obj.clone();
    loop {
        match current.get_own_property(ncx, key)? {
            Some(PropertyDescriptor::Data { value, .. }) => return Ok(value),
            Some(PropertyDescriptor::Accessor { get, .. }) => {
                return match get {
                    Some(getter) => ncx.call_function(&getter, receiver.clone(), &[]),
                    None => Ok(Value::undefined()),
                };
            }
            None => {}
        }
        let Some(parent) = current.get_prototype_of(ncx)? else {
            return Ok(Value::undefined());
        };
        if has_exotic_lookup(&parent) {
            return parent.get(ncx, key, receiver);
        }
        current = parent;
    }
}

/// Write straight into an own writable data slot when the receiver is the
/// object itself. Returns `false` when the slow path is needed.
fn try_fast_set(obj: &JsObject, key: &PropertyKey, value: &Value) -> bool {
    let mut state = obj.state_mut();
    if !key.is_hidden()
        && let Some(map) = state.dictionary.as_mut()
    {
        return match map.get_mut(key) {
            Some(PropertyDescriptor::Data {
                value: slot,
                attributes,
            }) if attributes.writable() => {
                *slot = value.clone();
                true
            }
            _ => false,
        };
    }
    match state.shape.lookup(key) {
        Some(slot) if slot.kind == SlotKind::Data && slot.attributes.writable() => {
            if let Some(SlotValue::Data(stored)) = state.slots.get_mut(slot.location) {
                *stored = value.clone();
                return true;
            }
            false
        }
        _ => false,
    }
}

/// OrdinarySet
pub(crate) fn set(
    ncx: &mut NativeContext,
    obj: &GcRef<JsObject>,
    key: &PropertyKey,
    value: Value,
    receiver: &Value,
) -> VmResult<bool> {
    let is_self = crate::object::receiver_is(obj, receiver);
    if is_self && try_fast_set(obj, key, &value) {
        return Ok(true);
    }

    let mut current = obj.clone();
    let own_desc = loop {
        if let Some(desc) = current.get_own_property(ncx, key)? {
            break desc;
        }
        match current.get_prototype_of(ncx)? {
            Some(parent) if has_exotic_lookup(&parent) => {
                return parent.set(ncx, key, value, receiver);
            }
            Some(parent) => current = parent,
            None => break PropertyDescriptor::data(Value::undefined()),
        }
    };

    match own_desc {
        PropertyDescriptor::Data { attributes, .. } => {
            if !attributes.writable() {
                return Ok(false);
            }
            let receiver_obj = match receiver {
                Value::Object(r) => r,
                Value::Foreign(foreign) => return Ok(foreign.write(key, value)),
                _ => return Ok(false),
            };
            match receiver_obj.get_own_property(ncx, key)? {
                Some(existing) => {
                    if existing.is_accessor() || !existing.is_writable() {
                        return Ok(false);
                    }
                    receiver_obj.define_own_property(ncx, key, &DefineDescriptor::value(value), false)
                }
                None => {
                    if dictionary::should_enter_dictionary(receiver_obj, key, ncx.config()) {
                        dictionary::make_dictionary(receiver_obj, "property count threshold");
                    }
                    receiver_obj.create_data_property(ncx, key, value)
                }
            }
        }
        PropertyDescriptor::Accessor { set, .. } => match set {
            Some(setter) => {
                ncx.call_function(&setter, receiver.clone(), &[value])?;
                Ok(true)
            }
            None => Ok(false),
        },
    }
}

/// OrdinaryDelete
pub(crate) fn delete(obj: &JsObject, key: &PropertyKey) -> bool {
    let mut state = obj.state_mut();
    if !key.is_hidden()
        && let Some(map) = state.dictionary.as_mut()
    {
        return match map.get(key) {
            None => true,
            Some(desc) if !desc.is_configurable() => false,
            Some(_) => {
                map.remove(key);
                true
            }
        };
    }
    match state.shape.lookup(key) {
        None => true,
        Some(slot) if !slot.attributes.configurable() => false,
        Some(_) => {
            let new_shape = state.shape.remove_property(key);
            state.relayout(new_shape);
            true
        }
    }
}

/// OrdinaryOwnPropertyKeys: indices ascending, then strings, then symbols,
/// each group in creation order
pub(crate) fn own_property_keys(obj: &JsObject) -> Vec<PropertyKey> {
    let state = obj.state();
    let mut indices = Vec::new();
    let mut strings = Vec::new();
    let mut symbols = Vec::new();

    let shape_keys = state
        .shape
        .properties()
        .map(|(k, _)| k)
        .filter(|k| !k.is_hidden());
    let dictionary_keys = state.dictionary.iter().flat_map(|map| map.keys());
    for key in shape_keys.chain(dictionary_keys) {
        match key {
            PropertyKey::Index(i) => indices.push(*i),
            PropertyKey::String(_) => strings.push(key.clone()),
            PropertyKey::Symbol(_) => symbols.push(key.clone()),
        }
    }
    indices.sort_unstable();

    let mut keys: Vec<PropertyKey> = indices.into_iter().map(PropertyKey::Index).collect();
    keys.extend(strings);
    keys.extend(symbols);
    keys
}

/// OrdinaryPreventExtensions
pub(crate) fn prevent_extensions(obj: &JsObject) {
    let mut state = obj.state_mut();
    state.shape = state.shape.prevent_extensions();
}

/// OrdinarySetPrototypeOf with a bounded cycle walk
pub(crate) fn set_prototype_of(
    ncx: &mut NativeContext,
    obj: &GcRef<JsObject>,
    prototype: Option<GcRef<JsObject>>,
) -> VmResult<bool> {
    let (current, extensible) = {
        let state = obj.state();
        (state.prototype.clone(), state.shape.is_extensible())
    };
    let unchanged = match (&current, &prototype) {
        (None, None) => true,
        (Some(a), Some(b)) => same_ref(a, b),
        _ => false,
    };
    if unchanged {
        return Ok(true);
    }
    if !extensible {
        return Ok(false);
    }

    let limit = ncx.config().max_prototype_chain;
    let mut cursor = prototype.clone();
    let mut steps = 0usize;
    while let Some(p) = cursor {
        if same_ref(&p, obj) {
            return Ok(false);
        }
        if p.is_proxy() {
            break;
        }
        steps += 1;
        if steps > limit {
            return Err(VmError::internal("prototype chain too long"));
        }
        cursor = p.prototype();
    }

    obj.state_mut().prototype = prototype;
    Ok(true)
}

/// Seal or freeze a shape-backed object with a single shape transition
pub(crate) fn set_integrity_level_fast(obj: &JsObject, frozen: bool) {
    let mut state = obj.state_mut();
    state.shape = if frozen {
        state.shape.freeze()
    } else {
        state.shape.seal()
    };
}

/// SetIntegrityLevel through the object's own internal methods
pub(crate) fn set_integrity_level_generic(
    ncx: &mut NativeContext,
    obj: &GcRef<JsObject>,
    frozen: bool,
) -> VmResult<bool> {
    if !obj.prevent_extensions(ncx)? {
        return Ok(false);
    }
    let keys = obj.own_property_keys(ncx)?;
    let non_configurable = DefineDescriptor::default().with_configurable(false);
    for key in keys {
        let desc = if frozen {
            match obj.get_own_property(ncx, &key)? {
                Some(current) if !current.is_accessor() => non_configurable.clone().with_writable(false),
                Some(_) => non_configurable.clone(),
                None => continue,
            }
        } else {
            non_configurable.clone()
        };
        obj.define_property_or_throw(ncx, &key, &desc)?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Symbol;

    #[test]
    fn test_prototype_cycle_rejected() {
        let mut ncx = NativeContext::new();
        let a = JsObject::ordinary(None);
        let b = JsObject::ordinary(Some(a.clone()));
        let c = JsObject::ordinary(Some(b.clone()));
        assert!(!a.set_prototype_of(&mut ncx, Some(c.clone())).unwrap());
        assert!(!a.set_prototype_of(&mut ncx, Some(a.clone())).unwrap());
        assert!(a.prototype().is_none());
        assert!(c.set_prototype_of(&mut ncx, Some(a.clone())).unwrap());
    }

    #[test]
    fn test_set_prototype_on_non_extensible() {
        let mut ncx = NativeContext::new();
        let proto = JsObject::ordinary(None);
        let obj = JsObject::ordinary(None);
        obj.prevent_extensions(&mut ncx).unwrap();
        assert!(!obj.set_prototype_of(&mut ncx, Some(proto)).unwrap());
        // Setting the same value is always allowed.
        assert!(obj.set_prototype_of(&mut ncx, None).unwrap());
    }

    #[test]
    fn test_hidden_keys_not_enumerated() {
        let obj = JsObject::ordinary(None);
        let hidden = PropertyKey::symbol(Symbol::hidden("slot"));
        obj.define_builtin(hidden.clone(), Value::int32(1), PropertyAttributes::empty());
        obj.define_builtin(PropertyKey::string("x"), Value::int32(2), PropertyAttributes::data());
        assert_eq!(own_property_keys(&obj), vec![PropertyKey::string("x")]);
        assert_eq!(get_own_property(&obj, &hidden).unwrap().value(), Some(&Value::int32(1)));
    }

    #[test]
    fn test_delete_relayouts_slots() {
        let obj = JsObject::ordinary(None);
        for (i, name) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
            obj.define_builtin(PropertyKey::string(name), Value::int32(i as i32), PropertyAttributes::data());
        }
        assert!(delete(&obj, &PropertyKey::string("b")));
        for (i, name) in ["a", "c", "d", "e", "f"].iter().enumerate() {
            let expected = if i == 0 { 0 } else { i as i32 + 1 };
            assert_eq!(
                get_own_property(&obj, &PropertyKey::string(name)).unwrap().value(),
                Some(&Value::int32(expected))
            );
        }
    }
}
