//! Proxy trap operations implementing ES2026 §10.5
//!
//! This module implements all 13 proxy handler traps with invariant
//! validation against the target's actual state. A missing trap forwards to
//! the target. Foreign targets forward through [`ForeignObject`] and skip the
//! invariant checks, which only make sense for native objects.

use crate::context::NativeContext;
use crate::error::{VmError, VmResult};
use crate::gc::{GcRef, same_ref};
use crate::object::JsObject;
use crate::property::{DefineDescriptor, PropertyDescriptor, PropertyKey, is_compatible_descriptor};
use crate::value::{ForeignObject, Value, same_value};
use rustc_hash::FxHashSet;
use smallvec::{SmallVec, smallvec};
use std::sync::Arc;

type TrapArgs = SmallVec<[Value; 4]>;

/// Target and handler of a live proxy
fn proxy_parts(proxy: &GcRef<JsObject>, operation: &str) -> VmResult<(Value, GcRef<JsObject>)> {
    let record = proxy
        .as_proxy()
        .ok_or_else(|| VmError::internal("proxy operation on a non-proxy object"))?;
    match (record.target(), record.handler().and_then(Value::as_object)) {
        (Some(target), Some(handler)) => Ok((target.clone(), handler.clone())),
        _ => Err(VmError::type_error(format!(
            "Cannot perform '{}' on a revoked proxy",
            operation
        ))),
    }
}

/// GetMethod(handler, name): `None` when the trap is undefined or null
fn get_trap(ncx: &mut NativeContext, handler: &GcRef<JsObject>, name: &str) -> VmResult<Option<Value>> {
    let trap = handler.get_value(ncx, &PropertyKey::string(name))?;
    if trap.is_nullish() {
        return Ok(None);
    }
    if !trap.is_callable() {
        return Err(VmError::type_error(format!(
            "Proxy handler's '{}' trap must be a function",
            name
        )));
    }
    Ok(Some(trap))
}

fn invoke_trap(
    ncx: &mut NativeContext,
    trap: &Value,
    handler: &GcRef<JsObject>,
    args: TrapArgs,
) -> VmResult<Value> {
    ncx.call_function(trap, Value::object(handler.clone()), &args)
}

fn trap_error(trap: &str, message: impl std::fmt::Display) -> VmError {
    VmError::type_error(format!("Proxy '{}' trap {}", trap, message))
}

// ---------------------------------------------------------------------------
// Forwarding to the target
// ---------------------------------------------------------------------------

fn foreign_target(target: &Value) -> VmResult<&Arc<dyn ForeignObject>> {
    target
        .as_foreign()
        .ok_or_else(|| VmError::type_error("Proxy target must be an object"))
}

fn target_get_own_property(
    ncx: &mut NativeContext,
    target: &Value,
    key: &PropertyKey,
) -> VmResult<Option<PropertyDescriptor>> {
    if let Some(obj) = target.as_object() {
        return obj.get_own_property(ncx, key);
    }
    Ok(foreign_target(target)?.read(key).map(PropertyDescriptor::data))
}

fn target_define_own_property(
    ncx: &mut NativeContext,
    target: &Value,
    key: &PropertyKey,
    desc: &DefineDescriptor,
) -> VmResult<bool> {
    if let Some(obj) = target.as_object() {
        return obj.define_own_property(ncx, key, desc, false);
    }
    let foreign = foreign_target(target)?;
    match &desc.value {
        Some(value) if !desc.is_accessor_descriptor() => Ok(foreign.write(key, value.clone())),
        _ => Ok(false),
    }
}

fn target_has(ncx: &mut NativeContext, target: &Value, key: &PropertyKey) -> VmResult<bool> {
    if let Some(obj) = target.as_object() {
        return obj.has_property(ncx, key);
    }
    Ok(foreign_target(target)?.contains(key))
}

fn target_get(ncx: &mut NativeContext, target: &Value, key: &PropertyKey, receiver: &Value) -> VmResult<Value> {
    if let Some(obj) = target.as_object() {
        return obj.get(ncx, key, receiver);
    }
    Ok(foreign_target(target)?.read(key).unwrap_or_default())
}

fn target_set(
    ncx: &mut NativeContext,
    target: &Value,
    key: &PropertyKey,
    value: Value,
    receiver: &Value,
) -> VmResult<bool> {
    if let Some(obj) = target.as_object() {
        return obj.set(ncx, key, value, receiver);
    }
    Ok(foreign_target(target)?.write(key, value))
}

fn target_delete(ncx: &mut NativeContext, target: &Value, key: &PropertyKey) -> VmResult<bool> {
    if let Some(obj) = target.as_object() {
        return obj.delete(ncx, key);
    }
    Ok(foreign_target(target)?.remove(key))
}

fn target_own_keys(ncx: &mut NativeContext, target: &Value) -> VmResult<Vec<PropertyKey>> {
    if let Some(obj) = target.as_object() {
        return obj.own_property_keys(ncx);
    }
    Ok(foreign_target(target)?.keys())
}

fn target_is_extensible(ncx: &mut NativeContext, target: &Value) -> VmResult<bool> {
    match target.as_object() {
        Some(obj) => obj.is_extensible(ncx),
        None => Ok(true),
    }
}

fn same_prototype(a: &Option<GcRef<JsObject>>, b: &Option<GcRef<JsObject>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => same_ref(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn prototype_value(prototype: &Option<GcRef<JsObject>>) -> Value {
    prototype.clone().map_or(Value::null(), Value::object)
}

// ---------------------------------------------------------------------------
// Descriptor conversion
// ---------------------------------------------------------------------------

fn descriptor_field(ncx: &mut NativeContext, obj: &GcRef<JsObject>, name: &str) -> VmResult<Option<Value>> {
    let key = PropertyKey::string(name);
    if !obj.has_property(ncx, &key)? {
        return Ok(None);
    }
    obj.get_value(ncx, &key).map(Some)
}

/// ToPropertyDescriptor
fn to_property_descriptor(ncx: &mut NativeContext, obj: &GcRef<JsObject>) -> VmResult<DefineDescriptor> {
    let mut desc = DefineDescriptor::default();
    if let Some(v) = descriptor_field(ncx, obj, "enumerable")? {
        desc.enumerable = Some(v.to_boolean());
    }
    if let Some(v) = descriptor_field(ncx, obj, "configurable")? {
        desc.configurable = Some(v.to_boolean());
    }
    desc.value = descriptor_field(ncx, obj, "value")?;
    if let Some(v) = descriptor_field(ncx, obj, "writable")? {
        desc.writable = Some(v.to_boolean());
    }
    for (name, slot) in [("get", &mut desc.get), ("set", &mut desc.set)] {
        if let Some(v) = descriptor_field(ncx, obj, name)? {
            if !v.is_undefined() && !v.is_callable() {
                return Err(VmError::type_error(format!(
                    "Property descriptor {}ter must be a function",
                    name
                )));
            }
            *slot = Some(v);
        }
    }
    if desc.is_accessor_descriptor() && desc.is_data_descriptor() {
        return Err(VmError::type_error(
            "Invalid property descriptor. Cannot both specify accessors and a value or writable attribute",
        ));
    }
    Ok(desc)
}

/// FromPropertyDescriptor over a partial descriptor
fn from_property_descriptor(ncx: &mut NativeContext, desc: &DefineDescriptor) -> VmResult<Value> {
    let obj = JsObject::ordinary(None);
    let fields = [
        ("value", desc.value.clone()),
        ("writable", desc.writable.map(Value::boolean)),
        ("get", desc.get.clone()),
        ("set", desc.set.clone()),
        ("enumerable", desc.enumerable.map(Value::boolean)),
        ("configurable", desc.configurable.map(Value::boolean)),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            obj.create_data_property(ncx, &PropertyKey::string(name), value)?;
        }
    }
    Ok(Value::object(obj))
}

/// CreateListFromArrayLike restricted to property keys
fn create_key_list(ncx: &mut NativeContext, list: &Value) -> VmResult<Vec<PropertyKey>> {
    let list = list
        .as_object()
        .ok_or_else(|| trap_error("ownKeys", "result must be an object"))?;
    let len = list.length_of_array_like(ncx)?;
    let mut keys = Vec::with_capacity(len.min(1024) as usize);
    let mut seen = FxHashSet::default();
    for i in 0..len {
        let entry = list.get_value(ncx, &PropertyKey::from_u64(i))?;
        if !entry.is_string() && !entry.is_symbol() {
            return Err(trap_error("ownKeys", "result contains a value that is not a string or symbol"));
        }
        let key = PropertyKey::from_value(&entry)?;
        if !seen.insert(key.clone()) {
            return Err(trap_error("ownKeys", format!("result contains duplicate entry '{}'", key)));
        }
        keys.push(key);
    }
    Ok(keys)
}

fn create_args_array(args: &[Value]) -> Value {
    Value::object(JsObject::array_from_values(None, args.to_vec()))
}

// ---------------------------------------------------------------------------
// Traps
// ---------------------------------------------------------------------------

/// `[[GetOwnProperty]]` (`getOwnPropertyDescriptor` trap)
pub fn proxy_get_own_property(
    ncx: &mut NativeContext,
    proxy: &GcRef<JsObject>,
    key: &PropertyKey,
) -> VmResult<Option<PropertyDescriptor>> {
    ncx.nested(|ncx| {
        let (target, handler) = proxy_parts(proxy, "getOwnPropertyDescriptor")?;
        let Some(trap) = get_trap(ncx, &handler, "getOwnPropertyDescriptor")? else {
            return target_get_own_property(ncx, &target, key);
        };
        let result = invoke_trap(ncx, &trap, &handler, smallvec![target.clone(), key.to_value()])?;
        let result_obj = match &result {
            Value::Undefined => None,
            Value::Object(obj) => Some(obj.clone()),
            _ => {
                return Err(trap_error(
                    "getOwnPropertyDescriptor",
                    format!("returned neither object nor undefined for property '{}'", key),
                ));
            }
        };

        let Some(target_obj) = target.as_object() else {
            return match result_obj {
                Some(obj) => Ok(Some(to_property_descriptor(ncx, &obj)?.to_complete())),
                None => Ok(None),
            };
        };

        let target_desc = target_obj.get_own_property(ncx, key)?;
        let Some(result_obj) = result_obj else {
            let Some(target_desc) = target_desc else {
                return Ok(None);
            };
            if !target_desc.is_configurable() {
                return Err(trap_error(
                    "getOwnPropertyDescriptor",
                    format!("returned undefined for property '{}' which is non-configurable in the proxy target", key),
                ));
            }
            if !target_obj.is_extensible(ncx)? {
                return Err(trap_error(
                    "getOwnPropertyDescriptor",
                    format!("returned undefined for property '{}' which exists in the non-extensible proxy target", key),
                ));
            }
            return Ok(None);
        };

        let extensible = target_obj.is_extensible(ncx)?;
        let result_desc = to_property_descriptor(ncx, &result_obj)?.to_complete();
        let as_define = DefineDescriptor::from_complete(&result_desc);
        if !is_compatible_descriptor(extensible, &as_define, target_desc.as_ref()) {
            return Err(trap_error(
                "getOwnPropertyDescriptor",
                format!("reported a descriptor for property '{}' that is incompatible with the proxy target", key),
            ));
        }
        if !result_desc.is_configurable() {
            match &target_desc {
                Some(current) if !current.is_configurable() => {
                    if !result_desc.is_accessor() && !result_desc.is_writable() && current.is_writable() {
                        return Err(trap_error(
                            "getOwnPropertyDescriptor",
                            format!("reported non-configurable and writable for property '{}' which is non-configurable, non-writable in the proxy target", key),
                        ));
                    }
                }
                _ => {
                    return Err(trap_error(
                        "getOwnPropertyDescriptor",
                        format!("reported non-configurability for property '{}' which is either non-existent or configurable in the proxy target", key),
                    ));
                }
            }
        }
        Ok(Some(result_desc))
    })
}

/// `[[DefineOwnProperty]]` (`defineProperty` trap)
pub fn proxy_define_own_property(
    ncx: &mut NativeContext,
    proxy: &GcRef<JsObject>,
    key: &PropertyKey,
    desc: &DefineDescriptor,
) -> VmResult<bool> {
    ncx.nested(|ncx| {
        let (target, handler) = proxy_parts(proxy, "defineProperty")?;
        let Some(trap) = get_trap(ncx, &handler, "defineProperty")? else {
            return target_define_own_property(ncx, &target, key, desc);
        };
        let desc_obj = from_property_descriptor(ncx, desc)?;
        let ok = invoke_trap(ncx, &trap, &handler, smallvec![target.clone(), key.to_value(), desc_obj])?
            .to_boolean();
        if !ok {
            return Ok(false);
        }
        let Some(target_obj) = target.as_object() else {
            return Ok(true);
        };

        let target_desc = target_obj.get_own_property(ncx, key)?;
        let extensible = target_obj.is_extensible(ncx)?;
        let setting_non_configurable = desc.configurable == Some(false);
        match target_desc {
            None => {
                if !extensible {
                    return Err(trap_error(
                        "defineProperty",
                        format!("returned truish for adding property '{}' to the non-extensible proxy target", key),
                    ));
                }
                if setting_non_configurable {
                    return Err(trap_error(
                        "defineProperty",
                        format!("returned truish for defining non-configurable property '{}' which does not exist in the proxy target", key),
                    ));
                }
            }
            Some(current) => {
                if !is_compatible_descriptor(extensible, desc, Some(&current)) {
                    return Err(trap_error(
                        "defineProperty",
                        format!("returned truish for property '{}' that is incompatible with the existing property in the proxy target", key),
                    ));
                }
                if setting_non_configurable && current.is_configurable() {
                    return Err(trap_error(
                        "defineProperty",
                        format!("returned truish for defining non-configurable property '{}' which is configurable in the proxy target", key),
                    ));
                }
                if !current.is_accessor()
                    && !current.is_configurable()
                    && current.is_writable()
                    && desc.writable == Some(false)
                {
                    return Err(trap_error(
                        "defineProperty",
                        format!("returned truish for making non-configurable property '{}' non-writable while the target property is writable", key),
                    ));
                }
            }
        }
        Ok(true)
    })
}

/// `[[HasProperty]]` (`has` trap)
pub fn proxy_has(ncx: &mut NativeContext, proxy: &GcRef<JsObject>, key: &PropertyKey) -> VmResult<bool> {
    ncx.nested(|ncx| {
        let (target, handler) = proxy_parts(proxy, "has")?;
        let Some(trap) = get_trap(ncx, &handler, "has")? else {
            return target_has(ncx, &target, key);
        };
        let found = invoke_trap(ncx, &trap, &handler, smallvec![target.clone(), key.to_value()])?.to_boolean();
        if found {
            return Ok(true);
        }
        if let Some(target_obj) = target.as_object()
            && let Some(current) = target_obj.get_own_property(ncx, key)?
        {
            if !current.is_configurable() {
                return Err(trap_error(
                    "has",
                    format!("returned false for non-configurable property '{}'", key),
                ));
            }
            if !target_obj.is_extensible(ncx)? {
                return Err(trap_error(
                    "has",
                    format!("returned false for property '{}' of a non-extensible target", key),
                ));
            }
        }
        Ok(false)
    })
}

/// `[[Get]]` (`get` trap)
pub fn proxy_get(
    ncx: &mut NativeContext,
    proxy: &GcRef<JsObject>,
    key: &PropertyKey,
    receiver: Value,
) -> VmResult<Value> {
    ncx.nested(|ncx| {
        let (target, handler) = proxy_parts(proxy, "get")?;
        let Some(trap) = get_trap(ncx, &handler, "get")? else {
            return target_get(ncx, &target, key, &receiver);
        };
        let value = invoke_trap(ncx, &trap, &handler, smallvec![target.clone(), key.to_value(), receiver])?;
        if let Some(target_obj) = target.as_object()
            && let Some(current) = target_obj.get_own_property(ncx, key)?
            && !current.is_configurable()
        {
            match &current {
                PropertyDescriptor::Data { value: expected, attributes }
                    if !attributes.writable() && !same_value(&value, expected) =>
                {
                    return Err(trap_error(
                        "get",
                        format!("returned value that doesn't match non-configurable, non-writable data property '{}'", key),
                    ));
                }
                PropertyDescriptor::Accessor { get: None, .. } if !value.is_undefined() => {
                    return Err(trap_error(
                        "get",
                        format!("must report undefined for non-configurable accessor property '{}' without a getter", key),
                    ));
                }
                _ => {}
            }
        }
        Ok(value)
    })
}

/// `[[Set]]` (`set` trap)
pub fn proxy_set(
    ncx: &mut NativeContext,
    proxy: &GcRef<JsObject>,
    key: &PropertyKey,
    value: Value,
    receiver: Value,
) -> VmResult<bool> {
    ncx.nested(|ncx| {
        let (target, handler) = proxy_parts(proxy, "set")?;
        let Some(trap) = get_trap(ncx, &handler, "set")? else {
            return target_set(ncx, &target, key, value, &receiver);
        };
        let ok = invoke_trap(
            ncx,
            &trap,
            &handler,
            smallvec![target.clone(), key.to_value(), value.clone(), receiver],
        )?
        .to_boolean();
        if !ok {
            return Ok(false);
        }
        if let Some(target_obj) = target.as_object()
            && let Some(current) = target_obj.get_own_property(ncx, key)?
            && !current.is_configurable()
        {
            match &current {
                PropertyDescriptor::Data { value: expected, attributes }
                    if !attributes.writable() && !same_value(&value, expected) =>
                {
                    return Err(trap_error(
                        "set",
                        format!("returned truish for property '{}' which is a non-configurable, non-writable data property with a different value", key),
                    ));
                }
                PropertyDescriptor::Accessor { set: None, .. } => {
                    return Err(trap_error(
                        "set",
                        format!("returned truish for property '{}' which is a non-configurable accessor property without a setter", key),
                    ));
                }
                _ => {}
            }
        }
        Ok(true)
    })
}

/// `[[Delete]]` (`deleteProperty` trap)
pub fn proxy_delete(ncx: &mut NativeContext, proxy: &GcRef<JsObject>, key: &PropertyKey) -> VmResult<bool> {
    ncx.nested(|ncx| {
        let (target, handler) = proxy_parts(proxy, "deleteProperty")?;
        let Some(trap) = get_trap(ncx, &handler, "deleteProperty")? else {
            return target_delete(ncx, &target, key);
        };
        let ok = invoke_trap(ncx, &trap, &handler, smallvec![target.clone(), key.to_value()])?.to_boolean();
        if !ok {
            return Ok(false);
        }
        if let Some(target_obj) = target.as_object()
            && let Some(current) = target_obj.get_own_property(ncx, key)?
        {
            if !current.is_configurable() {
                return Err(trap_error(
                    "deleteProperty",
                    format!("returned truish for property '{}' which is non-configurable in the proxy target", key),
                ));
            }
            if !target_obj.is_extensible(ncx)? {
                return Err(trap_error(
                    "deleteProperty",
                    format!("returned truish for property '{}' of a non-extensible target", key),
                ));
            }
        }
        Ok(true)
    })
}

/// `[[OwnPropertyKeys]]` (`ownKeys` trap)
pub fn proxy_own_keys(ncx: &mut NativeContext, proxy: &GcRef<JsObject>) -> VmResult<Vec<PropertyKey>> {
    ncx.nested(|ncx| {
        let (target, handler) = proxy_parts(proxy, "ownKeys")?;
        let Some(trap) = get_trap(ncx, &handler, "ownKeys")? else {
            return target_own_keys(ncx, &target);
        };
        let result = invoke_trap(ncx, &trap, &handler, smallvec![target.clone()])?;
        let keys = create_key_list(ncx, &result)?;
        let Some(target_obj) = target.as_object() else {
            return Ok(keys);
        };

        let extensible = target_obj.is_extensible(ncx)?;
        let mut configurable_keys = Vec::new();
        let mut non_configurable_keys = Vec::new();
        for key in target_obj.own_property_keys(ncx)? {
            match target_obj.get_own_property(ncx, &key)? {
                Some(desc) if !desc.is_configurable() => non_configurable_keys.push(key),
                _ => configurable_keys.push(key),
            }
        }
        if extensible && non_configurable_keys.is_empty() {
            return Ok(keys);
        }

        let mut unchecked: FxHashSet<PropertyKey> = keys.iter().cloned().collect();
        for key in &non_configurable_keys {
            if !unchecked.remove(key) {
                return Err(trap_error(
                    "ownKeys",
                    format!("result must contain all non-configurable property keys, missing '{}'", key),
                ));
            }
        }
        if extensible {
            return Ok(keys);
        }
        for key in &configurable_keys {
            if !unchecked.remove(key) {
                return Err(trap_error(
                    "ownKeys",
                    format!("result must contain all keys of the non-extensible target, missing '{}'", key),
                ));
            }
        }
        if !unchecked.is_empty() {
            return Err(trap_error(
                "ownKeys",
                "result must not add keys to a non-extensible target",
            ));
        }
        Ok(keys)
    })
}

/// `[[PreventExtensions]]` (`preventExtensions` trap)
pub fn proxy_prevent_extensions(ncx: &mut NativeContext, proxy: &GcRef<JsObject>) -> VmResult<bool> {
    ncx.nested(|ncx| {
        let (target, handler) = proxy_parts(proxy, "preventExtensions")?;
        let Some(trap) = get_trap(ncx, &handler, "preventExtensions")? else {
            return match target.as_object() {
                Some(obj) => obj.prevent_extensions(ncx),
                None => Ok(false),
            };
        };
        let ok = invoke_trap(ncx, &trap, &handler, smallvec![target.clone()])?.to_boolean();
        if ok
            && let Some(target_obj) = target.as_object()
            && target_obj.is_extensible(ncx)?
        {
            return Err(trap_error(
                "preventExtensions",
                "returned truish but the proxy target is extensible",
            ));
        }
        Ok(ok)
    })
}

/// `[[IsExtensible]]` (`isExtensible` trap)
pub fn proxy_is_extensible(ncx: &mut NativeContext, proxy: &GcRef<JsObject>) -> VmResult<bool> {
    ncx.nested(|ncx| {
        let (target, handler) = proxy_parts(proxy, "isExtensible")?;
        let Some(trap) = get_trap(ncx, &handler, "isExtensible")? else {
            return target_is_extensible(ncx, &target);
        };
        let result = invoke_trap(ncx, &trap, &handler, smallvec![target.clone()])?.to_boolean();
        if let Some(target_obj) = target.as_object() {
            let actual = target_obj.is_extensible(ncx)?;
            if result != actual {
                return Err(trap_error(
                    "isExtensible",
                    format!("result does not reflect extensibility of proxy target (which is '{}')", actual),
                ));
            }
        }
        Ok(result)
    })
}

/// `[[GetPrototypeOf]]` (`getPrototypeOf` trap)
pub fn proxy_get_prototype_of(
    ncx: &mut NativeContext,
    proxy: &GcRef<JsObject>,
) -> VmResult<Option<GcRef<JsObject>>> {
    ncx.nested(|ncx| {
        let (target, handler) = proxy_parts(proxy, "getPrototypeOf")?;
        let Some(trap) = get_trap(ncx, &handler, "getPrototypeOf")? else {
            return match target.as_object() {
                Some(obj) => obj.get_prototype_of(ncx),
                None => Ok(None),
            };
        };
        let prototype = match invoke_trap(ncx, &trap, &handler, smallvec![target.clone()])? {
            Value::Null => None,
            Value::Object(obj) => Some(obj),
            _ => return Err(trap_error("getPrototypeOf", "returned neither object nor null")),
        };
        if let Some(target_obj) = target.as_object()
            && !target_obj.is_extensible(ncx)?
            && !same_prototype(&prototype, &target_obj.get_prototype_of(ncx)?)
        {
            return Err(trap_error(
                "getPrototypeOf",
                "did not return the prototype of the non-extensible proxy target",
            ));
        }
        Ok(prototype)
    })
}

/// `[[SetPrototypeOf]]` (`setPrototypeOf` trap)
pub fn proxy_set_prototype_of(
    ncx: &mut NativeContext,
    proxy: &GcRef<JsObject>,
    prototype: Option<GcRef<JsObject>>,
) -> VmResult<bool> {
    ncx.nested(|ncx| {
        let (target, handler) = proxy_parts(proxy, "setPrototypeOf")?;
        let Some(trap) = get_trap(ncx, &handler, "setPrototypeOf")? else {
            return match target.as_object() {
                Some(obj) => obj.set_prototype_of(ncx, prototype),
                None => Ok(false),
            };
        };
        let ok = invoke_trap(ncx, &trap, &handler, smallvec![target.clone(), prototype_value(&prototype)])?
            .to_boolean();
        if !ok {
            return Ok(false);
        }
        if let Some(target_obj) = target.as_object()
            && !target_obj.is_extensible(ncx)?
            && !same_prototype(&prototype, &target_obj.get_prototype_of(ncx)?)
        {
            return Err(trap_error(
                "setPrototypeOf",
                "returned truish for setting a new prototype on the non-extensible proxy target",
            ));
        }
        Ok(true)
    })
}

/// `[[Call]]` (`apply` trap)
pub fn proxy_call(
    ncx: &mut NativeContext,
    proxy: &GcRef<JsObject>,
    this: Value,
    args: &[Value],
) -> VmResult<Value> {
    let (target, handler) = proxy_parts(proxy, "apply")?;
    let Some(trap) = get_trap(ncx, &handler, "apply")? else {
        return ncx.call_function(&target, this, args);
    };
    invoke_trap(ncx, &trap, &handler, smallvec![target, this, create_args_array(args)])
}

/// `[[Construct]]` (`construct` trap)
pub fn proxy_construct(
    ncx: &mut NativeContext,
    proxy: &GcRef<JsObject>,
    args: &[Value],
    new_target: &Value,
) -> VmResult<Value> {
    let (target, handler) = proxy_parts(proxy, "construct")?;
    let Some(trap) = get_trap(ncx, &handler, "construct")? else {
        return ncx.construct(&target, args, new_target);
    };
    let result = invoke_trap(
        ncx,
        &trap,
        &handler,
        smallvec![target, create_args_array(args), new_target.clone()],
    )?;
    if !result.is_object() {
        return Err(trap_error("construct", "returned non-object"));
    }
    Ok(result)
}
