//! Object Model Integration Tests
//!
//! End-to-end behavior of the public object surface:
//! - Shape sharing between identically built objects
//! - Array storage strategies and `length` semantics
//! - Typed arrays over detached buffers
//! - Proxy invariant enforcement
//! - Dictionary mode round trips

use otter_vm_object::gc::same_ref;
use otter_vm_object::{
    ArrayElements, ArrayStoreKind, DefineDescriptor, JsArrayBuffer, JsObject, JsProxy, JsTypedArray,
    NativeContext, ObjectModelConfig, PropertyAttributes, PropertyKey, TypedArrayKind, Value,
    native_function,
};
use std::sync::Arc;

fn key(s: &str) -> PropertyKey {
    PropertyKey::string(s)
}

fn int_array(values: &[i32]) -> Arc<JsObject> {
    JsObject::array_from_values(None, values.iter().map(|n| Value::int32(*n)).collect())
}

// ============================================================================
// Shapes
// ============================================================================

#[test]
fn test_identical_construction_shares_shape() {
    let mut ncx = NativeContext::new();
    let a = JsObject::ordinary(None);
    let b = JsObject::ordinary(None);
    for obj in [&a, &b] {
        obj.put(&mut ncx, &key("x"), Value::int32(1), true).unwrap();
        obj.put(&mut ncx, &key("y"), Value::int32(2), true).unwrap();
    }
    assert!(same_ref(&a.shape(), &b.shape()));

    let c = JsObject::ordinary(None);
    c.put(&mut ncx, &key("y"), Value::int32(2), true).unwrap();
    c.put(&mut ncx, &key("x"), Value::int32(1), true).unwrap();
    assert!(!same_ref(&a.shape(), &c.shape()));
}

#[test]
fn test_frozen_object_rejects_writes() {
    let mut ncx = NativeContext::new();
    let obj = JsObject::ordinary(None);
    obj.put(&mut ncx, &key("a"), Value::int32(1), true).unwrap();
    obj.set_integrity_level(&mut ncx, true, true).unwrap();

    assert!(!obj.put(&mut ncx, &key("a"), Value::int32(2), false).unwrap());
    assert!(obj.put(&mut ncx, &key("a"), Value::int32(2), true).unwrap_err().is_type_error());
    assert!(!obj.put(&mut ncx, &key("b"), Value::int32(2), false).unwrap());
    assert_eq!(obj.get_value(&mut ncx, &key("a")).unwrap(), Value::int32(1));
    assert!(obj.test_integrity_level(&mut ncx, true).unwrap());
}

// ============================================================================
// Arrays
// ============================================================================

#[test]
fn test_literal_then_gap_then_far_write() {
    let mut ncx = NativeContext::new();
    let arr = int_array(&[1, 2, 3]);
    assert_eq!(arr.array_store_kind(), Some(ArrayStoreKind::PackedInt));

    arr.put(&mut ncx, &PropertyKey::index(5), Value::int32(1), true).unwrap();
    assert_eq!(arr.array_store_kind(), Some(ArrayStoreKind::Holes));
    assert_eq!(arr.array_length(), Some(6));
    let holes = arr.as_array().unwrap().borrow().hole_count();
    assert_eq!(holes, 2);

    let mut elements = ArrayElements::from_values(vec![Value::int32(1), Value::int32(2), Value::int32(3)]);
    elements.set_element(1 << 32, Value::int32(1), true).unwrap();
    assert_eq!(elements.store_kind(), ArrayStoreKind::Sparse);
}

#[test]
fn test_length_assignment_truncates() {
    // let a = []; a[0] = 1; a[1] = 2; a.length = 1;
    let mut ncx = NativeContext::new();
    let a = JsObject::array(None, ArrayElements::with_length(0));
    a.put(&mut ncx, &PropertyKey::index(0), Value::int32(1), true).unwrap();
    a.put(&mut ncx, &PropertyKey::index(1), Value::int32(2), true).unwrap();
    a.put(&mut ncx, &key("length"), Value::int32(1), true).unwrap();

    assert_eq!(a.get_value(&mut ncx, &key("length")).unwrap(), Value::int32(1));
    assert_eq!(a.get_value(&mut ncx, &PropertyKey::index(1)).unwrap(), Value::undefined());
    assert!(!a.has_own_property(&mut ncx, &PropertyKey::index(1)).unwrap());
}

#[test]
fn test_strict_shrink_of_sealed_array_throws() {
    let mut ncx = NativeContext::new();
    let arr = int_array(&[1, 2, 3]);
    arr.set_integrity_level(&mut ncx, false, true).unwrap();

    let err = arr.put(&mut ncx, &key("length"), Value::int32(0), true).unwrap_err();
    assert!(err.is_type_error());
    assert_eq!(arr.array_length(), Some(3));
    assert_eq!(arr.get_value(&mut ncx, &PropertyKey::index(2)).unwrap(), Value::int32(3));
}

#[test]
fn test_non_integral_length_is_range_error() {
    let mut ncx = NativeContext::new();
    let arr = int_array(&[1]);
    let desc = DefineDescriptor::value(Value::number(4294967296.0));
    let err = arr.define_own_property(&mut ncx, &key("length"), &desc, true).unwrap_err();
    assert!(err.is_range_error());
}

#[test]
fn test_array_length_descriptor() {
    let mut ncx = NativeContext::new();
    let arr = int_array(&[1, 2]);
    let desc = arr.get_own_property(&mut ncx, &key("length")).unwrap().unwrap();
    assert_eq!(desc.value(), Some(&Value::int32(2)));
    assert!(desc.is_writable());
    assert!(!desc.is_enumerable());
    assert!(!desc.is_configurable());
}

// ============================================================================
// Typed arrays
// ============================================================================

#[test]
fn test_typed_array_over_detached_buffer() {
    // new Int32Array(buf, 4, 2), then detach buf
    let mut ncx = NativeContext::new();
    let buffer = JsObject::array_buffer(None, JsArrayBuffer::new(16));
    let view = JsTypedArray::new(buffer.clone(), TypedArrayKind::Int32, 4, Some(2)).unwrap();
    let ta = JsObject::typed_array(None, view);
    ta.put(&mut ncx, &PropertyKey::index(0), Value::int32(7), true).unwrap();
    assert_eq!(ta.get_value(&mut ncx, &PropertyKey::index(0)).unwrap(), Value::int32(7));

    buffer.as_array_buffer().unwrap().detach(&Value::undefined()).unwrap();

    let view = ta.as_typed_array().unwrap();
    assert_eq!(view.length(), 0);
    assert_eq!(ta.get_value(&mut ncx, &PropertyKey::index(0)).unwrap(), Value::undefined());
    assert!(!ta.has_property(&mut ncx, &PropertyKey::index(0)).unwrap());
    ta.put(&mut ncx, &PropertyKey::index(0), Value::int32(5), true).unwrap();
    assert_eq!(ta.get_value(&mut ncx, &PropertyKey::index(0)).unwrap(), Value::undefined());
    assert!(view.validate().unwrap_err().is_type_error());
}

#[test]
fn test_typed_array_construction_errors() {
    let buffer = JsObject::array_buffer(None, JsArrayBuffer::new(8));
    let misaligned = JsTypedArray::new(buffer.clone(), TypedArrayKind::Int32, 2, None).unwrap_err();
    assert!(misaligned.is_range_error());
    let too_long = JsTypedArray::new(buffer.clone(), TypedArrayKind::Int32, 4, Some(2)).unwrap_err();
    assert!(too_long.is_range_error());

    buffer.as_array_buffer().unwrap().detach(&Value::undefined()).unwrap();
    let detached = JsTypedArray::new(buffer, TypedArrayKind::Int32, 0, None).unwrap_err();
    assert!(detached.is_type_error());
}

#[test]
fn test_views_share_buffer_bytes() {
    let mut ncx = NativeContext::new();
    let buffer = JsObject::array_buffer(None, JsArrayBuffer::new(4));
    let bytes = JsObject::typed_array(
        None,
        JsTypedArray::new(buffer.clone(), TypedArrayKind::Uint8, 0, None).unwrap(),
    );
    let words = JsObject::typed_array(
        None,
        JsTypedArray::new(buffer, TypedArrayKind::Uint32, 0, None).unwrap(),
    );
    bytes.put(&mut ncx, &PropertyKey::index(0), Value::int32(1), true).unwrap();
    bytes.put(&mut ncx, &PropertyKey::index(1), Value::int32(1), true).unwrap();
    assert_eq!(words.get_value(&mut ncx, &PropertyKey::index(0)).unwrap(), Value::int32(257));
}

// ============================================================================
// Proxies
// ============================================================================

fn handler_with(name: &str, trap: Arc<JsObject>) -> Value {
    let handler = JsObject::ordinary(None);
    handler.define_builtin(key(name), Value::object(trap), PropertyAttributes::data());
    Value::object(handler)
}

#[test]
fn test_proxy_get_over_frozen_target() {
    // new Proxy(Object.freeze({a: 1}), { get() { return 2 } })
    let mut ncx = NativeContext::new();
    let target = JsObject::ordinary(None);
    target.put(&mut ncx, &key("a"), Value::int32(1), true).unwrap();
    target.set_integrity_level(&mut ncx, true, true).unwrap();

    let trap = native_function("get", 3, |_, _, _| Ok(Value::int32(2)));
    let proxy = JsProxy::create(Value::object(target), handler_with("get", trap)).unwrap();
    let err = proxy.get_value(&mut ncx, &key("a")).unwrap_err();
    assert!(err.is_type_error());
}

#[test]
fn test_proxy_own_keys_omitting_non_configurable_key() {
    let mut ncx = NativeContext::new();
    let target = JsObject::ordinary(None);
    target
        .define_property_or_throw(
            &mut ncx,
            &key("fixed"),
            &DefineDescriptor::data(Value::int32(1), PropertyAttributes::empty()),
        )
        .unwrap();
    target.prevent_extensions(&mut ncx).unwrap();

    let trap = native_function("ownKeys", 1, |_, _, _| {
        Ok(Value::object(JsObject::array_from_values(None, Vec::new())))
    });
    let proxy = JsProxy::create(Value::object(target), handler_with("ownKeys", trap)).unwrap();
    let err = proxy.own_property_keys(&mut ncx).unwrap_err();
    assert!(err.is_type_error());
}

#[test]
fn test_proxy_as_prototype() {
    let mut ncx = NativeContext::new();
    let trap = native_function("get", 3, |_, _, _| Ok(Value::string("from proxy")));
    let proxy = JsProxy::create(Value::object(JsObject::ordinary(None)), handler_with("get", trap)).unwrap();
    let obj = JsObject::ordinary(Some(proxy));
    obj.put(&mut ncx, &key("own"), Value::int32(1), true).unwrap();
    assert_eq!(obj.get_value(&mut ncx, &key("own")).unwrap(), Value::int32(1));
    assert_eq!(obj.get_value(&mut ncx, &key("missing")).unwrap(), Value::string("from proxy"));
}

#[test]
fn test_revoked_proxy() {
    let mut ncx = NativeContext::new();
    let (proxy, revoke) = JsProxy::revocable(
        Value::object(JsObject::ordinary(None)),
        Value::object(JsObject::ordinary(None)),
    )
    .unwrap();
    proxy.put(&mut ncx, &key("a"), Value::int32(1), true).unwrap();
    revoke.call(&mut ncx, Value::undefined(), &[]).unwrap();
    assert!(proxy.get_value(&mut ncx, &key("a")).unwrap_err().is_type_error());
    assert!(proxy.get_prototype_of(&mut ncx).unwrap_err().is_type_error());
}

// ============================================================================
// Dictionary mode
// ============================================================================

#[test]
fn test_dictionary_round_trip() {
    let config = ObjectModelConfig {
        dictionary_threshold: 8,
        ..Default::default()
    };
    let mut ncx = NativeContext::with_config(Arc::new(config));
    let obj = JsObject::ordinary(None);
    for i in 0..12 {
        obj.put(&mut ncx, &key(&format!("p{i}")), Value::int32(i), true).unwrap();
    }
    assert!(obj.is_dictionary_mode());

    for i in 4..12 {
        assert!(obj.delete(&mut ncx, &key(&format!("p{i}"))).unwrap());
    }
    let readonly = DefineDescriptor::default().with_writable(false);
    obj.define_property_or_throw(&mut ncx, &key("p0"), &readonly).unwrap();
    obj.define_property_or_throw(
        &mut ncx,
        &key("extra"),
        &DefineDescriptor::data(Value::int32(100), PropertyAttributes::ENUMERABLE),
    )
    .unwrap();

    let rendered: Vec<String> = obj
        .own_property_keys(&mut ncx)
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(rendered, ["p0", "p1", "p2", "p3", "extra"]);
    for i in 0..4 {
        assert_eq!(obj.get_value(&mut ncx, &key(&format!("p{i}"))).unwrap(), Value::int32(i));
    }

    let p0 = obj.get_own_property(&mut ncx, &key("p0")).unwrap().unwrap();
    assert!(!p0.is_writable() && p0.is_enumerable() && p0.is_configurable());
    assert!(!obj.put(&mut ncx, &key("p0"), Value::int32(9), false).unwrap());

    let extra = obj.get_own_property(&mut ncx, &key("extra")).unwrap().unwrap();
    assert!(!extra.is_configurable());
    assert!(!obj.delete(&mut ncx, &key("extra")).unwrap());
    assert!(obj.delete(&mut ncx, &key("p1")).unwrap());
    assert_eq!(obj.get_value(&mut ncx, &key("p1")).unwrap(), Value::undefined());
}
