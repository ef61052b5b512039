//! Function objects.
//!
//! The object model only needs enough of functions to run getters, setters
//! and proxy traps: natives are Rust closures, script functions are handed
//! to the context's [`ScriptHost`](crate::context::ScriptHost).

use crate::context::NativeContext;
use crate::error::VmResult;
use crate::gc::GcRef;
use crate::object::{JsObject, ObjectData};
use crate::property::{PropertyAttributes, PropertyKey};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Native function handler: `(context, this, args)`.
///
/// When invoked through `[[Construct]]`, `this` is the `new.target`.
pub type NativeFn = Arc<dyn Fn(&mut NativeContext, &Value, &[Value]) -> VmResult<Value> + Send + Sync>;

/// Payload of a function object
#[derive(Clone)]
pub enum FunctionData {
    /// Rust closure
    Native {
        /// Handler
        call: NativeFn,
        /// Has `[[Construct]]`
        constructor: bool,
    },
    /// Function compiled by the embedding engine
    Script {
        /// Host-side function id
        id: u64,
        /// Has `[[Construct]]`
        constructor: bool,
    },
}

impl FunctionData {
    /// Has `[[Construct]]`
    pub fn is_constructor(&self) -> bool {
        match self {
            Self::Native { constructor, .. } | Self::Script { constructor, .. } => *constructor,
        }
    }
}

impl fmt::Debug for FunctionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native { constructor, .. } => f
                .debug_struct("Native")
                .field("constructor", constructor)
                .finish_non_exhaustive(),
            Self::Script { id, constructor } => f
                .debug_struct("Script")
                .field("id", id)
                .field("constructor", constructor)
                .finish(),
        }
    }
}

fn install_name_and_length(func: &GcRef<JsObject>, name: &str, length: u32) {
    let attrs = PropertyAttributes::CONFIGURABLE;
    func.define_builtin(PropertyKey::string("length"), Value::number(length as f64), attrs);
    func.define_builtin(PropertyKey::string("name"), Value::string(name), attrs);
}

/// Create a native, non-constructor function object
pub fn native_function<F>(name: &str, length: u32, f: F) -> GcRef<JsObject>
where
    F: Fn(&mut NativeContext, &Value, &[Value]) -> VmResult<Value> + Send + Sync + 'static,
{
    let func = JsObject::with_data(
        None,
        ObjectData::Function(FunctionData::Native {
            call: Arc::new(f),
            constructor: false,
        }),
    );
    install_name_and_length(&func, name, length);
    func
}

/// Create a native function that also supports `new`
pub fn native_constructor<F>(name: &str, length: u32, f: F) -> GcRef<JsObject>
where
    F: Fn(&mut NativeContext, &Value, &[Value]) -> VmResult<Value> + Send + Sync + 'static,
{
    let func = JsObject::with_data(
        None,
        ObjectData::Function(FunctionData::Native {
            call: Arc::new(f),
            constructor: true,
        }),
    );
    install_name_and_length(&func, name, length);
    func
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_function_properties() {
        let mut ncx = NativeContext::new();
        let func = native_function("answer", 0, |_, _, _| Ok(Value::int32(42)));
        assert!(func.is_callable());
        assert!(!func.is_constructor());
        let name = func.get_value(&mut ncx, &PropertyKey::string("name")).unwrap();
        assert_eq!(name, Value::string("answer"));
        let desc = func
            .get_own_property(&mut ncx, &PropertyKey::string("length"))
            .unwrap()
            .unwrap();
        assert!(!desc.is_enumerable());
        assert!(!desc.is_writable());
    }

    #[test]
    fn test_native_constructor() {
        let mut ncx = NativeContext::new();
        let ctor = native_constructor("Point", 0, |_, _, _| {
            Ok(Value::object(JsObject::ordinary(None)))
        });
        assert!(ctor.is_constructor());
        let made = ncx
            .construct(&Value::object(ctor.clone()), &[], &Value::object(ctor))
            .unwrap();
        assert!(made.as_object().is_some());
    }
}
