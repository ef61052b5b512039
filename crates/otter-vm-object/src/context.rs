//! Native execution context.
//!
//! Every operation that can run script code (getters, setters, proxy traps,
//! `valueOf` during numeric conversion) takes a `&mut NativeContext`. The
//! context carries the object model configuration, the optional script host
//! that runs non-native functions, and the nesting depth used to turn
//! runaway recursion into a `RangeError`.

use crate::config::ObjectModelConfig;
use crate::convert::{to_bigint_primitive, to_number_primitive};
use crate::error::{VmError, VmResult};
use crate::function::FunctionData;
use crate::gc::GcRef;
use crate::object::{JsObject, ObjectData};
use crate::property::PropertyKey;
use crate::proxy_operations;
use crate::value::Value;
use num_bigint::BigInt;
use std::sync::Arc;

/// Runs functions the object model cannot run itself.
pub trait ScriptHost: Send + Sync {
    /// Call a script function
    fn call(
        &self,
        ncx: &mut NativeContext,
        function: &GcRef<JsObject>,
        id: u64,
        this: &Value,
        args: &[Value],
    ) -> VmResult<Value>;

    /// Construct with a script function
    fn construct(
        &self,
        _ncx: &mut NativeContext,
        _function: &GcRef<JsObject>,
        _id: u64,
        _args: &[Value],
        _new_target: &Value,
    ) -> VmResult<Value> {
        Err(VmError::type_error("function is not a constructor"))
    }
}

/// Preferred type for ToPrimitive
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreferredType {
    /// `valueOf` first
    Number,
    /// `toString` first
    String,
}

/// Context passed to every operation that may call back into script.
pub struct NativeContext {
    config: Arc<ObjectModelConfig>,
    host: Option<Arc<dyn ScriptHost>>,
    depth: usize,
}

impl NativeContext {
    /// Context with the default configuration and no script host
    pub fn new() -> Self {
        Self::with_config(Arc::new(ObjectModelConfig::default()))
    }

    /// Context with a custom configuration
    pub fn with_config(config: Arc<ObjectModelConfig>) -> Self {
        Self {
            config,
            host: None,
            depth: 0,
        }
    }

    /// Attach a script host
    pub fn with_host(mut self, host: Arc<dyn ScriptHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Object model configuration
    #[inline]
    pub fn config(&self) -> &ObjectModelConfig {
        &self.config
    }

    /// Shared handle to the configuration
    pub fn config_arc(&self) -> Arc<ObjectModelConfig> {
        self.config.clone()
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Run `f` one level deeper, failing with `StackOverflow` at the limit
    pub fn nested<R>(&mut self, f: impl FnOnce(&mut Self) -> VmResult<R>) -> VmResult<R> {
        if self.depth >= self.config.max_call_depth {
            return Err(VmError::StackOverflow);
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Call `callee` with `this` and `args`
    pub fn call_function(&mut self, callee: &Value, this: Value, args: &[Value]) -> VmResult<Value> {
        match callee {
            Value::Object(func) => self.nested(|ncx| match func.data() {
                ObjectData::Function(FunctionData::Native { call, .. }) => call(ncx, &this, args),
                ObjectData::Function(FunctionData::Script { id, .. }) => {
                    let host = ncx.host()?;
                    host.call(ncx, func, *id, &this, args)
                }
                ObjectData::Proxy(_) if func.is_callable() => {
                    proxy_operations::proxy_call(ncx, func, this, args)
                }
                _ => Err(not_a_function(callee)),
            }),
            Value::Foreign(foreign) if foreign.is_executable() => {
                self.nested(|_| foreign.execute(&this, args))
            }
            _ => Err(not_a_function(callee)),
        }
    }

    /// `new callee(...args)` with an explicit `new.target`
    pub fn construct(&mut self, callee: &Value, args: &[Value], new_target: &Value) -> VmResult<Value> {
        let Some(func) = callee.as_object().filter(|f| f.is_constructor()) else {
            return Err(VmError::type_error(format!(
                "{:?} is not a constructor",
                callee
            )));
        };
        let result = self.nested(|ncx| match func.data() {
            ObjectData::Function(FunctionData::Native { call, .. }) => call(ncx, new_target, args),
            ObjectData::Function(FunctionData::Script { id, .. }) => {
                let host = ncx.host()?;
                host.construct(ncx, func, *id, args, new_target)
            }
            ObjectData::Proxy(_) => proxy_operations::proxy_construct(ncx, func, args, new_target),
            _ => Err(VmError::type_error("not a constructor")),
        })?;
        if !result.is_object() {
            return Err(VmError::type_error("constructor did not return an object"));
        }
        Ok(result)
    }

    fn host(&self) -> VmResult<Arc<dyn ScriptHost>> {
        self.host
            .clone()
            .ok_or_else(|| VmError::internal("no script host attached to run script functions"))
    }

    /// OrdinaryToPrimitive
    pub fn to_primitive(&mut self, value: &Value, hint: PreferredType) -> VmResult<Value> {
        let Value::Object(obj) = value else {
            if value.is_object() {
                return Err(VmError::type_error("Cannot convert object to primitive value"));
            }
            return Ok(value.clone());
        };
        let order = match hint {
            PreferredType::Number => ["valueOf", "toString"],
            PreferredType::String => ["toString", "valueOf"],
        };
        for name in order {
            let method = obj.get(self, &PropertyKey::string(name), value)?;
            if method.is_callable() {
                let result = self.call_function(&method, value.clone(), &[])?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }
        Err(VmError::type_error("Cannot convert object to primitive value"))
    }

    /// ToNumber
    pub fn to_number(&mut self, value: &Value) -> VmResult<f64> {
        if value.is_object() {
            let primitive = self.to_primitive(value, PreferredType::Number)?;
            return to_number_primitive(&primitive);
        }
        to_number_primitive(value)
    }

    /// ToBigInt
    pub fn to_bigint(&mut self, value: &Value) -> VmResult<BigInt> {
        if value.is_object() {
            let primitive = self.to_primitive(value, PreferredType::Number)?;
            return to_bigint_primitive(&primitive);
        }
        to_bigint_primitive(value)
    }

    /// ToPropertyKey
    pub fn to_property_key(&mut self, value: &Value) -> VmResult<PropertyKey> {
        if value.is_object() {
            let primitive = self.to_primitive(value, PreferredType::String)?;
            return PropertyKey::from_value(&primitive);
        }
        PropertyKey::from_value(value)
    }
}

impl Default for NativeContext {
    fn default() -> Self {
        Self::new()
    }
}

fn not_a_function(value: &Value) -> VmError {
    VmError::type_error(format!("{:?} is not a function", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::native_function;

    #[test]
    fn test_call_native_function() {
        let mut ncx = NativeContext::new();
        let add = native_function("add", 2, |ncx, _this, args| {
            let a = ncx.to_number(args.first().unwrap_or(&Value::undefined()))?;
            let b = ncx.to_number(args.get(1).unwrap_or(&Value::undefined()))?;
            Ok(Value::number(a + b))
        });
        let result = ncx
            .call_function(&Value::object(add), Value::undefined(), &[Value::int32(2), Value::string("3")])
            .unwrap();
        assert_eq!(result, Value::int32(5));
    }

    #[test]
    fn test_call_non_callable() {
        let mut ncx = NativeContext::new();
        let err = ncx
            .call_function(&Value::int32(1), Value::undefined(), &[])
            .unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_nesting_limit() {
        let config = ObjectModelConfig {
            max_call_depth: 3,
            ..Default::default()
        };
        let mut ncx = NativeContext::with_config(Arc::new(config));
        let result = ncx.nested(|a| a.nested(|b| b.nested(|c| c.nested(|_| Ok(())))));
        assert!(matches!(result, Err(VmError::StackOverflow)));
        assert_eq!(ncx.depth(), 0);
    }

    #[test]
    fn test_to_number_uses_value_of() {
        let mut ncx = NativeContext::new();
        let obj = JsObject::ordinary(None);
        let value_of = native_function("valueOf", 0, |_, _, _| Ok(Value::int32(42)));
        obj.put(&mut ncx, &PropertyKey::string("valueOf"), Value::object(value_of), true)
            .unwrap();
        assert_eq!(ncx.to_number(&Value::object(obj)).unwrap(), 42.0);
    }

    #[test]
    fn test_script_function_without_host() {
        let mut ncx = NativeContext::new();
        let func = JsObject::script_function(7, false);
        let err = ncx
            .call_function(&Value::object(func), Value::undefined(), &[])
            .unwrap_err();
        assert!(matches!(err, VmError::InternalError(_)));
    }
}
