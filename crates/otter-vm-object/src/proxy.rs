//! Proxy exotic object records.
//!
//! A proxy holds its target and handler until revoked. Revocation is a
//! one-way flag; every trap on a revoked proxy throws. Callability and
//! constructibility are captured from the target at creation time.
//!
//! The trap algorithms live in [`crate::proxy_operations`].

use crate::error::{VmError, VmResult};
use crate::function::native_function;
use crate::gc::{GcRef, address_of};
use crate::object::{JsObject, ObjectData};
use crate::value::Value;
use std::sync::atomic::{AtomicBool, Ordering};

/// A JavaScript Proxy object
///
/// Proxies intercept fundamental operations on target objects
/// through handler traps.
pub struct JsProxy {
    /// The target object being proxied
    target: Value,
    /// The handler object containing traps
    handler: Value,
    /// Whether this proxy has been revoked
    revoked: AtomicBool,
    callable: bool,
    constructor: bool,
}

impl std::fmt::Debug for JsProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_revoked() {
            write!(f, "Proxy {{ <revoked> }}")
        } else {
            write!(f, "Proxy {{ target: {:?} }}", self.target)
        }
    }
}

impl JsProxy {
    /// ProxyCreate: a proxy object over `target` with `handler`.
    ///
    /// `target` must be an object (native or foreign) and `handler` a native
    /// object.
    pub fn create(target: Value, handler: Value) -> VmResult<GcRef<JsObject>> {
        if !target.is_object() || handler.as_object().is_none() {
            return Err(VmError::type_error(
                "Cannot create proxy with a non-object as target or handler",
            ));
        }
        let proxy = Self {
            callable: target.is_callable(),
            constructor: target.is_constructor(),
            target,
            handler,
            revoked: AtomicBool::new(false),
        };
        Ok(JsObject::with_data(None, ObjectData::Proxy(proxy)))
    }

    /// `Proxy.revocable`: the proxy plus a function object that revokes it.
    ///
    /// The revoke function only holds a weak reference, so it does not keep
    /// the proxy alive; calling it again is a no-op.
    pub fn revocable(target: Value, handler: Value) -> VmResult<(GcRef<JsObject>, GcRef<JsObject>)> {
        let proxy = Self::create(target, handler)?;
        let weak = GcRef::downgrade(&proxy);
        let revoke = native_function("", 0, move |_, _, _| {
            if let Some(proxy_obj) = weak.upgrade()
                && let Some(proxy) = proxy_obj.as_proxy()
                && !proxy.is_revoked()
            {
                proxy.revoke();
                tracing::debug!(
                    target: "otter::object",
                    proxy = address_of(&proxy_obj),
                    "proxy revoked"
                );
            }
            Ok(Value::undefined())
        });
        Ok((proxy, revoke))
    }

    /// Get the target
    ///
    /// Returns `None` if the proxy has been revoked.
    pub fn target(&self) -> Option<&Value> {
        (!self.is_revoked()).then_some(&self.target)
    }

    /// Get the handler
    ///
    /// Returns `None` if the proxy has been revoked.
    pub fn handler(&self) -> Option<&Value> {
        (!self.is_revoked()).then_some(&self.handler)
    }

    /// Get the raw target value without revocation checks.
    pub fn target_raw(&self) -> &Value {
        &self.target
    }

    /// Check if this proxy has been revoked
    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }

    /// Revoke this proxy
    ///
    /// After revocation, all trap operations will throw a TypeError.
    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::Release);
    }

    /// Whether the target was callable at creation
    pub fn is_callable(&self) -> bool {
        self.callable
    }

    /// Whether the target was a constructor at creation
    pub fn is_constructor(&self) -> bool {
        self.constructor
    }
}
