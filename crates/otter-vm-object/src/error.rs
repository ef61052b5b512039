//! Object model error types

use crate::value::Value;
use thiserror::Error;

/// Errors raised by object operations.
///
/// The variants mirror the script-visible error classes. Anything a script
/// can catch travels as `TypeError`/`RangeError` or as a thrown `Exception`
/// produced by a getter, setter or proxy trap.
#[derive(Debug, Error)]
pub enum VmError {
    /// Type error (non-writable write, revoked proxy, trap invariant violation)
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Range error (invalid array length, bad typed array offset)
    #[error("RangeError: {0}")]
    RangeError(String),

    /// Internal error
    #[error("InternalError: {0}")]
    InternalError(String),

    /// Recursion limit reached while dispatching through proxies or calls
    #[error("RangeError: Maximum call stack size exceeded")]
    StackOverflow,

    /// Thrown JS exception
    #[error("Uncaught exception: {0}")]
    Exception(Box<ThrownValue>),
}

/// A thrown JavaScript value
#[derive(Debug)]
pub struct ThrownValue {
    /// The thrown value
    pub value: Value,
    /// Printable form of the value
    pub message: String,
}

impl std::fmt::Display for ThrownValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl VmError {
    /// Create a type error
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    /// Create a range error
    pub fn range_error(msg: impl Into<String>) -> Self {
        Self::RangeError(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Create an exception from a thrown JS value
    pub fn exception(value: Value) -> Self {
        let message = if let Some(s) = value.as_string() {
            s.as_str().to_string()
        } else {
            format!("{:?}", value)
        };
        Self::Exception(Box::new(ThrownValue { message, value }))
    }

    /// The thrown value, when this error carries one.
    pub fn thrown_value(&self) -> Option<&Value> {
        match self {
            Self::Exception(thrown) => Some(&thrown.value),
            _ => None,
        }
    }

    /// Whether this is a `TypeError`.
    pub fn is_type_error(&self) -> bool {
        matches!(self, Self::TypeError(_))
    }

    /// Whether this is a `RangeError` (stack overflow included).
    pub fn is_range_error(&self) -> bool {
        matches!(self, Self::RangeError(_) | Self::StackOverflow)
    }
}

/// Result type for object operations
pub type VmResult<T> = std::result::Result<T, VmError>;

/// Turn a failed internal method into `Ok(false)` or a `TypeError`.
///
/// Internal methods report failure as `false`; callers running in strict
/// mode (or `Object.defineProperty`) convert that into a thrown `TypeError`.
#[inline]
pub(crate) fn reject(do_throw: bool, message: impl FnOnce() -> String) -> VmResult<bool> {
    if do_throw {
        Err(VmError::TypeError(message()))
    } else {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            VmError::type_error("x is not a function").to_string(),
            "TypeError: x is not a function"
        );
        assert_eq!(
            VmError::StackOverflow.to_string(),
            "RangeError: Maximum call stack size exceeded"
        );
    }

    #[test]
    fn test_reject() {
        assert!(!reject(false, || "nope".into()).unwrap());
        let err = reject(true, || "nope".into()).unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_exception_carries_value() {
        let err = VmError::exception(Value::int32(7));
        assert_eq!(err.thrown_value(), Some(&Value::int32(7)));
    }
}
