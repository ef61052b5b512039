//! JavaScript values
//!
//! `Value` is the tagged union every object operation traffics in. Numbers
//! that fit an `i32` (and are not `-0`) are kept as `Int32`; everything else
//! numeric is an `f64`. Heap values are reference counted handles.

use crate::error::VmResult;
use crate::gc::{GcRef, same_ref};
use crate::object::JsObject;
use crate::property::PropertyKey;
use crate::string::JsString;
use num_bigint::BigInt;
use num_traits::Zero;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

/// A JavaScript Symbol
#[derive(Debug)]
pub struct Symbol {
    /// Symbol description
    pub description: Option<Arc<JsString>>,
    /// Unique ID
    pub id: u64,
    hidden: bool,
}

impl Symbol {
    /// Create a fresh, unique symbol
    pub fn new(description: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            description: description.map(JsString::intern),
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            hidden: false,
        })
    }

    /// Create an engine-internal symbol.
    ///
    /// Hidden symbols key internal slots: they never show up in own-key
    /// enumeration and stay in the shape when an object becomes a dictionary.
    pub fn hidden(name: &str) -> Arc<Self> {
        Arc::new(Self {
            description: Some(JsString::intern(name)),
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            hidden: true,
        })
    }

    /// Whether this symbol keys an internal slot
    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
}

/// An object owned by another language runtime.
///
/// Foreign objects can be proxy targets. Proxy operations on them fall back
/// to these accessors and skip the invariant checks that only make sense for
/// native targets.
pub trait ForeignObject: Send + Sync + fmt::Debug {
    /// Read a member, `None` when absent
    fn read(&self, key: &PropertyKey) -> Option<Value>;

    /// Write a member, `false` when the foreign side refuses
    fn write(&self, _key: &PropertyKey, _value: Value) -> bool {
        false
    }

    /// Membership test
    fn contains(&self, key: &PropertyKey) -> bool {
        self.read(key).is_some()
    }

    /// Remove a member
    fn remove(&self, _key: &PropertyKey) -> bool {
        false
    }

    /// Member keys in the foreign runtime's order
    fn keys(&self) -> Vec<PropertyKey> {
        Vec::new()
    }

    /// Whether the object can be invoked
    fn is_executable(&self) -> bool {
        false
    }

    /// Invoke the object
    fn execute(&self, _this: &Value, _args: &[Value]) -> VmResult<Value> {
        Err(crate::error::VmError::type_error(
            "foreign object is not executable",
        ))
    }
}

/// A JavaScript value
#[derive(Clone, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// Boolean
    Boolean(bool),
    /// Small integer number
    Int32(i32),
    /// Any other number
    Number(f64),
    /// String
    String(Arc<JsString>),
    /// Symbol
    Symbol(Arc<Symbol>),
    /// BigInt
    BigInt(Arc<BigInt>),
    /// Object
    Object(GcRef<JsObject>),
    /// Foreign object
    Foreign(Arc<dyn ForeignObject>),
}

impl Value {
    /// Create undefined value
    #[inline]
    pub const fn undefined() -> Self {
        Self::Undefined
    }

    /// Create null value
    #[inline]
    pub const fn null() -> Self {
        Self::Null
    }

    /// Create boolean value
    #[inline]
    pub const fn boolean(b: bool) -> Self {
        Self::Boolean(b)
    }

    /// Create 32-bit integer value
    #[inline]
    pub const fn int32(n: i32) -> Self {
        Self::Int32(n)
    }

    /// Create number value, narrowing to `Int32` when exact (`-0` stays a double)
    #[inline]
    pub fn number(n: f64) -> Self {
        if n.fract() == 0.0
            && n >= i32::MIN as f64
            && n <= i32::MAX as f64
            && !(n == 0.0 && n.is_sign_negative())
        {
            return Self::Int32(n as i32);
        }
        Self::Number(n)
    }

    /// Create an interned string value
    pub fn string(s: &str) -> Self {
        Self::String(JsString::intern(s))
    }

    /// Create a string value from an existing handle
    pub fn js_string(s: Arc<JsString>) -> Self {
        Self::String(s)
    }

    /// Create symbol value
    pub fn symbol(sym: Arc<Symbol>) -> Self {
        Self::Symbol(sym)
    }

    /// Create bigint value
    pub fn bigint(value: BigInt) -> Self {
        Self::BigInt(Arc::new(value))
    }

    /// Create object value
    pub fn object(obj: GcRef<JsObject>) -> Self {
        Self::Object(obj)
    }

    /// Create foreign object value
    pub fn foreign(obj: Arc<dyn ForeignObject>) -> Self {
        Self::Foreign(obj)
    }

    /// Check if undefined
    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Check if null
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if null or undefined
    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Check if boolean
    #[inline]
    pub fn is_boolean(&self) -> bool {
        matches!(self, Self::Boolean(_))
    }

    /// Check if number
    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Int32(_) | Self::Number(_))
    }

    /// Check if string
    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// Check if symbol
    #[inline]
    pub fn is_symbol(&self) -> bool {
        matches!(self, Self::Symbol(_))
    }

    /// Check if bigint
    #[inline]
    pub fn is_bigint(&self) -> bool {
        matches!(self, Self::BigInt(_))
    }

    /// Check if an object (native or foreign)
    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Foreign(_))
    }

    /// Check if callable
    pub fn is_callable(&self) -> bool {
        match self {
            Self::Object(obj) => obj.is_callable(),
            Self::Foreign(obj) => obj.is_executable(),
            _ => false,
        }
    }

    /// Check if usable with `new`
    pub fn is_constructor(&self) -> bool {
        match self {
            Self::Object(obj) => obj.is_constructor(),
            _ => false,
        }
    }

    /// Get as boolean
    #[inline]
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as int32
    #[inline]
    pub fn as_int32(&self) -> Option<i32> {
        match self {
            Self::Int32(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as number (int32 widened)
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int32(n) => Some(*n as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as string
    #[inline]
    pub fn as_string(&self) -> Option<&Arc<JsString>> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as symbol
    #[inline]
    pub fn as_symbol(&self) -> Option<&Arc<Symbol>> {
        match self {
            Self::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Get as bigint
    #[inline]
    pub fn as_bigint(&self) -> Option<&BigInt> {
        match self {
            Self::BigInt(b) => Some(b),
            _ => None,
        }
    }

    /// Get as native object
    #[inline]
    pub fn as_object(&self) -> Option<&GcRef<JsObject>> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Get as foreign object
    #[inline]
    pub fn as_foreign(&self) -> Option<&Arc<dyn ForeignObject>> {
        match self {
            Self::Foreign(obj) => Some(obj),
            _ => None,
        }
    }

    /// Convert to boolean (ToBoolean)
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Boolean(b) => *b,
            Self::Int32(n) => *n != 0,
            Self::Number(n) => !n.is_nan() && *n != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::BigInt(b) => !b.is_zero(),
            Self::Symbol(_) | Self::Object(_) | Self::Foreign(_) => true,
        }
    }

    /// Get the type name (for typeof)
    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Boolean(_) => "boolean",
            Self::Int32(_) | Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::BigInt(_) => "bigint",
            Self::Object(_) | Self::Foreign(_) if self.is_callable() => "function",
            Self::Object(_) | Self::Foreign(_) => "object",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int32(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<GcRef<JsObject>> for Value {
    fn from(obj: GcRef<JsObject>) -> Self {
        Self::Object(obj)
    }
}

/// SameValue: like `===` except `NaN` equals itself and `+0`/`-0` differ
pub fn same_value(x: &Value, y: &Value) -> bool {
    match (x.as_number(), y.as_number()) {
        (Some(a), Some(b)) => {
            if a.is_nan() && b.is_nan() {
                return true;
            }
            a == b && a.is_sign_negative() == b.is_sign_negative()
        }
        _ => same_non_number(x, y),
    }
}

/// SameValueZero: SameValue with `+0` equal to `-0`
pub fn same_value_zero(x: &Value, y: &Value) -> bool {
    match (x.as_number(), y.as_number()) {
        (Some(a), Some(b)) => (a.is_nan() && b.is_nan()) || a == b,
        _ => same_non_number(x, y),
    }
}

fn same_non_number(x: &Value, y: &Value) -> bool {
    match (x, y) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Symbol(a), Value::Symbol(b)) => a.id == b.id,
        (Value::BigInt(a), Value::BigInt(b)) => a == b,
        (Value::Object(a), Value::Object(b)) => same_ref(a, b),
        (Value::Foreign(a), Value::Foreign(b)) => same_ref(a, b),
        _ => false,
    }
}

/// Values compare with SameValue
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        same_value(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Int32(n) => write!(f, "{n}"),
            Self::Number(n) => write!(f, "{}", crate::convert::number_to_string(*n)),
            Self::String(s) => write!(f, "{:?}", s.as_str()),
            Self::Symbol(s) => match &s.description {
                Some(desc) => write!(f, "Symbol({desc})"),
                None => write!(f, "Symbol()"),
            },
            Self::BigInt(b) => write!(f, "{b}n"),
            Self::Object(obj) => write!(f, "[object {:?}]", obj.kind()),
            Self::Foreign(obj) => write!(f, "[foreign {obj:?}]"),
        }
    }
}
