//! Property keys, attributes and descriptors.
//!
//! Keys are canonicalized on construction: a string that spells an array
//! index (`"0"` up to `"4294967294"`) always becomes [`PropertyKey::Index`],
//! so the same property never has two key forms.

use crate::convert::number_to_string;
use crate::error::{VmError, VmResult};
use crate::string::JsString;
use crate::value::{Symbol, Value, same_value};
use bitflags::bitflags;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Largest valid array index (2^32 - 2)
pub const MAX_ARRAY_INDEX: u32 = u32::MAX - 1;

/// Property key (string, symbol or array index)
#[derive(Clone)]
pub enum PropertyKey {
    /// String property key that is not an array index
    String(Arc<JsString>),
    /// Symbol property key
    Symbol(Arc<Symbol>),
    /// Array index
    Index(u32),
}

impl PropertyKey {
    /// Create a string property key, canonicalizing array indices
    pub fn string(s: &str) -> Self {
        match parse_array_index(s) {
            Some(index) => Self::Index(index),
            None => Self::String(JsString::intern(s)),
        }
    }

    /// Create from an existing string handle, canonicalizing array indices
    pub fn from_js_string(s: Arc<JsString>) -> Self {
        match parse_array_index(s.as_str()) {
            Some(index) => Self::Index(index),
            None => Self::String(s),
        }
    }

    /// Create a symbol key
    pub fn symbol(sym: Arc<Symbol>) -> Self {
        Self::Symbol(sym)
    }

    /// Create an index key.
    ///
    /// `u32::MAX` is not an array index and becomes the string `"4294967295"`.
    pub fn index(i: u32) -> Self {
        if i == u32::MAX {
            Self::String(JsString::intern("4294967295"))
        } else {
            Self::Index(i)
        }
    }

    /// Key for an integer index that may exceed the array-index range
    pub fn from_u64(i: u64) -> Self {
        if i <= MAX_ARRAY_INDEX as u64 {
            Self::Index(i as u32)
        } else {
            let mut buf = itoa::Buffer::new();
            Self::String(JsString::intern(buf.format(i)))
        }
    }

    /// ToPropertyKey for primitive values
    pub fn from_value(value: &Value) -> VmResult<Self> {
        Ok(match value {
            Value::Symbol(sym) => Self::Symbol(sym.clone()),
            Value::String(s) => Self::from_js_string(s.clone()),
            Value::Int32(n) if *n >= 0 => Self::Index(*n as u32),
            Value::Int32(n) => Self::String(JsString::intern(&n.to_string())),
            Value::Number(n) => Self::string(&number_to_string(*n)),
            Value::Undefined => Self::string("undefined"),
            Value::Null => Self::string("null"),
            Value::Boolean(b) => Self::string(if *b { "true" } else { "false" }),
            Value::BigInt(b) => Self::string(&b.to_string()),
            Value::Object(_) | Value::Foreign(_) => {
                return Err(VmError::type_error(
                    "Cannot convert object to property key",
                ));
            }
        })
    }

    /// The array index, if this key is one
    #[inline]
    pub fn as_array_index(&self) -> Option<u32> {
        match self {
            Self::Index(i) => Some(*i),
            _ => None,
        }
    }

    /// Whether this key is an array index
    #[inline]
    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }

    /// Whether this key is a symbol
    #[inline]
    pub fn is_symbol(&self) -> bool {
        matches!(self, Self::Symbol(_))
    }

    /// Whether this key names an internal slot
    #[inline]
    pub fn is_hidden(&self) -> bool {
        matches!(self, Self::Symbol(sym) if sym.is_hidden())
    }

    /// Whether this is the string key `s`
    #[inline]
    pub fn is_str(&self, s: &str) -> bool {
        matches!(self, Self::String(js) if js.as_str() == s)
    }

    /// The key as a script value (indices become strings)
    pub fn to_value(&self) -> Value {
        match self {
            Self::String(s) => Value::js_string(s.clone()),
            Self::Symbol(sym) => Value::symbol(sym.clone()),
            Self::Index(i) => {
                let mut buf = itoa::Buffer::new();
                Value::string(buf.format(*i))
            }
        }
    }
}

/// Parse a canonical array index: no sign, no leading zeros, below 2^32 - 1
fn parse_array_index(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    if bytes.is_empty() || bytes.len() > 10 {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    if !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let value: u64 = s.parse().ok()?;
    (value <= MAX_ARRAY_INDEX as u64).then_some(value as u32)
}

impl PartialEq for PropertyKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a.id == b.id,
            (Self::Index(a), Self::Index(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PropertyKey {}

impl Hash for PropertyKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::String(s) => {
                state.write_u8(0);
                s.hash(state);
            }
            Self::Symbol(sym) => {
                state.write_u8(1);
                state.write_u64(sym.id);
            }
            Self::Index(i) => {
                state.write_u8(2);
                state.write_u32(*i);
            }
        }
    }
}

impl fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s.as_str()),
            Self::Symbol(sym) => match &sym.description {
                Some(desc) => write!(f, "Symbol({desc})"),
                None => f.write_str("Symbol()"),
            },
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<u32> for PropertyKey {
    fn from(i: u32) -> Self {
        Self::index(i)
    }
}

bitflags! {
    /// Property attribute bits
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PropertyAttributes: u8 {
        /// `[[Writable]]` (data properties only)
        const WRITABLE = 1 << 0;
        /// `[[Enumerable]]`
        const ENUMERABLE = 1 << 1;
        /// `[[Configurable]]`
        const CONFIGURABLE = 1 << 2;
    }
}

impl PropertyAttributes {
    /// Default data property attributes
    pub const fn data() -> Self {
        Self::all()
    }

    /// Writable, configurable, not enumerable (builtin methods, array `length` before sealing)
    pub const fn builtin_method() -> Self {
        Self::WRITABLE.union(Self::CONFIGURABLE)
    }

    /// Non-writable, non-enumerable, non-configurable
    pub const fn frozen() -> Self {
        Self::empty()
    }

    /// Property is writable
    #[inline]
    pub fn writable(self) -> bool {
        self.contains(Self::WRITABLE)
    }

    /// Property is enumerable
    #[inline]
    pub fn enumerable(self) -> bool {
        self.contains(Self::ENUMERABLE)
    }

    /// Property is configurable
    #[inline]
    pub fn configurable(self) -> bool {
        self.contains(Self::CONFIGURABLE)
    }
}

/// A complete property descriptor, as stored on an object
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyDescriptor {
    /// Data property
    Data {
        /// The value
        value: Value,
        /// Attributes
        attributes: PropertyAttributes,
    },
    /// Accessor property
    Accessor {
        /// Getter function, `None` for undefined
        get: Option<Value>,
        /// Setter function, `None` for undefined
        set: Option<Value>,
        /// Attributes (`WRITABLE` is never set)
        attributes: PropertyAttributes,
    },
}

impl PropertyDescriptor {
    /// Create a data property with default attributes
    pub fn data(value: Value) -> Self {
        Self::Data {
            value,
            attributes: PropertyAttributes::data(),
        }
    }

    /// Create a data property with specific attributes
    pub fn data_with_attrs(value: Value, attributes: PropertyAttributes) -> Self {
        Self::Data { value, attributes }
    }

    /// Create an accessor property
    pub fn accessor(get: Option<Value>, set: Option<Value>, attributes: PropertyAttributes) -> Self {
        Self::Accessor {
            get: get.filter(|v| !v.is_undefined()),
            set: set.filter(|v| !v.is_undefined()),
            attributes: attributes - PropertyAttributes::WRITABLE,
        }
    }

    /// Get the value (for data properties)
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Data { value, .. } => Some(value),
            Self::Accessor { .. } => None,
        }
    }

    /// Attributes
    pub fn attributes(&self) -> PropertyAttributes {
        match self {
            Self::Data { attributes, .. } | Self::Accessor { attributes, .. } => *attributes,
        }
    }

    /// Whether this is an accessor property
    pub fn is_accessor(&self) -> bool {
        matches!(self, Self::Accessor { .. })
    }

    /// Check if writable (accessors never are)
    pub fn is_writable(&self) -> bool {
        match self {
            Self::Data { attributes, .. } => attributes.writable(),
            Self::Accessor { .. } => false,
        }
    }

    /// Check if enumerable
    pub fn is_enumerable(&self) -> bool {
        self.attributes().enumerable()
    }

    /// Check if configurable
    pub fn is_configurable(&self) -> bool {
        self.attributes().configurable()
    }

    /// Copy with different attributes
    pub fn with_attributes(&self, attributes: PropertyAttributes) -> Self {
        match self {
            Self::Data { value, .. } => Self::Data {
                value: value.clone(),
                attributes,
            },
            Self::Accessor { get, set, .. } => Self::Accessor {
                get: get.clone(),
                set: set.clone(),
                attributes: attributes - PropertyAttributes::WRITABLE,
            },
        }
    }
}

/// A partial descriptor as passed to `[[DefineOwnProperty]]`.
///
/// Absent fields are `None`. For `get`/`set`, `Some(undefined)` means the
/// field is present with value `undefined`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DefineDescriptor {
    /// `[[Value]]`
    pub value: Option<Value>,
    /// `[[Writable]]`
    pub writable: Option<bool>,
    /// `[[Get]]`
    pub get: Option<Value>,
    /// `[[Set]]`
    pub set: Option<Value>,
    /// `[[Enumerable]]`
    pub enumerable: Option<bool>,
    /// `[[Configurable]]`
    pub configurable: Option<bool>,
}

impl DefineDescriptor {
    /// A fully specified data descriptor
    pub fn data(value: Value, attributes: PropertyAttributes) -> Self {
        Self {
            value: Some(value),
            writable: Some(attributes.writable()),
            enumerable: Some(attributes.enumerable()),
            configurable: Some(attributes.configurable()),
            ..Self::default()
        }
    }

    /// A descriptor carrying only `[[Value]]`
    pub fn value(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// A fully specified accessor descriptor
    pub fn accessor(get: Value, set: Value, attributes: PropertyAttributes) -> Self {
        Self {
            get: Some(get),
            set: Some(set),
            enumerable: Some(attributes.enumerable()),
            configurable: Some(attributes.configurable()),
            ..Self::default()
        }
    }

    /// Set `[[Writable]]`
    pub fn with_writable(mut self, writable: bool) -> Self {
        self.writable = Some(writable);
        self
    }

    /// Set `[[Enumerable]]`
    pub fn with_enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = Some(enumerable);
        self
    }

    /// Set `[[Configurable]]`
    pub fn with_configurable(mut self, configurable: bool) -> Self {
        self.configurable = Some(configurable);
        self
    }

    /// Fully specified descriptor equal to `desc`
    pub fn from_complete(desc: &PropertyDescriptor) -> Self {
        match desc {
            PropertyDescriptor::Data { value, attributes } => Self::data(value.clone(), *attributes),
            PropertyDescriptor::Accessor {
                get,
                set,
                attributes,
            } => Self::accessor(
                get.clone().unwrap_or_default(),
                set.clone().unwrap_or_default(),
                *attributes,
            ),
        }
    }

    /// IsAccessorDescriptor
    pub fn is_accessor_descriptor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    /// IsDataDescriptor
    pub fn is_data_descriptor(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    /// IsGenericDescriptor
    pub fn is_generic_descriptor(&self) -> bool {
        !self.is_accessor_descriptor() && !self.is_data_descriptor()
    }

    /// Whether no field is present
    pub fn is_empty(&self) -> bool {
        self.is_generic_descriptor() && self.enumerable.is_none() && self.configurable.is_none()
    }

    /// CompletePropertyDescriptor: fill absent fields with defaults
    pub fn to_complete(&self) -> PropertyDescriptor {
        let mut attributes = PropertyAttributes::empty();
        attributes.set(PropertyAttributes::ENUMERABLE, self.enumerable == Some(true));
        attributes.set(
            PropertyAttributes::CONFIGURABLE,
            self.configurable == Some(true),
        );
        if self.is_accessor_descriptor() {
            PropertyDescriptor::accessor(self.get.clone(), self.set.clone(), attributes)
        } else {
            attributes.set(PropertyAttributes::WRITABLE, self.writable == Some(true));
            PropertyDescriptor::Data {
                value: self.value.clone().unwrap_or_default(),
                attributes,
            }
        }
    }
}

fn same_accessor(a: &Option<Value>, b: &Option<Value>) -> bool {
    let a = a.clone().unwrap_or_default();
    let b = b.clone().unwrap_or_default();
    same_value(&a, &b)
}

/// ValidateAndApplyPropertyDescriptor.
///
/// Returns the property that results from applying `desc` over `current`,
/// or `None` when the change is not allowed.
pub fn validate_and_apply(
    extensible: bool,
    desc: &DefineDescriptor,
    current: Option<&PropertyDescriptor>,
) -> Option<PropertyDescriptor> {
    let Some(current) = current else {
        return extensible.then(|| desc.to_complete());
    };

    if desc.is_empty() {
        return Some(current.clone());
    }

    let attrs = current.attributes();
    if !attrs.configurable() {
        if desc.configurable == Some(true) {
            return None;
        }
        if desc.enumerable.is_some_and(|e| e != attrs.enumerable()) {
            return None;
        }
        if !desc.is_generic_descriptor() && desc.is_accessor_descriptor() != current.is_accessor() {
            return None;
        }
        match current {
            PropertyDescriptor::Accessor { get, set, .. } => {
                if desc.get.as_ref().is_some_and(|g| !same_accessor(&Some(g.clone()), get)) {
                    return None;
                }
                if desc.set.as_ref().is_some_and(|s| !same_accessor(&Some(s.clone()), set)) {
                    return None;
                }
            }
            PropertyDescriptor::Data { value, attributes } if !attributes.writable() => {
                if desc.writable == Some(true) {
                    return None;
                }
                if desc.value.as_ref().is_some_and(|v| !same_value(v, value)) {
                    return None;
                }
            }
            PropertyDescriptor::Data { .. } => {}
        }
    }

    let mut attributes = attrs;
    if let Some(enumerable) = desc.enumerable {
        attributes.set(PropertyAttributes::ENUMERABLE, enumerable);
    }
    if let Some(configurable) = desc.configurable {
        attributes.set(PropertyAttributes::CONFIGURABLE, configurable);
    }

    let applied = match current {
        PropertyDescriptor::Data { .. } if desc.is_accessor_descriptor() => {
            PropertyDescriptor::accessor(desc.get.clone(), desc.set.clone(), attributes)
        }
        PropertyDescriptor::Accessor { .. } if desc.is_data_descriptor() => {
            attributes.set(PropertyAttributes::WRITABLE, desc.writable == Some(true));
            PropertyDescriptor::Data {
                value: desc.value.clone().unwrap_or_default(),
                attributes,
            }
        }
        PropertyDescriptor::Data { value, .. } => {
            if let Some(writable) = desc.writable {
                attributes.set(PropertyAttributes::WRITABLE, writable);
            }
            PropertyDescriptor::Data {
                value: desc.value.clone().unwrap_or_else(|| value.clone()),
                attributes,
            }
        }
        PropertyDescriptor::Accessor { get, set, .. } => PropertyDescriptor::accessor(
            desc.get.clone().or_else(|| get.clone()),
            desc.set.clone().or_else(|| set.clone()),
            attributes,
        ),
    };
    Some(applied)
}

/// IsCompatiblePropertyDescriptor
pub fn is_compatible_descriptor(
    extensible: bool,
    desc: &DefineDescriptor,
    current: Option<&PropertyDescriptor>,
) -> bool {
    validate_and_apply(extensible, desc, current).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_canonicalization() {
        assert_eq!(PropertyKey::string("0"), PropertyKey::Index(0));
        assert_eq!(PropertyKey::string("4294967294"), PropertyKey::Index(4294967294));
        assert!(matches!(PropertyKey::string("4294967295"), PropertyKey::String(_)));
        assert!(matches!(PropertyKey::string("01"), PropertyKey::String(_)));
        assert!(matches!(PropertyKey::string("-1"), PropertyKey::String(_)));
        assert!(matches!(PropertyKey::index(u32::MAX), PropertyKey::String(_)));
        assert_eq!(PropertyKey::from_u64(1 << 32), PropertyKey::string("4294967296"));
    }

    #[test]
    fn test_key_from_value() {
        assert_eq!(
            PropertyKey::from_value(&Value::number(1.0)).unwrap(),
            PropertyKey::Index(1)
        );
        assert_eq!(
            PropertyKey::from_value(&Value::number(1.5)).unwrap(),
            PropertyKey::string("1.5")
        );
        assert_eq!(
            PropertyKey::from_value(&Value::number(-0.0)).unwrap(),
            PropertyKey::Index(0)
        );
        assert_eq!(
            PropertyKey::from_value(&Value::int32(-3)).unwrap(),
            PropertyKey::string("-3")
        );
    }

    #[test]
    fn test_hidden_symbol_keys() {
        let hidden = PropertyKey::symbol(Symbol::hidden("internal"));
        let visible = PropertyKey::symbol(Symbol::new(Some("internal")));
        assert!(hidden.is_hidden());
        assert!(!visible.is_hidden());
        assert_ne!(hidden, visible);
    }

    #[test]
    fn test_complete_defaults() {
        let desc = DefineDescriptor::value(Value::int32(1)).to_complete();
        assert_eq!(
            desc,
            PropertyDescriptor::data_with_attrs(Value::int32(1), PropertyAttributes::empty())
        );
        let getter = DefineDescriptor {
            get: Some(Value::undefined()),
            ..Default::default()
        };
        assert!(getter.to_complete().is_accessor());
    }

    #[test]
    fn test_validate_new_property() {
        let desc = DefineDescriptor::value(Value::int32(1));
        assert!(validate_and_apply(true, &desc, None).is_some());
        assert!(validate_and_apply(false, &desc, None).is_none());
    }

    #[test]
    fn test_validate_non_configurable() {
        let current =
            PropertyDescriptor::data_with_attrs(Value::int32(1), PropertyAttributes::ENUMERABLE);
        // Same value is fine even when frozen.
        assert!(validate_and_apply(true, &DefineDescriptor::value(Value::int32(1)), Some(&current)).is_some());
        assert!(validate_and_apply(true, &DefineDescriptor::value(Value::int32(2)), Some(&current)).is_none());
        assert!(
            validate_and_apply(true, &DefineDescriptor::default().with_configurable(true), Some(&current))
                .is_none()
        );
        assert!(
            validate_and_apply(true, &DefineDescriptor::default().with_enumerable(false), Some(&current))
                .is_none()
        );
        let to_accessor = DefineDescriptor {
            get: Some(Value::undefined()),
            ..Default::default()
        };
        assert!(validate_and_apply(true, &to_accessor, Some(&current)).is_none());
    }

    #[test]
    fn test_writable_to_readonly_allowed() {
        let current = PropertyDescriptor::data_with_attrs(
            Value::int32(1),
            PropertyAttributes::WRITABLE,
        );
        let applied = validate_and_apply(
            true,
            &DefineDescriptor::value(Value::int32(5)).with_writable(false),
            Some(&current),
        )
        .unwrap();
        assert_eq!(
            applied,
            PropertyDescriptor::data_with_attrs(Value::int32(5), PropertyAttributes::empty())
        );
    }

    #[test]
    fn test_data_to_accessor_keeps_flags() {
        let current = PropertyDescriptor::data(Value::int32(1));
        let desc = DefineDescriptor {
            set: Some(Value::undefined()),
            ..Default::default()
        };
        let applied = validate_and_apply(true, &desc, Some(&current)).unwrap();
        assert!(applied.is_accessor());
        assert!(applied.is_enumerable());
        assert!(applied.is_configurable());
        assert!(!applied.attributes().writable());
    }
}
