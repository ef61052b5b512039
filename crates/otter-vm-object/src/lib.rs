//! # Otter VM Object Model
//!
//! Dynamic objects and property access for the Otter JavaScript runtime.
//!
//! ## Design Principles
//!
//! - **Hidden classes**: shape-based property layout with shared transition caches
//! - **Specialized arrays**: packed int/double/object, holey, sparse and lazy stores
//! - **Dictionary fallback**: hash-map storage for objects with pathological property counts
//! - **Exotic objects**: arrays, typed arrays over detachable buffers, proxies
//!
//! Every operation that may run script code takes a [`NativeContext`], which
//! carries the call capability, configuration and recursion guard.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod array;
pub mod array_buffer;
pub mod array_operations;
pub mod config;
pub mod context;
pub mod convert;
pub mod dictionary;
pub mod error;
pub mod function;
pub mod gc;
pub mod object;
pub mod object_cell;
mod ordinary;
pub mod property;
pub mod proxy;
pub mod proxy_operations;
pub mod shape;
pub mod string;
pub mod typed_array;
pub mod value;

pub use array::{ArrayElements, ArrayStoreKind, MatchResult};
pub use array_buffer::JsArrayBuffer;
pub use config::ObjectModelConfig;
pub use context::{NativeContext, PreferredType, ScriptHost};
pub use error::{VmError, VmResult};
pub use function::{native_constructor, native_function};
pub use gc::GcRef;
pub use object::{JsObject, ObjectData};
pub use property::{DefineDescriptor, PropertyAttributes, PropertyDescriptor, PropertyKey};
pub use proxy::JsProxy;
pub use shape::{ObjectKind, Shape};
pub use string::JsString;
pub use typed_array::{JsTypedArray, TypedArrayKind};
pub use value::{ForeignObject, Symbol, Value};
