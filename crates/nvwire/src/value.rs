//! # Wire Values
//!
//! `Value` is the dynamic shape of everything that crosses the wire: call
//! arguments, results, error payloads. It mirrors MessagePack's data model with
//! one addition: extension values tagged 0, 1 or 2 are lifted into typed
//! [`RemoteHandle`]s as soon as they are decoded.
//!
//! ## Philosophy
//!
//! - **Lossless**: an extension payload that fails the handle codec is kept as
//!   `Value::Ext`. The failure is reported when someone asks for a handle, not
//!   while reading the surrounding message.
//! - **Explicit Conversion**: typed access goes through [`FromValue`]; building
//!   values goes through `From`. There are no implicit coercions beyond numeric
//!   widening.

use std::collections::HashMap;

use crate::error::Error;
use crate::error::Result;
use crate::handle::decode_ext;
use crate::handle::Buffer;
use crate::handle::Handle;
use crate::handle::HandleKind;
use crate::handle::RemoteHandle;
use crate::handle::Tabpage;
use crate::handle::Window;

/// A dynamically typed wire value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    /// Only used for unsigned values that do not fit in an `i64`.
    UInt(u64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
    Array(Vec<Value>),
    /// Key order is preserved as received.
    Map(Vec<(Value, Value)>),
    Handle(RemoteHandle),
    /// A foreign extension, or a handle extension whose payload did not decode.
    Ext(i8, Vec<u8>),
}

impl Value {
    /// A short name for the variant, used in type mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "bool",
            Self::Int(_) | Self::UInt(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Binary(_) => "binary",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Handle(h) => h.kind.name(),
            Self::Ext(..) => "extension",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(n) => Some(n),
            Self::UInt(n) => i64::try_from(n).ok(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up a string key in a map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Builds a map value from string keys.
    pub fn map<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (Value::String(k.into()), v.into()))
                .collect(),
        )
    }

    /// Converts into any [`FromValue`] type.
    pub fn into_typed<T: FromValue>(self) -> Result<T> {
        T::from_value(self)
    }
}

// ============================================================================
// rmpv bridge
// ============================================================================

impl From<rmpv::Value> for Value {
    fn from(v: rmpv::Value) -> Self {
        match v {
            rmpv::Value::Nil => Self::Nil,
            rmpv::Value::Boolean(b) => Self::Bool(b),
            rmpv::Value::Integer(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::UInt(n.as_u64().unwrap_or_default()),
            },
            rmpv::Value::F32(f) => Self::Float(f as f64),
            rmpv::Value::F64(f) => Self::Float(f),
            rmpv::Value::String(s) => {
                if s.is_str() {
                    Self::String(s.into_str().unwrap_or_default())
                } else {
                    Self::Binary(s.into_bytes())
                }
            }
            rmpv::Value::Binary(b) => Self::Binary(b),
            rmpv::Value::Array(items) => Self::Array(items.into_iter().map(Value::from).collect()),
            rmpv::Value::Map(pairs) => Self::Map(
                pairs
                    .into_iter()
                    .map(|(k, v)| (Value::from(k), Value::from(v)))
                    .collect(),
            ),
            rmpv::Value::Ext(ext_type, payload) => {
                match HandleKind::from_ext_type(ext_type).map(|kind| (kind, decode_ext(&payload))) {
                    Some((kind, Ok(id))) => Self::Handle(RemoteHandle::new(kind, id)),
                    _ => Self::Ext(ext_type, payload),
                }
            }
        }
    }
}

impl From<Value> for rmpv::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Nil => rmpv::Value::Nil,
            Value::Bool(b) => rmpv::Value::Boolean(b),
            Value::Int(n) => rmpv::Value::Integer(n.into()),
            Value::UInt(n) => rmpv::Value::Integer(n.into()),
            Value::Float(f) => rmpv::Value::F64(f),
            Value::String(s) => rmpv::Value::String(s.into()),
            Value::Binary(b) => rmpv::Value::Binary(b),
            Value::Array(items) => rmpv::Value::Array(items.into_iter().map(Into::into).collect()),
            Value::Map(pairs) => rmpv::Value::Map(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            Value::Handle(h) => {
                let (ext_type, payload) = h.encode();
                rmpv::Value::Ext(ext_type, payload.to_vec())
            }
            Value::Ext(ext_type, payload) => rmpv::Value::Ext(ext_type, payload),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::UInt(n) => write!(f, "{}", n),
            Self::Float(x) => write!(f, "{}", x),
            Self::String(s) => write!(f, "{:?}", s),
            Self::Binary(b) => write!(f, "<{} bytes>", b.len()),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Self::Map(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
            Self::Handle(h) => write!(f, "{}", h),
            Self::Ext(ext_type, payload) => write!(f, "ext({}, {:02x?})", ext_type, payload),
        }
    }
}

// ============================================================================
// FromValue
// ============================================================================

/// Typed extraction from a wire value.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

/// Discards the value. Host calls without a meaningful result return nil,
/// but some return a status nobody asked for.
impl FromValue for () {
    fn from_value(_: Value) -> Result<Self> {
        Ok(())
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(Error::mismatch("bool", other.kind_name())),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(n) => Ok(n as f64),
            Value::UInt(n) => Ok(n as f64),
            other => Err(Error::mismatch("float", other.kind_name())),
        }
    }
}

macro_rules! impl_int {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self> {
                    let narrowed = match value {
                        Value::Int(n) => <$ty>::try_from(n).ok(),
                        Value::UInt(n) => <$ty>::try_from(n).ok(),
                        other => return Err(Error::mismatch(stringify!($ty), other.kind_name())),
                    };
                    narrowed.ok_or_else(|| Error::mismatch(stringify!($ty), "out of range integer"))
                }
            }

            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    match i64::try_from(n) {
                        Ok(i) => Value::Int(i),
                        Err(_) => Value::UInt(n as u64),
                    }
                }
            }
        )*
    };
}

impl_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(Error::mismatch("string", other.kind_name())),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(Error::mismatch("array", other.kind_name())),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<A: FromValue, B: FromValue> FromValue for (A, B) {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) if items.len() == 2 => {
                let mut items = items.into_iter();
                match (items.next(), items.next()) {
                    (Some(a), Some(b)) => Ok((A::from_value(a)?, B::from_value(b)?)),
                    _ => Err(Error::mismatch("array of 2", "short array")),
                }
            }
            Value::Array(items) => Err(Error::mismatch("array of 2", format!("array of {}", items.len()))),
            other => Err(Error::mismatch("array of 2", other.kind_name())),
        }
    }
}

impl<T: FromValue> FromValue for HashMap<String, T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(pairs) => pairs
                .into_iter()
                .map(|(k, v)| Ok((String::from_value(k)?, T::from_value(v)?)))
                .collect(),
            other => Err(Error::mismatch("map", other.kind_name())),
        }
    }
}

impl FromValue for RemoteHandle {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Handle(h) => Ok(h),
            Value::Ext(ext_type, payload) => RemoteHandle::decode(ext_type, &payload),
            other => Err(Error::mismatch("handle", other.kind_name())),
        }
    }
}

macro_rules! impl_handle_value {
    ($($ty:ident),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Handle(h) => $ty::from_remote(h),
                        Value::Ext(ext_type, payload) => $ty::decode_ext(ext_type, &payload),
                        other => Err(Error::mismatch(<$ty as Handle>::KIND.name(), other.kind_name())),
                    }
                }
            }

            impl From<$ty> for Value {
                fn from(h: $ty) -> Self {
                    Value::Handle(h.to_remote())
                }
            }
        )*
    };
}

impl_handle_value!(Buffer, Window, Tabpage);

// ============================================================================
// Into Value
// ============================================================================

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Nil
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<RemoteHandle> for Value {
    fn from(h: RemoteHandle) -> Self {
        Value::Handle(h)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Value::Array(vec![a.into(), b.into()])
    }
}

