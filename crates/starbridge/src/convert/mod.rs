//! Host/guest value bridge
//!
//! `HostValue` is the host-side view of data flowing into and out of guest
//! code. `to_guest` and `from_guest` translate between it and engine
//! `Value`s; `marshal_json` renders guest values as JSON.

mod json;
mod shared;
mod wrapper;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use starbridge_vm::{Dict, Set, Struct, Value};

use crate::error::ConvertError;

pub use json::{json_to_guest, marshal_json, unmarshal_json};
pub use shared::SharedDict;
pub use wrapper::{HostWrapper, WrapperKind};

/// Name to host value mapping, ordered by insertion
pub type HostMap = IndexMap<String, HostValue>;

/// A host object that knows how to present itself to guest code
pub trait MarshalGuest: Send + Sync + fmt::Debug {
    fn marshal_guest(&self) -> anyhow::Result<Value>;

    fn type_name(&self) -> &str {
        "host object"
    }
}

/// Host-side value
#[derive(Debug, Clone)]
pub enum HostValue {
    None,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Time(DateTime<Utc>),
    List(Vec<HostValue>),
    /// Mapping with string keys
    Map(HostMap),
    /// Mapping whose keys are not all strings
    ValueMap(Vec<(HostValue, HostValue)>),
    /// Host container passed by reference, possibly nil
    Wrapped(HostWrapper),
    Object(Arc<dyn MarshalGuest>),
    /// Already a guest value; passed through untouched
    Guest(Value),
    /// Host kinds with no guest counterpart
    Complex(f64, f64),
    Function(String),
}

impl HostValue {
    pub fn kind(&self) -> &str {
        match self {
            HostValue::None => "none",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::UInt(_) => "uint",
            HostValue::Float(_) => "float",
            HostValue::String(_) => "string",
            HostValue::Time(_) => "time",
            HostValue::List(_) => "list",
            HostValue::Map(_) | HostValue::ValueMap(_) => "map",
            HostValue::Wrapped(w) => w.kind().name(),
            HostValue::Object(o) => o.type_name(),
            HostValue::Guest(v) => v.type_name(),
            HostValue::Complex(..) => "complex",
            HostValue::Function(_) => "function",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            HostValue::Int(i) => Some(*i),
            HostValue::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            HostValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, HostValue::None)
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        use HostValue::*;
        match (self, other) {
            (None, None) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(_) | UInt(_), Int(_) | UInt(_)) => match (self.as_int(), other.as_int()) {
                (Some(a), Some(b)) => a == b,
                _ => matches!((self, other), (UInt(a), UInt(b)) if a == b),
            },
            (Float(a), Float(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Time(a), Time(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (ValueMap(a), ValueMap(b)) => a == b,
            (Wrapped(a), Wrapped(b)) => a == b,
            (Object(a), Object(b)) => Arc::ptr_eq(a, b),
            (Guest(a), Guest(b)) => a == b,
            (Complex(a, b), Complex(c, d)) => a == c && b == d,
            (Function(a), Function(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::None => f.write_str("nil"),
            HostValue::Bool(b) => write!(f, "{b}"),
            HostValue::Int(i) => write!(f, "{i}"),
            HostValue::UInt(u) => write!(f, "{u}"),
            HostValue::Float(x) => write!(f, "{x}"),
            HostValue::String(s) => f.write_str(s),
            HostValue::Time(t) => write!(f, "{}", t.to_rfc3339()),
            HostValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            HostValue::Map(map) => {
                f.write_str("map[")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                f.write_str("]")
            }
            HostValue::ValueMap(pairs) => {
                f.write_str("map[")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                f.write_str("]")
            }
            HostValue::Wrapped(w) => write!(f, "{w:?}"),
            HostValue::Object(o) => write!(f, "<{}>", o.type_name()),
            HostValue::Guest(v) => f.write_str(&v.to_str()),
            HostValue::Complex(re, im) => write!(f, "({re}{im:+}i)"),
            HostValue::Function(name) => write!(f, "func {name}"),
        }
    }
}

// ============================================================================
// Conversions from host primitives
// ============================================================================

macro_rules! from_signed {
    ($($t:ty),*) => {$(
        impl From<$t> for HostValue {
            fn from(v: $t) -> Self {
                HostValue::Int(v as i64)
            }
        }
    )*};
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {$(
        impl From<$t> for HostValue {
            fn from(v: $t) -> Self {
                HostValue::UInt(v as u64)
            }
        }
    )*};
}

from_signed!(i8, i16, i32, i64, isize);
from_unsigned!(u8, u16, u32, u64, usize);

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Bool(v)
    }
}

impl From<f32> for HostValue {
    fn from(v: f32) -> Self {
        HostValue::Float(v as f64)
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Float(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::String(v.to_string())
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        HostValue::String(v)
    }
}

impl From<DateTime<Utc>> for HostValue {
    fn from(v: DateTime<Utc>) -> Self {
        HostValue::Time(v)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(v: Vec<T>) -> Self {
        HostValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(HostValue::None, Into::into)
    }
}

impl From<HostMap> for HostValue {
    fn from(v: HostMap) -> Self {
        HostValue::Map(v)
    }
}

impl From<Value> for HostValue {
    fn from(v: Value) -> Self {
        HostValue::Guest(v)
    }
}

impl From<SharedDict> for HostValue {
    fn from(v: SharedDict) -> Self {
        HostValue::Object(Arc::new(v))
    }
}

// ============================================================================
// Host -> guest
// ============================================================================

fn unsupported(value: &HostValue) -> ConvertError {
    ConvertError::Unsupported {
        type_name: value.kind().to_string(),
        value: value.to_string(),
    }
}

/// Convert a host value into a guest value
pub fn to_guest(value: &HostValue) -> Result<Value, ConvertError> {
    Ok(match value {
        HostValue::None => Value::None,
        HostValue::Bool(b) => Value::Bool(*b),
        HostValue::Int(i) => Value::Int(*i),
        HostValue::UInt(u) => {
            Value::Int(i64::try_from(*u).map_err(|_| ConvertError::IntOutOfRange(u.to_string()))?)
        }
        HostValue::Float(f) => Value::Float(*f),
        HostValue::String(s) => Value::string(s),
        HostValue::Time(t) => Value::Time(*t),
        HostValue::List(items) => Value::list(items.iter().map(to_guest).collect::<Result<_, _>>()?),
        HostValue::Map(map) => {
            let dict = Dict::new();
            for (k, v) in map {
                dict.insert(Value::string(k), to_guest(v)?)?;
            }
            Value::dict(dict)
        }
        HostValue::ValueMap(pairs) => {
            let dict = Dict::new();
            for (k, v) in pairs {
                dict.insert(to_guest(k)?, to_guest(v)?)?;
            }
            Value::dict(dict)
        }
        HostValue::Wrapped(w) => Value::object(w.clone()),
        HostValue::Object(o) => o.marshal_guest().map_err(|source| ConvertError::Marshal {
            type_name: o.type_name().to_string(),
            source,
        })?,
        HostValue::Guest(v) => v.clone(),
        HostValue::Complex(..) | HostValue::Function(_) => return Err(unsupported(value)),
    })
}

/// Convert every entry of a host mapping
pub fn map_to_guest(map: &HostMap) -> Result<starbridge_vm::Env, ConvertError> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), to_guest(v)?)))
        .collect()
}

// ============================================================================
// Guest -> host
// ============================================================================

/// Convert a guest value into a host value
pub fn from_guest(value: &Value) -> Result<HostValue, ConvertError> {
    Ok(match value {
        Value::None => HostValue::None,
        Value::Bool(b) => HostValue::Bool(*b),
        Value::Int(i) => HostValue::Int(*i),
        Value::Float(f) => HostValue::Float(*f),
        Value::String(s) => HostValue::String(s.to_string()),
        Value::Time(t) => HostValue::Time(*t),
        Value::List(l) => seq_from_guest(&l.snapshot())?,
        Value::Tuple(items) => seq_from_guest(items)?,
        Value::Set(s) => set_from_guest(s)?,
        Value::Dict(d) => dict_from_guest(d)?,
        Value::Struct(s) => struct_from_guest(s)?,
        Value::Object(o) => {
            let any = o.as_any();
            if let Some(shared) = any.downcast_ref::<SharedDict>() {
                dict_from_guest(&shared.underlying())?
            } else if let Some(wrapper) = any.downcast_ref::<HostWrapper>() {
                wrapper.unwrap()?.clone()
            } else {
                return Err(ConvertError::UnknownKind(o.type_name().to_string()));
            }
        }
        other => return Err(ConvertError::UnknownKind(other.type_name().to_string())),
    })
}

fn seq_from_guest(items: &[Value]) -> Result<HostValue, ConvertError> {
    Ok(HostValue::List(items.iter().map(from_guest).collect::<Result<_, _>>()?))
}

fn set_from_guest(set: &Set) -> Result<HostValue, ConvertError> {
    seq_from_guest(&set.values())
}

fn struct_from_guest(s: &Struct) -> Result<HostValue, ConvertError> {
    let mut map = HostMap::new();
    for (name, value) in &s.fields {
        map.insert(name.clone(), from_guest(value)?);
    }
    Ok(HostValue::Map(map))
}

/// String-keyed map when every key is a string, pair list otherwise
fn dict_from_guest(dict: &Dict) -> Result<HostValue, ConvertError> {
    let items = dict.items();
    if items.iter().all(|(k, _)| matches!(k, Value::String(_))) {
        let mut map = HostMap::new();
        for (k, v) in &items {
            map.insert(k.to_str(), from_guest(v)?);
        }
        return Ok(HostValue::Map(map));
    }
    let pairs = items
        .iter()
        .map(|(k, v)| Ok((from_guest(k)?, from_guest(v)?)))
        .collect::<Result<_, ConvertError>>()?;
    Ok(HostValue::ValueMap(pairs))
}

/// Convert every entry of a guest environment
pub fn map_from_guest(env: &starbridge_vm::Env) -> Result<HostMap, ConvertError> {
    env.iter()
        .map(|(k, v)| Ok((k.clone(), from_guest(v)?)))
        .collect()
}

/// True only for a guest string with no characters
pub fn is_empty_string(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.is_empty())
}
