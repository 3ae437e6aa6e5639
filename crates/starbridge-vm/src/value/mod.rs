//! Runtime value model
//!
//! Immutable values (strings, tuples, functions) are shared through `Arc`.
//! Mutable containers carry their own lock and a frozen flag; once a value
//! is frozen every mutating operation fails.

mod dict;
mod format;
mod function;
mod list;
mod object;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::error::VmError;

pub use dict::{Dict, Set};
pub use format::{format_float, percent_format, quote};
pub use function::{Args, Builtin, BuiltinFn, Function, NativeFn, NativeMethod};
pub use list::List;
pub use object::{Module, Object, Range, Struct};

/// Name to value mapping, ordered by insertion
pub type Env = IndexMap<String, Value>;

/// A guest value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Arc<str>),
    List(Arc<List>),
    Tuple(Arc<Vec<Value>>),
    Dict(Arc<Dict>),
    Set(Arc<Set>),
    Function(Arc<Function>),
    Builtin(Arc<Builtin>),
    Module(Arc<Module>),
    Struct(Arc<Struct>),
    Time(DateTime<Utc>),
    Object(Arc<dyn Object>),
}

/// Hashable projection of a value, used as dict and set key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    None,
    Bool(bool),
    /// Ints and integral floats share this variant so `1 == 1.0` as keys
    Int(i64),
    Float(u64),
    Str(Arc<str>),
    Tuple(Vec<HashKey>),
    Time(i64, u32),
    /// Values hashed by identity
    Identity(usize),
}

const MAX_DEPTH: usize = 64;

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(List::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Arc::new(items))
    }

    pub fn dict(dict: Dict) -> Self {
        Value::Dict(Arc::new(dict))
    }

    pub fn builtin(name: &str, func: NativeFn) -> Self {
        Value::Builtin(Arc::new(Builtin::native(name, func)))
    }

    pub fn object(object: impl Object + 'static) -> Self {
        Value::Object(Arc::new(object))
    }

    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Module(_) => "module",
            Value::Struct(_) => "struct",
            Value::Time(_) => "time.time",
            Value::Object(o) => o.type_name(),
        }
    }

    pub fn truth(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(l) => l.len() > 0,
            Value::Tuple(t) => !t.is_empty(),
            Value::Dict(d) => d.len() > 0,
            Value::Set(s) => s.len() > 0,
            Value::Object(o) => o.truth(),
            _ => true,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value of an int or float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Make the value and everything reachable from it immutable
    pub fn freeze(&self) {
        match self {
            Value::List(l) => l.freeze(),
            Value::Tuple(items) => items.iter().for_each(Value::freeze),
            Value::Dict(d) => d.freeze(),
            Value::Set(s) => s.freeze(),
            Value::Function(f) => f.freeze(),
            Value::Struct(s) => s.fields.values().for_each(Value::freeze),
            Value::Object(o) => o.freeze(),
            _ => {}
        }
    }

    pub fn hash_key(&self) -> Result<HashKey, VmError> {
        Ok(match self {
            Value::None => HashKey::None,
            Value::Bool(b) => HashKey::Bool(*b),
            Value::Int(i) => HashKey::Int(*i),
            Value::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    HashKey::Int(*f as i64)
                } else {
                    HashKey::Float(f.to_bits())
                }
            }
            Value::String(s) => HashKey::Str(s.clone()),
            Value::Tuple(items) => HashKey::Tuple(items.iter().map(Value::hash_key).collect::<Result<_, _>>()?),
            Value::Time(t) => HashKey::Time(t.timestamp(), t.timestamp_subsec_nanos()),
            Value::Function(f) => HashKey::Identity(Arc::as_ptr(f) as *const () as usize),
            Value::Builtin(b) => HashKey::Identity(Arc::as_ptr(b) as *const () as usize),
            Value::Module(m) => HashKey::Identity(Arc::as_ptr(m) as *const () as usize),
            Value::Struct(s) => {
                let mut parts = Vec::with_capacity(s.fields.len() * 2);
                for (name, value) in &s.fields {
                    parts.push(HashKey::Str(Arc::from(name.as_str())));
                    parts.push(value.hash_key()?);
                }
                HashKey::Tuple(parts)
            }
            Value::Object(o) => {
                o.hash()?;
                HashKey::Identity(Arc::as_ptr(o) as *const () as usize)
            }
            Value::List(_) | Value::Dict(_) | Value::Set(_) => {
                return Err(VmError::runtime(format!("unhashable type: {}", self.type_name())));
            }
        })
    }

    /// Number of elements, for values that have a length
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::List(l) => Some(l.len()),
            Value::Tuple(t) => Some(t.len()),
            Value::Dict(d) => Some(d.len()),
            Value::Set(s) => Some(s.len()),
            Value::Object(o) => o.len(),
            _ => None,
        }
    }

    /// Snapshot the elements of an iterable value
    pub fn iterate(&self) -> Result<ValueIter, VmError> {
        Ok(match self {
            Value::List(l) => ValueIter::Items(l.snapshot().into_iter()),
            Value::Tuple(t) => ValueIter::Items(t.as_ref().clone().into_iter()),
            Value::Dict(d) => ValueIter::Items(d.keys().into_iter()),
            Value::Set(s) => ValueIter::Items(s.values().into_iter()),
            Value::Object(o) => {
                if let Some(range) = o.as_any().downcast_ref::<Range>() {
                    return Ok(range.iter());
                }
                match o.iterate() {
                    Some(items) => ValueIter::Items(items.into_iter()),
                    None => return Err(not_iterable(self)),
                }
            }
            _ => return Err(not_iterable(self)),
        })
    }

    pub fn to_vec(&self) -> Result<Vec<Value>, VmError> {
        Ok(self.iterate()?.collect())
    }

    pub fn equals(&self, other: &Value) -> Result<bool, VmError> {
        self.equals_depth(other, 0)
    }

    fn equals_depth(&self, other: &Value, depth: usize) -> Result<bool, VmError> {
        if depth > MAX_DEPTH {
            return Err(VmError::runtime("comparison exceeded maximum recursion depth"));
        }
        let seq_eq = |a: &[Value], b: &[Value]| -> Result<bool, VmError> {
            if a.len() != b.len() {
                return Ok(false);
            }
            for (x, y) in a.iter().zip(b) {
                if !x.equals_depth(y, depth + 1)? {
                    return Ok(false);
                }
            }
            Ok(true)
        };
        Ok(match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.compare_numbers(other) == Some(Ordering::Equal)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Arc::ptr_eq(a, b) || seq_eq(&a.snapshot(), &b.snapshot())?
            }
            (Value::Tuple(a), Value::Tuple(b)) => seq_eq(a, b)?,
            (Value::Dict(a), Value::Dict(b)) => {
                if Arc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let (a, b) = (a.items(), b.entries_by_key());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (k, v) in a {
                    match b.get(&k.hash_key()?) {
                        Some(other) if v.equals_depth(other, depth + 1)? => {}
                        _ => return Ok(false),
                    }
                }
                true
            }
            (Value::Set(a), Value::Set(b)) => {
                let (a, b) = (a.keys(), b.keys());
                a.len() == b.len() && a.iter().all(|k| b.contains(k))
            }
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => {
                Arc::ptr_eq(a, b) || (a.name() == b.name() && a.receiver().is_none() && b.receiver().is_none())
            }
            (Value::Module(a), Value::Module(b)) => Arc::ptr_eq(a, b),
            (Value::Struct(a), Value::Struct(b)) => {
                if a.fields.len() != b.fields.len() {
                    return Ok(false);
                }
                for (name, x) in &a.fields {
                    match b.fields.get(name) {
                        Some(y) if x.equals_depth(y, depth + 1)? => {}
                        _ => return Ok(false),
                    }
                }
                true
            }
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.equals(b.as_ref())?,
            _ => false,
        })
    }

    fn compare_numbers(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    /// Ordering for `<`, `sorted`, `min`, `max`
    pub fn compare(&self, other: &Value) -> Result<Ordering, VmError> {
        let unsupported = || {
            VmError::runtime(format!(
                "unsupported comparison: {} < {}",
                self.type_name(),
                other.type_name()
            ))
        };
        match (self, other) {
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                // NaN sorts after every other number
                Ok(self.compare_numbers(other).unwrap_or_else(|| {
                    let a_nan = self.as_float().map_or(false, f64::is_nan);
                    let b_nan = other.as_float().map_or(false, f64::is_nan);
                    a_nan.cmp(&b_nan)
                }))
            }
            (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) => compare_seq(&a.snapshot(), &b.snapshot()),
            (Value::Tuple(a), Value::Tuple(b)) => compare_seq(a, b),
            _ => Err(unsupported()),
        }
    }

    /// `repr()` form
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, 0);
        out
    }

    /// `str()` form: strings unquoted, everything else as `repr`
    pub fn to_str(&self) -> String {
        match self {
            Value::String(s) => s.to_string(),
            _ => self.repr(),
        }
    }

    fn write_repr(&self, out: &mut String, depth: usize) {
        if depth > MAX_DEPTH {
            out.push_str("...");
            return;
        }
        let seq = |out: &mut String, items: &[Value]| {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                item.write_repr(out, depth + 1);
            }
        };
        match self {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(i) => out.push_str(&i.to_string()),
            Value::Float(f) => out.push_str(&format_float(*f)),
            Value::String(s) => out.push_str(&quote(s)),
            Value::List(l) => {
                out.push('[');
                seq(out, &l.snapshot());
                out.push(']');
            }
            Value::Tuple(items) => {
                out.push('(');
                seq(out, items);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Value::Dict(d) => {
                out.push('{');
                for (i, (k, v)) in d.items().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    k.write_repr(out, depth + 1);
                    out.push_str(": ");
                    v.write_repr(out, depth + 1);
                }
                out.push('}');
            }
            Value::Set(s) => {
                out.push_str("set([");
                seq(out, &s.values());
                out.push_str("])");
            }
            Value::Function(f) => out.push_str(&format!("<function {}>", f.name())),
            Value::Builtin(b) => match b.receiver() {
                Some(recv) => out.push_str(&format!("<built-in method {} of {} value>", b.name(), recv.type_name())),
                None => out.push_str(&format!("<built-in function {}>", b.name())),
            },
            Value::Module(m) => out.push_str(&format!("<module {:?}>", m.name)),
            Value::Struct(s) => {
                out.push_str(&s.name);
                out.push('(');
                for (i, (name, value)) in s.fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(name);
                    out.push_str(" = ");
                    value.write_repr(out, depth + 1);
                }
                out.push(')');
            }
            Value::Time(t) => out.push_str(&t.format("%Y-%m-%d %H:%M:%S%.f %z UTC").to_string()),
            Value::Object(o) => out.push_str(&o.repr()),
        }
    }
}

fn compare_seq(a: &[Value], b: &[Value]) -> Result<Ordering, VmError> {
    for (x, y) in a.iter().zip(b) {
        if !x.equals(y)? {
            return x.compare(y);
        }
    }
    Ok(a.len().cmp(&b.len()))
}

fn not_iterable(value: &Value) -> VmError {
    VmError::runtime(format!("{} is not iterable", value.type_name()))
}

/// Iterator over the elements of an iterable value
pub enum ValueIter {
    Items(std::vec::IntoIter<Value>),
    Range { next: i64, stop: i64, step: i64 },
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ValueIter::Items(items) => items.next(),
            ValueIter::Range { next, stop, step } => {
                let done = if *step > 0 { *next >= *stop } else { *next <= *stop };
                if done {
                    return None;
                }
                let current = *next;
                match next.checked_add(*step) {
                    Some(n) => *next = n,
                    None => *next = *stop,
                }
                Some(Value::Int(current))
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other).unwrap_or(false)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}
