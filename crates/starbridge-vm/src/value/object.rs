use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::VmError;
use crate::thread::Thread;
use crate::value::{Env, NativeMethod, Value, ValueIter};

/// Host-defined value kinds
///
/// Every method has a default so an implementation only provides the
/// operations its type supports.
pub trait Object: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &str;

    fn repr(&self) -> String {
        format!("<{}>", self.type_name())
    }

    fn truth(&self) -> bool {
        true
    }

    fn freeze(&self) {}

    /// Objects are unhashable unless they say otherwise
    fn hash(&self) -> Result<u64, VmError> {
        Err(VmError::runtime(format!("unhashable type: {}", self.type_name())))
    }

    /// Defaults to identity
    fn equals(&self, other: &dyn Object) -> Result<bool, VmError> {
        Ok(std::ptr::eq(
            self as *const Self as *const (),
            other as *const dyn Object as *const (),
        ))
    }

    fn len(&self) -> Option<usize> {
        None
    }

    fn get_index(&self, _key: &Value) -> Result<Value, VmError> {
        Err(VmError::runtime(format!("unhandled index operation {}[...]", self.type_name())))
    }

    fn set_index(&self, _key: Value, _value: Value) -> Result<(), VmError> {
        Err(VmError::runtime(format!(
            "{} value does not support item assignment",
            self.type_name()
        )))
    }

    /// Field lookup; methods go through `method`
    fn attr(&self, _name: &str) -> Result<Option<Value>, VmError> {
        Ok(None)
    }

    fn method(&self, _name: &str) -> Option<NativeMethod> {
        None
    }

    fn attr_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn iterate(&self) -> Option<Vec<Value>> {
        None
    }

    fn contains(&self, _value: &Value) -> Result<bool, VmError> {
        Err(VmError::runtime(format!("unknown binary op: in {}", self.type_name())))
    }

    /// Called when the object is invoked like a function
    fn call(&self, _thread: &mut Thread, _args: &crate::value::Args) -> Result<Value, VmError> {
        Err(VmError::runtime(format!(
            "invalid call of non-function ({})",
            self.type_name()
        )))
    }

    fn as_any(&self) -> &dyn Any;
}

/// A named collection of members, as produced by module loaders
#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub members: Env,
}

impl Module {
    pub fn new(name: impl Into<String>, members: Env) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Module(Arc::new(self))
    }
}

/// Immutable record with named fields
#[derive(Debug)]
pub struct Struct {
    /// Constructor name shown in `repr`
    pub name: String,
    pub fields: IndexMap<String, Value>,
}

impl Struct {
    pub fn new(fields: IndexMap<String, Value>) -> Self {
        Self {
            name: "struct".to_string(),
            fields,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Struct(Arc::new(self))
    }
}

/// Lazy integer sequence returned by `range`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    pub fn new(start: i64, stop: i64, step: i64) -> Result<Self, VmError> {
        if step == 0 {
            return Err(VmError::runtime("range: step argument must not be zero"));
        }
        Ok(Self { start, stop, step })
    }

    pub fn length(&self) -> usize {
        let (start, stop, step) = (self.start as i128, self.stop as i128, self.step as i128);
        let n = if step > 0 {
            (stop - start + step - 1) / step
        } else {
            (start - stop - step - 1) / -step
        };
        n.max(0) as usize
    }

    pub fn nth(&self, index: usize) -> i64 {
        self.start + self.step * index as i64
    }

    pub fn iter(&self) -> ValueIter {
        ValueIter::Range {
            next: self.start,
            stop: self.stop,
            step: self.step,
        }
    }
}

impl Object for Range {
    fn type_name(&self) -> &str {
        "range"
    }

    fn repr(&self) -> String {
        if self.step == 1 {
            format!("range({}, {})", self.start, self.stop)
        } else {
            format!("range({}, {}, {})", self.start, self.stop, self.step)
        }
    }

    fn truth(&self) -> bool {
        self.length() > 0
    }

    fn hash(&self) -> Result<u64, VmError> {
        Err(VmError::runtime("unhashable: range"))
    }

    fn equals(&self, other: &dyn Object) -> Result<bool, VmError> {
        let Some(other) = other.as_any().downcast_ref::<Range>() else {
            return Ok(false);
        };
        let (n, m) = (self.length(), other.length());
        Ok(n == m && (n == 0 || (self.start == other.start && (n == 1 || self.step == other.step))))
    }

    fn len(&self) -> Option<usize> {
        Some(self.length())
    }

    fn get_index(&self, key: &Value) -> Result<Value, VmError> {
        let len = self.length() as i64;
        let Some(mut i) = key.as_int() else {
            return Err(VmError::runtime(format!("range index: got {}, want int", key.type_name())));
        };
        if i < 0 {
            i += len;
        }
        if i < 0 || i >= len {
            return Err(VmError::runtime(format!("range index {i} out of range [0:{len}]")));
        }
        Ok(Value::Int(self.nth(i as usize)))
    }

    fn iterate(&self) -> Option<Vec<Value>> {
        Some(self.iter().collect())
    }

    fn contains(&self, value: &Value) -> Result<bool, VmError> {
        let Some(x) = value.as_int() else {
            return Ok(false);
        };
        let in_bounds = if self.step > 0 {
            x >= self.start && x < self.stop
        } else {
            x <= self.start && x > self.stop
        };
        Ok(in_bounds && (x - self.start) % self.step == 0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_length() {
        assert_eq!(Range::new(0, 10, 1).unwrap().length(), 10);
        assert_eq!(Range::new(0, 10, 3).unwrap().length(), 4);
        assert_eq!(Range::new(10, 0, -2).unwrap().length(), 5);
        assert_eq!(Range::new(5, 0, 1).unwrap().length(), 0);
        assert!(Range::new(0, 1, 0).is_err());
    }

    #[test]
    fn test_range_contains_and_index() {
        let r = Range::new(1, 10, 3).unwrap();
        assert!(r.contains(&Value::Int(7)).unwrap());
        assert!(!r.contains(&Value::Int(8)).unwrap());
        assert_eq!(r.get_index(&Value::Int(-1)).unwrap(), Value::Int(7));
    }
}
