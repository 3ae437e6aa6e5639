//! Mapping value shared between guest threads
//!
//! Reads take the shared lock, writes and the mutating methods take the
//! exclusive lock for their whole duration. `perform` runs a guest callable
//! against the underlying dict while holding the exclusive lock, so the
//! callable must not touch the same shared dict through another path.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use starbridge_vm::{Args, Dict, NativeMethod, Object, Thread, Value, VmError};

use super::{marshal_json, unmarshal_json, MarshalGuest};

const TYPE_NAME: &str = "shared_dict";

static METHODS: &[(&str, NativeMethod)] = &[
    ("from_json", vm_from_json),
    ("len", vm_len),
    ("perform", vm_perform),
    ("to_json", vm_to_json),
];

struct Inner {
    lock: RwLock<()>,
    dict: Arc<Dict>,
    frozen: AtomicBool,
}

/// Handle to a lock-guarded guest mapping; clones share the mapping
#[derive(Clone)]
pub struct SharedDict {
    inner: Arc<Inner>,
}

impl Default for SharedDict {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDict")
            .field("len", &self.inner.dict.len())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

impl SharedDict {
    pub fn new() -> Self {
        Self::from_dict(Dict::new())
    }

    pub fn from_dict(dict: Dict) -> Self {
        Self {
            inner: Arc::new(Inner {
                lock: RwLock::new(()),
                dict: Arc::new(dict),
                frozen: AtomicBool::new(false),
            }),
        }
    }

    /// The underlying dict
    pub fn underlying(&self) -> Arc<Dict> {
        self.inner.dict.clone()
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        let _guard = self.inner.lock.read();
        self.inner.dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &Value) -> Result<Option<Value>, VmError> {
        let _guard = self.inner.lock.read();
        self.inner.dict.get(key)
    }

    pub fn set(&self, key: Value, value: Value) -> Result<(), VmError> {
        if let Value::Object(o) = &value {
            if self.is_same(o.as_ref()) {
                return Err(VmError::runtime(format!(
                    "unsupported value: cannot insert {TYPE_NAME} into itself"
                )));
            }
        }
        let _guard = self.inner.lock.write();
        self.check_mutable("insert into")?;
        self.inner.dict.insert(key, value)
    }

    fn check_mutable(&self, op: &str) -> Result<(), VmError> {
        if self.is_frozen() {
            return Err(VmError::runtime(format!("cannot {op} frozen {TYPE_NAME}")));
        }
        Ok(())
    }

    fn is_same(&self, other: &dyn Object) -> bool {
        other
            .as_any()
            .downcast_ref::<SharedDict>()
            .is_some_and(|o| Arc::ptr_eq(&o.inner, &self.inner))
    }

    fn address(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Call `f` with the underlying dict under the exclusive lock
    pub fn perform(&self, thread: &mut Thread, f: &Value) -> Result<Value, VmError> {
        let _guard = self.inner.lock.write();
        starbridge_vm::call(thread, f, Args::new(vec![Value::Dict(self.inner.dict.clone())]))
    }

    pub fn to_json(&self) -> Result<String, VmError> {
        let _guard = self.inner.lock.read();
        marshal_json(&Value::Dict(self.inner.dict.clone()), 0).map_err(|e| VmError::runtime(e.to_string()))
    }

    /// Decode a JSON object and merge it in; returns the decoded dict
    pub fn from_json(&self, text: &str) -> Result<Value, VmError> {
        let decoded = unmarshal_json(text).map_err(|e| VmError::runtime(format!("from_json: {e}")))?;
        let Value::Dict(entries) = &decoded else {
            return Err(VmError::runtime(format!(
                "from_json: got {}, want dict",
                decoded.type_name()
            )));
        };
        let _guard = self.inner.lock.write();
        self.check_mutable("insert into")?;
        for (k, v) in entries.items() {
            self.inner.dict.insert(k, v)?;
        }
        Ok(decoded)
    }
}

fn receiver(recv: &Value) -> Result<&SharedDict, VmError> {
    match recv {
        Value::Object(o) => o
            .as_any()
            .downcast_ref::<SharedDict>()
            .ok_or_else(|| VmError::runtime(format!("want {TYPE_NAME}, got {}", o.type_name()))),
        other => Err(VmError::runtime(format!("want {TYPE_NAME}, got {}", other.type_name()))),
    }
}

fn vm_len(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    args.no_args("len")?;
    Ok(Value::Int(receiver(recv)?.len() as i64))
}

fn vm_perform(thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [f] = args.unpack("perform", ["fn"])?;
    if !matches!(f, Value::Function(_) | Value::Builtin(_)) {
        return Err(VmError::arg_type("perform", "fn", "callable", &f));
    }
    receiver(recv)?.perform(thread, &f)
}

fn vm_to_json(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    args.no_args("to_json")?;
    Ok(Value::string(receiver(recv)?.to_json()?))
}

fn vm_from_json(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [text] = args.unpack("from_json", ["x"])?;
    let Value::String(text) = &text else {
        return Err(VmError::arg_type("from_json", "x", "string", &text));
    };
    receiver(recv)?.from_json(text)
}

impl Object for SharedDict {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn repr(&self) -> String {
        let _guard = self.inner.lock.read();
        format!("{TYPE_NAME}({})", Value::Dict(self.inner.dict.clone()).repr())
    }

    fn truth(&self) -> bool {
        !self.is_empty()
    }

    fn freeze(&self) {
        let _guard = self.inner.lock.write();
        self.inner.frozen.store(true, Ordering::Release);
        self.inner.dict.freeze();
    }

    /// Same object, or both empty, or equal contents
    fn equals(&self, other: &dyn Object) -> Result<bool, VmError> {
        let Some(other) = other.as_any().downcast_ref::<SharedDict>() else {
            return Ok(false);
        };
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return Ok(true);
        }
        // Lock in address order
        let (first, second) = if self.address() < other.address() {
            (self, other)
        } else {
            (other, self)
        };
        let _a = first.inner.lock.read();
        let _b = second.inner.lock.read();
        let (a, b) = (&self.inner.dict, &other.inner.dict);
        if a.is_empty() && b.is_empty() {
            return Ok(true);
        }
        Value::Dict(a.clone()).equals(&Value::Dict(b.clone()))
    }

    fn len(&self) -> Option<usize> {
        Some(SharedDict::len(self))
    }

    fn get_index(&self, key: &Value) -> Result<Value, VmError> {
        self.get(key)?
            .ok_or_else(|| VmError::runtime(format!("key {} not in {TYPE_NAME}", key.repr())))
    }

    fn set_index(&self, key: Value, value: Value) -> Result<(), VmError> {
        self.set(key, value)
    }

    fn method(&self, name: &str) -> Option<NativeMethod> {
        METHODS.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
    }

    fn attr_names(&self) -> Vec<String> {
        METHODS.iter().map(|(n, _)| n.to_string()).collect()
    }

    fn iterate(&self) -> Option<Vec<Value>> {
        let _guard = self.inner.lock.read();
        Some(self.inner.dict.keys())
    }

    fn contains(&self, value: &Value) -> Result<bool, VmError> {
        let _guard = self.inner.lock.read();
        self.inner.dict.contains(value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl MarshalGuest for SharedDict {
    fn marshal_guest(&self) -> anyhow::Result<Value> {
        Ok(Value::object(self.clone()))
    }

    fn type_name(&self) -> &str {
        TYPE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn value(d: &SharedDict) -> Value {
        Value::object(d.clone())
    }

    #[test]
    fn test_get_set_and_len() {
        let d = SharedDict::new();
        d.set(Value::string("k"), Value::Int(1)).unwrap();
        assert_eq!(d.get(&Value::string("k")).unwrap(), Some(Value::Int(1)));
        assert_eq!(d.len(), 1);
        assert!(value(&d).truth());
    }

    #[test]
    fn test_freeze_rejects_writes() {
        let d = SharedDict::new();
        d.set(Value::string("k"), Value::Int(1)).unwrap();
        value(&d).freeze();
        let err = d.set(Value::string("k"), Value::Int(2)).unwrap_err();
        assert_eq!(err.message, "cannot insert into frozen shared_dict");
        assert_eq!(d.get(&Value::string("k")).unwrap(), Some(Value::Int(1)));
        assert!(d.from_json(r#"{"x": 1}"#).is_err());
    }

    #[test]
    fn test_rejects_self_insertion() {
        let d = SharedDict::new();
        let err = d.set(Value::string("me"), value(&d)).unwrap_err();
        assert!(err.message.contains("into itself"));
        // A different shared dict is fine
        d.set(Value::string("other"), value(&SharedDict::new())).unwrap();
    }

    #[test]
    fn test_unhashable() {
        assert!(value(&SharedDict::new()).hash_key().is_err());
    }

    #[test]
    fn test_equality() {
        let a = SharedDict::new();
        let b = SharedDict::new();
        assert!(value(&a).equals(&value(&b)).unwrap());
        a.set(Value::string("k"), Value::Int(1)).unwrap();
        assert!(!value(&a).equals(&value(&b)).unwrap());
        b.set(Value::string("k"), Value::Int(1)).unwrap();
        assert!(value(&a).equals(&value(&b)).unwrap());
        assert!(!value(&a).equals(&Value::Int(1)).unwrap());
    }

    #[test]
    fn test_json_bridge() {
        let d = SharedDict::new();
        let decoded = d.from_json(r#"{"a": 1, "b": [true]}"#).unwrap();
        assert_eq!(decoded.repr(), r#"{"a": 1, "b": [True]}"#);
        assert_eq!(d.to_json().unwrap(), r#"{"a":1,"b":[true]}"#);
        assert!(d.from_json("[1]").is_err());
    }

    #[test]
    fn test_perform_sees_underlying_dict() {
        let d = SharedDict::new();
        d.set(Value::string("k"), Value::Int(7)).unwrap();
        let f = Value::builtin("first_value", |_, args| {
            let [m] = args.unpack("first_value", ["m"])?;
            let Value::Dict(m) = m else {
                return Err(VmError::runtime("want dict"));
            };
            Ok(m.values().into_iter().next().unwrap_or_default())
        });
        let out = d.perform(&mut Thread::new("t"), &f).unwrap();
        assert_eq!(out, Value::Int(7));
    }

    #[test]
    fn test_concurrent_writers() {
        let d = SharedDict::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let d = d.clone();
                thread::spawn(move || {
                    for j in 0..100 {
                        d.set(Value::Int(i * 1000 + j), Value::Int(j)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(d.len(), 800);
    }
}
