//! Dict and set methods

use std::sync::Arc;

use crate::builtins::records::update_dict;
use crate::error::VmError;
use crate::thread::Thread;
use crate::value::{Args, Dict, NativeMethod, Set, Value};

pub(crate) static DICT_METHODS: &[(&str, NativeMethod)] = &[
    ("clear", vm_dict_clear),
    ("get", vm_dict_get),
    ("items", vm_dict_items),
    ("keys", vm_dict_keys),
    ("pop", vm_dict_pop),
    ("popitem", vm_dict_popitem),
    ("setdefault", vm_dict_setdefault),
    ("update", vm_dict_update),
    ("values", vm_dict_values),
];

pub(crate) static SET_METHODS: &[(&str, NativeMethod)] = &[
    ("add", vm_set_add),
    ("clear", vm_set_clear),
    ("difference", vm_set_difference),
    ("discard", vm_set_discard),
    ("intersection", vm_set_intersection),
    ("issubset", vm_set_issubset),
    ("issuperset", vm_set_issuperset),
    ("pop", vm_set_pop),
    ("remove", vm_set_remove),
    ("symmetric_difference", vm_set_symmetric_difference),
    ("union", vm_set_union),
];

fn dict(recv: &Value) -> Result<&Dict, VmError> {
    match recv {
        Value::Dict(d) => Ok(d),
        other => Err(VmError::runtime(format!("want dict, got {}", other.type_name()))),
    }
}

fn set(recv: &Value) -> Result<&Set, VmError> {
    match recv {
        Value::Set(s) => Ok(s),
        other => Err(VmError::runtime(format!("want set, got {}", other.type_name()))),
    }
}

// ============================================================================
// Dict
// ============================================================================

pub fn vm_dict_get(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [key, default] = args.unpack("get", ["key", "default?"])?;
    Ok(dict(recv)?.get(&key)?.unwrap_or(default))
}

pub fn vm_dict_keys(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    args.no_args("keys")?;
    Ok(Value::list(dict(recv)?.keys()))
}

pub fn vm_dict_values(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    args.no_args("values")?;
    Ok(Value::list(dict(recv)?.values()))
}

pub fn vm_dict_items(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    args.no_args("items")?;
    let items = dict(recv)?
        .items()
        .into_iter()
        .map(|(k, v)| Value::tuple(vec![k, v]))
        .collect();
    Ok(Value::list(items))
}

pub fn vm_dict_pop(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [key, default] = args.unpack_opt("pop", ["key", "default?"])?;
    let key = key.unwrap_or_default();
    match (dict(recv)?.remove(&key)?, default) {
        (Some(value), _) => Ok(value),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(VmError::runtime(format!("pop: missing key {}", key.repr()))),
    }
}

pub fn vm_dict_popitem(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    args.no_args("popitem")?;
    dict(recv)?
        .pop_first()?
        .map(|(k, v)| Value::tuple(vec![k, v]))
        .ok_or_else(|| VmError::runtime("popitem: empty dict"))
}

pub fn vm_dict_setdefault(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [key, default] = args.unpack("setdefault", ["key", "default?"])?;
    let d = dict(recv)?;
    if let Some(existing) = d.get(&key)? {
        return Ok(existing);
    }
    d.insert(key, default.clone())?;
    Ok(default)
}

pub fn vm_dict_update(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    if args.positional.len() > 1 {
        return Err(VmError::runtime(format!(
            "update: got {} arguments, want at most 1",
            args.positional.len()
        )));
    }
    let d = dict(recv)?;
    d.check_mutable("insert into")?;
    if let Some(source) = args.positional.first() {
        update_dict("update", d, source)?;
    }
    for (name, value) in &args.named {
        d.insert(Value::string(name), value.clone())?;
    }
    Ok(Value::None)
}

pub fn vm_dict_clear(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    args.no_args("clear")?;
    dict(recv)?.clear()?;
    Ok(Value::None)
}

// ============================================================================
// Set
// ============================================================================

fn other_values(fname: &str, args: &Args) -> Result<Vec<Value>, VmError> {
    let [other] = args.unpack(fname, ["other"])?;
    other
        .to_vec()
        .map_err(|_| VmError::runtime(format!("{fname}: got {}, want iterable", other.type_name())))
}

fn new_set(values: impl IntoIterator<Item = Value>) -> Result<Value, VmError> {
    Ok(Value::Set(Arc::new(Set::from_values(values)?)))
}

pub fn vm_set_add(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("add", ["x"])?;
    set(recv)?.insert(x)?;
    Ok(Value::None)
}

pub fn vm_set_remove(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("remove", ["x"])?;
    if !set(recv)?.remove(&x)? {
        return Err(VmError::runtime(format!("remove: missing key {}", x.repr())));
    }
    Ok(Value::None)
}

pub fn vm_set_discard(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("discard", ["x"])?;
    set(recv)?.remove(&x)?;
    Ok(Value::None)
}

pub fn vm_set_pop(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    args.no_args("pop")?;
    set(recv)?
        .pop_first()?
        .ok_or_else(|| VmError::runtime("pop: empty set"))
}

pub fn vm_set_clear(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    args.no_args("clear")?;
    set(recv)?.clear()?;
    Ok(Value::None)
}

pub fn vm_set_union(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let other = other_values("union", args)?;
    new_set(set(recv)?.values().into_iter().chain(other))
}

pub fn vm_set_intersection(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let other = Set::from_values(other_values("intersection", args)?)?;
    let mut kept = Vec::new();
    for v in set(recv)?.values() {
        if other.contains(&v)? {
            kept.push(v);
        }
    }
    new_set(kept)
}

pub fn vm_set_difference(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let other = Set::from_values(other_values("difference", args)?)?;
    let mut kept = Vec::new();
    for v in set(recv)?.values() {
        if !other.contains(&v)? {
            kept.push(v);
        }
    }
    new_set(kept)
}

pub fn vm_set_symmetric_difference(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let this = set(recv)?;
    let other = Set::from_values(other_values("symmetric_difference", args)?)?;
    let mut kept = Vec::new();
    for v in this.values() {
        if !other.contains(&v)? {
            kept.push(v);
        }
    }
    for v in other.values() {
        if !this.contains(&v)? {
            kept.push(v);
        }
    }
    new_set(kept)
}

pub fn vm_set_issubset(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let other = Set::from_values(other_values("issubset", args)?)?;
    let keys = other.keys();
    Ok(Value::Bool(set(recv)?.keys().iter().all(|k| keys.contains(k))))
}

pub fn vm_set_issuperset(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let other = Set::from_values(other_values("issuperset", args)?)?;
    let keys = set(recv)?.keys();
    Ok(Value::Bool(other.keys().iter().all(|k| keys.contains(k))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(pairs: &[(&str, i64)]) -> Value {
        Value::dict(Dict::from_pairs(pairs.iter().map(|(k, v)| (Value::string(k), Value::Int(*v)))).unwrap())
    }

    #[test]
    fn test_get_and_setdefault() {
        let mut thread = Thread::new("t");
        let m = d(&[("a", 1)]);
        let got = vm_dict_get(&mut thread, &m, &Args::new(vec![Value::string("z"), Value::Int(0)])).unwrap();
        assert_eq!(got, Value::Int(0));
        vm_dict_setdefault(&mut thread, &m, &Args::new(vec![Value::string("b"), Value::Int(5)])).unwrap();
        assert_eq!(m.repr(), "{\"a\": 1, \"b\": 5}");
    }

    #[test]
    fn test_pop_missing_key() {
        let err = vm_dict_pop(&mut Thread::new("t"), &d(&[]), &Args::new(vec![Value::string("x")])).unwrap_err();
        assert_eq!(err.message, "pop: missing key \"x\"");
    }

    #[test]
    fn test_frozen_update() {
        let m = d(&[("a", 1)]);
        m.freeze();
        let err = vm_dict_update(&mut Thread::new("t"), &m, &Args::new(vec![d(&[("b", 2)])])).unwrap_err();
        assert_eq!(err.message, "cannot insert into frozen dict");
    }

    #[test]
    fn test_set_relations() {
        let mut thread = Thread::new("t");
        let s = new_set(vec![Value::Int(1), Value::Int(2)]).unwrap();
        let sup = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(vm_set_issubset(&mut thread, &s, &Args::new(vec![sup])).unwrap(), Value::Bool(true));
        let u = vm_set_union(&mut thread, &s, &Args::new(vec![Value::list(vec![Value::Int(3)])])).unwrap();
        assert_eq!(u.len(), Some(3));
    }
}
