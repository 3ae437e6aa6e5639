//! List methods
//!
//! Every mutating method goes through `List::mutate`, so frozen lists
//! reject them with a uniform message.

use crate::error::VmError;
use crate::thread::Thread;
use crate::value::{Args, List, NativeMethod, Value};

pub(crate) static METHODS: &[(&str, NativeMethod)] = &[
    ("append", vm_append),
    ("clear", vm_clear),
    ("extend", vm_extend),
    ("index", vm_index),
    ("insert", vm_insert),
    ("pop", vm_pop),
    ("remove", vm_remove),
];

fn list(recv: &Value) -> Result<&List, VmError> {
    match recv {
        Value::List(l) => Ok(l),
        other => Err(VmError::runtime(format!("want list, got {}", other.type_name()))),
    }
}

// ============================================================================
// Modification
// ============================================================================

pub fn vm_append(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("append", ["x"])?;
    list(recv)?.push(x)?;
    Ok(Value::None)
}

pub fn vm_extend(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [items] = args.unpack("extend", ["iterable"])?;
    let items = items.to_vec()?;
    list(recv)?.extend(items)?;
    Ok(Value::None)
}

pub fn vm_insert(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [index, x] = args.unpack("insert", ["index", "x"])?;
    let Value::Int(i) = index else {
        return Err(VmError::arg_type("insert", "index", "int", &index));
    };
    list(recv)?.mutate("insert into", |items| {
        let n = items.len() as i64;
        let at = if i < 0 { (i + n).max(0) } else { i.min(n) };
        items.insert(at as usize, x);
        Ok(())
    })?;
    Ok(Value::None)
}

pub fn vm_pop(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [index] = args.unpack("pop", ["i?"])?;
    list(recv)?.mutate("pop from", |items| {
        let n = items.len() as i64;
        let i = match index {
            Value::None => n - 1,
            Value::Int(i) if i < 0 => i + n,
            Value::Int(i) => i,
            other => return Err(VmError::arg_type("pop", "i", "int", &other)),
        };
        if i < 0 || i >= n {
            return Err(VmError::runtime(format!("pop: index {i} out of range [0:{n}]")));
        }
        Ok(items.remove(i as usize))
    })
}

pub fn vm_remove(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("remove", ["x"])?;
    let l = list(recv)?;
    let position = position_of(&l.snapshot(), &x)?;
    l.mutate("remove from", |items| match position {
        Some(i) if i < items.len() => {
            items.remove(i);
            Ok(Value::None)
        }
        _ => Err(VmError::runtime(format!("remove: element {} not found", x.repr()))),
    })
}

pub fn vm_clear(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    args.no_args("clear")?;
    list(recv)?.mutate("clear", |items| {
        items.clear();
        Ok(Value::None)
    })
}

// ============================================================================
// Query
// ============================================================================

fn position_of(items: &[Value], x: &Value) -> Result<Option<usize>, VmError> {
    for (i, item) in items.iter().enumerate() {
        if item.equals(x)? {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

pub fn vm_index(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("index", ["x"])?;
    position_of(&list(recv)?.snapshot(), &x)?
        .map(|i| Value::Int(i as i64))
        .ok_or_else(|| VmError::runtime(format!("index: value {} not in list", x.repr())))
}
