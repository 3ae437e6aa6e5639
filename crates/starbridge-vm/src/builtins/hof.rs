//! Higher-order and iteration built-ins
//!
//! - sorted, reversed: reorder an iterable
//! - enumerate, zip: build tuples from iterables
//! - min, max: extremes with an optional key function
//! - any, all: truthiness tests

use std::cmp::Ordering;

use crate::error::VmError;
use crate::thread::Thread;
use crate::value::{Args, Value};
use crate::vm::call;

fn iterable(fname: &str, value: &Value) -> Result<Vec<Value>, VmError> {
    value
        .to_vec()
        .map_err(|_| VmError::runtime(format!("{fname}: got {}, want iterable", value.type_name())))
}

/// Apply the optional key function to each item
fn keys_of(thread: &mut Thread, key: &Value, items: &[Value]) -> Result<Vec<Value>, VmError> {
    if key.is_none() {
        return Ok(items.to_vec());
    }
    items
        .iter()
        .map(|item| call(thread, key, Args::new(vec![item.clone()])))
        .collect()
}

/// Stable sort of `items` by `keys`, surfacing the first comparison error
fn sort_by_keys(items: Vec<Value>, keys: Vec<Value>, reverse: bool) -> Result<Vec<Value>, VmError> {
    let mut pairs: Vec<(Value, Value)> = keys.into_iter().zip(items).collect();
    let mut failure = None;
    pairs.sort_by(|(a, _), (b, _)| {
        if failure.is_some() {
            return Ordering::Equal;
        }
        let ord = if reverse { b.compare(a) } else { a.compare(b) };
        ord.unwrap_or_else(|err| {
            failure = Some(err);
            Ordering::Equal
        })
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(pairs.into_iter().map(|(_, item)| item).collect()),
    }
}

/// sorted(iterable, key=None, reverse=False)
pub fn vm_sorted(thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [items, key, reverse] = args.unpack("sorted", ["iterable", "key?", "reverse?"])?;
    let items = iterable("sorted", &items)?;
    let keys = keys_of(thread, &key, &items)?;
    Ok(Value::list(sort_by_keys(items, keys, reverse.truth())?))
}

pub fn vm_reversed(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [items] = args.unpack("reversed", ["sequence"])?;
    let mut items = iterable("reversed", &items)?;
    items.reverse();
    Ok(Value::list(items))
}

/// enumerate(iterable, start=0)
pub fn vm_enumerate(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [items, start] = args.unpack_opt("enumerate", ["iterable", "start?"])?;
    let items = iterable("enumerate", &items.unwrap_or_default())?;
    let start = match start {
        None => 0,
        Some(Value::Int(i)) => i,
        Some(other) => return Err(VmError::arg_type("enumerate", "start", "int", &other)),
    };
    let pairs = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| Value::tuple(vec![Value::Int(start + i as i64), item]))
        .collect();
    Ok(Value::list(pairs))
}

pub fn vm_zip(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    args.no_named("zip")?;
    let columns = args
        .positional
        .iter()
        .map(|v| iterable("zip", v))
        .collect::<Result<Vec<_>, _>>()?;
    let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
    let zipped = (0..rows)
        .map(|i| Value::tuple(columns.iter().map(|c| c[i].clone()).collect()))
        .collect();
    Ok(Value::list(zipped))
}

fn extreme(thread: &mut Thread, fname: &str, args: &Args, want: Ordering) -> Result<Value, VmError> {
    let mut key = Value::None;
    for (name, value) in &args.named {
        if name != "key" {
            return Err(VmError::runtime(format!("{fname}: unexpected keyword argument \"{name}\"")));
        }
        key = value.clone();
    }
    let items = match args.positional.as_slice() {
        [] => return Err(VmError::runtime(format!("{fname}: got 0 arguments, want at least 1"))),
        [single] => iterable(fname, single)?,
        many => many.to_vec(),
    };
    if items.is_empty() {
        return Err(VmError::runtime(format!("{fname}: argument is an empty sequence")));
    }
    let keys = keys_of(thread, &key, &items)?;
    let mut best = 0;
    for i in 1..items.len() {
        if keys[i].compare(&keys[best])? == want {
            best = i;
        }
    }
    Ok(items[best].clone())
}

/// min(iterable) or min(a, b, ...), with optional key=
pub fn vm_min(thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    extreme(thread, "min", args, Ordering::Less)
}

pub fn vm_max(thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    extreme(thread, "max", args, Ordering::Greater)
}

pub fn vm_any(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [items] = args.unpack("any", ["iterable"])?;
    Ok(Value::Bool(items.iterate()?.any(|v| v.truth())))
}

pub fn vm_all(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [items] = args.unpack("all", ["iterable"])?;
    Ok(Value::Bool(items.iterate()?.all(|v| v.truth())))
}
