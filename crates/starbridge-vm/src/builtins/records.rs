//! Container constructors: list, tuple, dict, set, range

use std::sync::Arc;

use crate::error::VmError;
use crate::thread::Thread;
use crate::value::{Args, Dict, Range, Set, Value};

fn items_of(fname: &str, value: Option<&Value>) -> Result<Vec<Value>, VmError> {
    match value {
        None => Ok(Vec::new()),
        Some(v) => v
            .to_vec()
            .map_err(|_| VmError::runtime(format!("{fname}: got {}, want iterable", v.type_name()))),
    }
}

pub fn vm_list(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let args = args.positional_range("list", 0, 1)?;
    Ok(Value::list(items_of("list", args.first())?))
}

pub fn vm_tuple(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let args = args.positional_range("tuple", 0, 1)?;
    match args.first() {
        Some(t @ Value::Tuple(_)) => Ok(t.clone()),
        other => Ok(Value::tuple(items_of("tuple", other)?)),
    }
}

pub fn vm_set(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let args = args.positional_range("set", 0, 1)?;
    let set = Set::from_values(items_of("set", args.first())?)?;
    Ok(Value::Set(Arc::new(set)))
}

/// dict(pairs_or_mapping?, **kwargs)
pub fn vm_dict(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    if args.positional.len() > 1 {
        return Err(VmError::runtime(format!(
            "dict: got {} arguments, want at most 1",
            args.positional.len()
        )));
    }
    let dict = Dict::new();
    if let Some(source) = args.positional.first() {
        update_dict("dict", &dict, source)?;
    }
    for (name, value) in &args.named {
        dict.insert(Value::string(name), value.clone())?;
    }
    Ok(Value::dict(dict))
}

/// Merge a mapping or an iterable of pairs into `dict`
pub(crate) fn update_dict(fname: &str, dict: &Dict, source: &Value) -> Result<(), VmError> {
    if let Value::Dict(other) = source {
        for (k, v) in other.items() {
            dict.insert(k, v)?;
        }
        return Ok(());
    }
    let items = source
        .to_vec()
        .map_err(|_| VmError::runtime(format!("{fname}: got {}, want iterable", source.type_name())))?;
    for (i, item) in items.into_iter().enumerate() {
        let pair = item.to_vec().map_err(|_| {
            VmError::runtime(format!("{fname}: cannot convert dictionary update sequence element #{i} to a sequence"))
        })?;
        let [k, v]: [Value; 2] = pair.try_into().map_err(|p: Vec<Value>| {
            VmError::runtime(format!("{fname}: dictionary update sequence element #{i} has length {}, want 2", p.len()))
        })?;
        dict.insert(k, v)?;
    }
    Ok(())
}

/// range(stop) or range(start, stop, step=1)
pub fn vm_range(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let args = args.positional_range("range", 1, 3)?;
    let mut ints = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        match arg {
            Value::Int(n) => ints.push(*n),
            other => {
                let param = ["start_or_stop", "stop", "step"][i];
                return Err(VmError::arg_type("range", param, "int", other));
            }
        }
    }
    let range = match ints.as_slice() {
        [stop] => Range::new(0, *stop, 1)?,
        [start, stop] => Range::new(*start, *stop, 1)?,
        [start, stop, step] => Range::new(*start, *stop, *step)?,
        _ => return Err(VmError::runtime("range: got 0 arguments, want 1-3")),
    };
    Ok(Value::object(range))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dict_from_pairs_and_kwargs() {
        let pairs = Value::list(vec![Value::tuple(vec![Value::string("a"), Value::Int(1)])]);
        let args = Args::with_named(vec![pairs], vec![("b".into(), Value::Int(2))]);
        let d = vm_dict(&mut Thread::new("t"), &args).unwrap();
        assert_eq!(d.repr(), "{\"a\": 1, \"b\": 2}");
    }

    #[test]
    fn test_dict_bad_pair() {
        let pairs = Value::list(vec![Value::tuple(vec![Value::Int(1)])]);
        let err = vm_dict(&mut Thread::new("t"), &Args::new(vec![pairs])).unwrap_err();
        assert!(err.message.contains("has length 1, want 2"));
    }

    #[test]
    fn test_range_forms() {
        let r = vm_range(&mut Thread::new("t"), &Args::new(vec![Value::Int(3)])).unwrap();
        assert_eq!(r.to_vec().unwrap(), vec![Value::Int(0), Value::Int(1), Value::Int(2)]);
        let err = vm_range(&mut Thread::new("t"), &Args::new(vec![Value::Int(0), Value::Int(3), Value::Int(0)]));
        assert!(err.is_err());
    }
}
