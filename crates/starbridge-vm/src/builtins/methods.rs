//! Method dispatch for built-in value types

use chrono::format::{Item, StrftimeItems};

use crate::builtins::{mapping, string, vector};
use crate::error::VmError;
use crate::thread::Thread;
use crate::value::{Args, NativeMethod, Value};

static TIME_METHODS: &[(&str, NativeMethod)] = &[("format", vm_time_format)];

fn table(value: &Value) -> &'static [(&'static str, NativeMethod)] {
    match value {
        Value::String(_) => string::METHODS,
        Value::List(_) => vector::METHODS,
        Value::Dict(_) => mapping::DICT_METHODS,
        Value::Set(_) => mapping::SET_METHODS,
        Value::Time(_) => TIME_METHODS,
        _ => &[],
    }
}

/// Method `name` of a built-in type, if it has one
pub fn lookup(value: &Value, name: &str) -> Option<NativeMethod> {
    table(value).iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
}

/// Method names of a built-in type
pub fn names(value: &Value) -> Vec<&'static str> {
    table(value).iter().map(|(n, _)| *n).collect()
}

/// time.format(layout) with strftime directives
pub fn vm_time_format(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [layout] = args.unpack("format", ["layout"])?;
    let (Value::Time(t), Value::String(layout)) = (recv, &layout) else {
        return Err(VmError::arg_type("format", "layout", "string", &layout));
    };
    let items: Vec<Item> = StrftimeItems::new(layout).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(VmError::runtime(format!("format: invalid layout {}", crate::value::quote(layout))));
    }
    Ok(Value::string(t.format_with_items(items.into_iter()).to_string()))
}
