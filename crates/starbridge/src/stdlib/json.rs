//! JSON encoding and decoding

use starbridge_vm::builtins::registry::BuiltinRegistry;
use starbridge_vm::{Args, Env, Thread, Value, VmError};

use super::{int_arg, module_env, str_arg};
use crate::convert::{marshal_json, unmarshal_json};

pub const NAME: &str = "json";

pub fn load() -> Result<Env, VmError> {
    let mut registry = BuiltinRegistry::new();
    registry.register("encode", vm_encode);
    registry.register("decode", vm_decode);
    registry.register("indent", vm_indent);
    registry.register("dumps", vm_dumps);
    module_env(NAME, registry)
}

fn indent_arg(fname: &str, value: &Value, default: i64) -> Result<usize, VmError> {
    let indent = match value {
        Value::None => default,
        other => int_arg(fname, "indent", other)?,
    };
    usize::try_from(indent).map_err(|_| VmError::runtime(format!("{fname}: negative indent {indent}")))
}

fn encode(fname: &str, value: &Value, indent: usize) -> Result<Value, VmError> {
    marshal_json(value, indent)
        .map(Value::string)
        .map_err(|e| VmError::runtime(format!("{fname}: {e}")))
}

fn vm_encode(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("encode", ["x"])?;
    encode("encode", &x, 0)
}

/// `dumps(x, indent=0)`
fn vm_dumps(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x, indent] = args.unpack("dumps", ["x", "indent?"])?;
    encode("dumps", &x, indent_arg("dumps", &indent, 0)?)
}

fn vm_decode(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("decode", ["x"])?;
    unmarshal_json(str_arg("decode", "x", &x)?).map_err(|e| VmError::runtime(format!("decode: {e}")))
}

/// `indent(text, indent=2)`: re-format a JSON document
fn vm_indent(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [text, indent] = args.unpack("indent", ["text", "indent?"])?;
    let value = unmarshal_json(str_arg("indent", "text", &text)?).map_err(|e| VmError::runtime(format!("indent: {e}")))?;
    encode("indent", &value, indent_arg("indent", &indent, 2)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dumps_and_indent() {
        let mut thread = Thread::new("t");
        let decoded = vm_decode(&mut thread, &Args::new(vec![Value::string(r#"{"a": 1}"#)])).unwrap();
        let compact = vm_dumps(&mut thread, &Args::new(vec![decoded.clone()])).unwrap();
        assert_eq!(compact, Value::string(r#"{"a":1}"#));
        let pretty = vm_indent(&mut thread, &Args::new(vec![compact])).unwrap();
        assert_eq!(pretty, Value::string("{\n  \"a\": 1\n}"));
        assert!(vm_dumps(&mut thread, &Args::new(vec![decoded, Value::Int(-1)])).is_err());
    }
}
