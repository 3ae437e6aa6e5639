//! Base64 with the four RFC 4648 alphabets

use ::base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use ::base64::engine::GeneralPurpose;
use ::base64::Engine as _;
use starbridge_vm::builtins::registry::BuiltinRegistry;
use starbridge_vm::{Args, Env, Thread, Value, VmError};

use super::{module_env, opt_str_arg, str_arg};

pub const NAME: &str = "base64";

pub fn load() -> Result<Env, VmError> {
    let mut registry = BuiltinRegistry::new();
    registry.register("encode", vm_encode);
    registry.register("decode", vm_decode);
    module_env(NAME, registry)
}

fn engine(fname: &str, encoding: &Value) -> Result<&'static GeneralPurpose, VmError> {
    match opt_str_arg(fname, "encoding", encoding)?.unwrap_or("standard") {
        "standard" => Ok(&STANDARD),
        "standard_raw" => Ok(&STANDARD_NO_PAD),
        "url" => Ok(&URL_SAFE),
        "url_raw" => Ok(&URL_SAFE_NO_PAD),
        other => Err(VmError::runtime(format!("{fname}: unsupported encoding {other:?}"))),
    }
}

/// `encode(data, encoding="standard")`
fn vm_encode(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [data, encoding] = args.unpack("encode", ["data", "encoding?"])?;
    let engine = engine("encode", &encoding)?;
    Ok(Value::string(engine.encode(str_arg("encode", "data", &data)?)))
}

/// `decode(data, encoding="standard")`; the decoded bytes must be UTF-8
fn vm_decode(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [data, encoding] = args.unpack("decode", ["data", "encoding?"])?;
    let engine = engine("decode", &encoding)?;
    let bytes = engine
        .decode(str_arg("decode", "data", &data)?)
        .map_err(|e| VmError::runtime(format!("decode: {e}")))?;
    String::from_utf8(bytes)
        .map(Value::string)
        .map_err(|_| VmError::runtime("decode: result is not valid UTF-8"))
}
