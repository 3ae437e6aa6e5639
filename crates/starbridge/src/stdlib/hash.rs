//! SHA-2 digests as lowercase hex

use std::fmt::Write;

use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use starbridge_vm::builtins::registry::BuiltinRegistry;
use starbridge_vm::{Args, Env, Thread, Value, VmError};

use super::{module_env, str_arg};

pub const NAME: &str = "hash";

pub fn load() -> Result<Env, VmError> {
    let mut registry = BuiltinRegistry::new();
    registry.register("sha224", vm_sha224);
    registry.register("sha256", vm_sha256);
    registry.register("sha384", vm_sha384);
    registry.register("sha512", vm_sha512);
    module_env(NAME, registry)
}

fn digest<D: Digest>(fname: &str, args: &Args) -> Result<Value, VmError> {
    let [data] = args.unpack(fname, ["data"])?;
    let bytes = D::digest(str_arg(fname, "data", &data)?.as_bytes());
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes.iter() {
        // Writing to a String cannot fail
        let _ = write!(out, "{b:02x}");
    }
    Ok(Value::string(out))
}

fn vm_sha224(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    digest::<Sha224>("sha224", args)
}

fn vm_sha256(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    digest::<Sha256>("sha256", args)
}

fn vm_sha384(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    digest::<Sha384>("sha384", args)
}

fn vm_sha512(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    digest::<Sha512>("sha512", args)
}
