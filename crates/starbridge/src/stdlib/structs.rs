//! `struct(**kwargs)`: immutable records

use indexmap::IndexMap;
use starbridge_vm::{Args, Env, Struct, Thread, Value, VmError};

pub const NAME: &str = "struct";

pub fn load() -> Result<Env, VmError> {
    let mut env = Env::new();
    env.insert(NAME.to_string(), Value::builtin(NAME, vm_struct));
    Ok(env)
}

fn vm_struct(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    if !args.positional.is_empty() {
        return Err(VmError::runtime(format!(
            "struct: unexpected positional arguments ({} given)",
            args.positional.len()
        )));
    }
    let fields: IndexMap<String, Value> = args.named.iter().cloned().collect();
    Ok(Struct::new(fields).into_value())
}
