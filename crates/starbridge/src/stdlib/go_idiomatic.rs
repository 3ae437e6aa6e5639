//! Go-flavoured helpers: `nil`, integer formatting, `sleep`, `exit`

use std::time::{Duration, Instant};

use starbridge_vm::builtins::registry::BuiltinRegistry;
use starbridge_vm::{Args, Dict, Env, Thread, Value, VmError};

use super::{float_arg, int_arg, module_env};
use crate::convert::SharedDict;

pub const NAME: &str = "go_idiomatic";

/// Longest uninterrupted wait inside `sleep`
const SLEEP_SLICE: Duration = Duration::from_millis(10);

pub fn load() -> Result<Env, VmError> {
    let mut registry = BuiltinRegistry::new();

    registry.constant("true", Value::Bool(true));
    registry.constant("false", Value::Bool(false));
    registry.constant("nil", Value::None);

    registry.register("is_nil", vm_is_nil);
    registry.register("hex", vm_hex);
    registry.register("oct", vm_oct);
    registry.register("bin", vm_bin);
    registry.register("sleep", vm_sleep);
    registry.register("exit", vm_exit);
    registry.register("quit", vm_exit);
    registry.register("length", vm_length);
    registry.register("sum", vm_sum);
    registry.register("shared_dict", vm_shared_dict);

    module_env(NAME, registry)
}

fn vm_is_nil(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("is_nil", ["x"])?;
    Ok(Value::Bool(x.is_none()))
}

// ============================================================================
// Integer formatting
// ============================================================================

fn radix(fname: &str, args: &Args, prefix: &str, format: fn(u64) -> String) -> Result<Value, VmError> {
    let [x] = args.unpack(fname, ["x"])?;
    let x = int_arg(fname, "x", &x)?;
    let sign = if x < 0 { "-" } else { "" };
    Ok(Value::string(format!("{sign}{prefix}{}", format(x.unsigned_abs()))))
}

fn vm_hex(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    radix("hex", args, "0x", |n| format!("{n:x}"))
}

fn vm_oct(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    radix("oct", args, "0o", |n| format!("{n:o}"))
}

fn vm_bin(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    radix("bin", args, "0b", |n| format!("{n:b}"))
}

// ============================================================================
// Control
// ============================================================================

/// Sleep for `secs`, waking early with an error when the run is cancelled
fn vm_sleep(thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [secs] = args.unpack("sleep", ["secs"])?;
    let secs = float_arg("sleep", "secs", &secs)?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(VmError::runtime(format!("sleep: invalid duration {secs}")));
    }
    let deadline = Instant::now() + Duration::from_secs_f64(secs);
    let token = thread.cancellation_token();
    loop {
        thread.check_cancelled()?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(Value::None);
        }
        let slice = (deadline - now).min(SLEEP_SLICE);
        match &token {
            Some(token) => {
                if let Some(reason) = token.wait_timeout(slice) {
                    return Err(VmError::cancelled(reason));
                }
            }
            None => std::thread::sleep(slice),
        }
    }
}

/// `exit(code=0)`: record the code and unwind the run
fn vm_exit(thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [code] = args.unpack("exit", ["code?"])?;
    let code = match code {
        Value::None => 0,
        other => int_arg("exit", "code", &other)?,
    };
    let code = u8::try_from(code).map_err(|_| VmError::runtime(format!("exit: code {code} out of range [0, 255]")))?;
    thread.set_exit_code(code);
    Err(VmError::exit(code))
}

// ============================================================================
// Collections
// ============================================================================

/// Like `len`, but counts characters of strings
fn vm_length(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("length", ["x"])?;
    if let Value::String(s) = &x {
        return Ok(Value::Int(s.chars().count() as i64));
    }
    match x.len() {
        Some(n) => Ok(Value::Int(n as i64)),
        None => Err(VmError::runtime(format!("length: value of type {} has no length", x.type_name()))),
    }
}

/// Sum of numbers; the result is a float once any float is seen
fn vm_sum(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [iterable, start] = args.unpack("sum", ["iterable", "start?"])?;
    let mut total = match start {
        Value::None => Value::Int(0),
        s @ (Value::Int(_) | Value::Float(_)) => s,
        other => return Err(VmError::arg_type("sum", "start", "int or float", &other)),
    };
    for item in iterable.iterate()? {
        total = match (&total, &item) {
            (Value::Int(a), Value::Int(b)) => Value::Int(
                a.checked_add(*b)
                    .ok_or_else(|| VmError::runtime("sum: integer overflow"))?,
            ),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                Value::Float(float_arg("sum", "start", &total)? + float_arg("sum", "iterable", &item)?)
            }
            (_, other) => {
                return Err(VmError::runtime(format!(
                    "sum: unsupported element of type {}",
                    other.type_name()
                )))
            }
        };
    }
    Ok(total)
}

/// `shared_dict(d=None)`: a mapping safe to share between threads,
/// optionally seeded from a dict
fn vm_shared_dict(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [seed] = args.unpack("shared_dict", ["d?"])?;
    let dict = Dict::new();
    match &seed {
        Value::None => {}
        Value::Dict(d) => {
            for (k, v) in d.items() {
                dict.insert(k, v)?;
            }
        }
        other => return Err(VmError::arg_type("shared_dict", "d", "dict", other)),
    }
    Ok(Value::object(SharedDict::from_dict(dict)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use starbridge_vm::{CancellationToken, ErrorKind};

    fn call(f: fn(&mut Thread, &Args) -> Result<Value, VmError>, args: Vec<Value>) -> Result<Value, VmError> {
        f(&mut Thread::new("t"), &Args::new(args))
    }

    #[test]
    fn test_radix() {
        assert_eq!(call(vm_hex, vec![Value::Int(255)]).unwrap(), Value::string("0xff"));
        assert_eq!(call(vm_oct, vec![Value::Int(8)]).unwrap(), Value::string("0o10"));
        assert_eq!(call(vm_bin, vec![Value::Int(-5)]).unwrap(), Value::string("-0b101"));
        assert!(call(vm_hex, vec![Value::string("1")]).is_err());
    }

    #[test]
    fn test_length_counts_chars() {
        assert_eq!(call(vm_length, vec![Value::string("héllo")]).unwrap(), Value::Int(5));
        assert_eq!(call(vm_length, vec![Value::list(vec![Value::None])]).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_sum() {
        let ints = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(call(vm_sum, vec![ints.clone()]).unwrap(), Value::Int(3));
        assert_eq!(call(vm_sum, vec![ints, Value::Float(0.5)]).unwrap(), Value::Float(3.5));
        assert!(call(vm_sum, vec![Value::list(vec![Value::string("a")])]).is_err());
    }

    #[test]
    fn test_exit_sets_code() {
        let mut thread = Thread::new("t");
        let err = vm_exit(&mut thread, &Args::new(vec![Value::Int(3)])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Exit(3));
        assert_eq!(thread.exit_code(), Some(3));
        assert!(vm_exit(&mut thread, &Args::new(vec![Value::Int(256)])).unwrap_err().message.contains("out of range"));
    }

    #[test]
    fn test_sleep_observes_token() {
        let mut thread = Thread::new("t");
        let token = CancellationToken::new();
        thread.set_cancellation_token(token.clone());
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            token.cancel();
        });
        let started = Instant::now();
        let err = vm_sleep(&mut thread, &Args::new(vec![Value::Int(10)])).unwrap_err();
        canceller.join().unwrap();
        assert!(err.is_cancelled());
        assert_eq!(err.message, "Starlark computation cancelled: context canceled");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_short_sleep_returns() {
        assert_eq!(call(vm_sleep, vec![Value::Float(0.01)]).unwrap(), Value::None);
        assert!(call(vm_sleep, vec![Value::Int(-1)]).is_err());
    }
}
