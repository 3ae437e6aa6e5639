//! Floating point math
//!
//! Arguments accept ints and floats. `floor` and `ceil` return ints,
//! everything else returns floats.

use std::f64::consts;

use starbridge_vm::builtins::registry::BuiltinRegistry;
use starbridge_vm::{Args, Env, Thread, Value, VmError};

use super::{float_arg, module_env};

pub const NAME: &str = "math";

pub fn load() -> Result<Env, VmError> {
    let mut registry = BuiltinRegistry::new();

    registry.constant("pi", Value::Float(consts::PI));
    registry.constant("e", Value::Float(consts::E));
    registry.constant("inf", Value::Float(f64::INFINITY));

    registry.register("sqrt", vm_sqrt);
    registry.register("pow", vm_pow);
    registry.register("exp", vm_exp);
    registry.register("log", vm_log);
    registry.register("floor", vm_floor);
    registry.register("ceil", vm_ceil);
    registry.register("round", vm_round);
    registry.register("fabs", vm_fabs);
    registry.register("sin", vm_sin);
    registry.register("cos", vm_cos);
    registry.register("tan", vm_tan);

    module_env(NAME, registry)
}

fn unary(fname: &str, args: &Args) -> Result<f64, VmError> {
    let [x] = args.unpack(fname, ["x"])?;
    float_arg(fname, "x", &x)
}

fn domain_error(fname: &str) -> VmError {
    VmError::runtime(format!("{fname}: math domain error"))
}

fn vm_sqrt(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let x = unary("sqrt", args)?;
    if x < 0.0 {
        return Err(domain_error("sqrt"));
    }
    Ok(Value::Float(x.sqrt()))
}

fn vm_pow(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x, y] = args.unpack("pow", ["x", "y"])?;
    Ok(Value::Float(float_arg("pow", "x", &x)?.powf(float_arg("pow", "y", &y)?)))
}

fn vm_exp(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    Ok(Value::Float(unary("exp", args)?.exp()))
}

/// `log(x, base=e)`
fn vm_log(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x, base] = args.unpack("log", ["x", "base?"])?;
    let x = float_arg("log", "x", &x)?;
    if x <= 0.0 {
        return Err(domain_error("log"));
    }
    match base {
        Value::None => Ok(Value::Float(x.ln())),
        base => {
            let base = float_arg("log", "base", &base)?;
            if base <= 0.0 || base == 1.0 {
                return Err(domain_error("log"));
            }
            Ok(Value::Float(x.log(base)))
        }
    }
}

fn to_int(fname: &str, x: f64) -> Result<Value, VmError> {
    if !x.is_finite() || x < i64::MIN as f64 || x >= i64::MAX as f64 {
        return Err(VmError::runtime(format!("{fname}: cannot convert {x} to int")));
    }
    Ok(Value::Int(x as i64))
}

fn vm_floor(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    to_int("floor", unary("floor", args)?.floor())
}

fn vm_ceil(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    to_int("ceil", unary("ceil", args)?.ceil())
}

/// Half away from zero
fn vm_round(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    Ok(Value::Float(unary("round", args)?.round()))
}

fn vm_fabs(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    Ok(Value::Float(unary("fabs", args)?.abs()))
}

fn vm_sin(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    Ok(Value::Float(unary("sin", args)?.sin()))
}

fn vm_cos(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    Ok(Value::Float(unary("cos", args)?.cos()))
}

fn vm_tan(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    Ok(Value::Float(unary("tan", args)?.tan()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(f: fn(&mut Thread, &Args) -> Result<Value, VmError>, args: Vec<Value>) -> Result<Value, VmError> {
        f(&mut Thread::new("t"), &Args::new(args))
    }

    #[test]
    fn test_sqrt_widens_ints() {
        assert_eq!(run(vm_sqrt, vec![Value::Int(9)]).unwrap(), Value::Float(3.0));
        assert!(run(vm_sqrt, vec![Value::Int(-1)]).unwrap_err().message.contains("domain"));
    }

    #[test]
    fn test_floor_ceil_round() {
        assert_eq!(run(vm_floor, vec![Value::Float(-1.5)]).unwrap(), Value::Int(-2));
        assert_eq!(run(vm_ceil, vec![Value::Float(1.2)]).unwrap(), Value::Int(2));
        assert_eq!(run(vm_round, vec![Value::Float(2.5)]).unwrap(), Value::Float(3.0));
        assert!(run(vm_floor, vec![Value::Float(f64::INFINITY)]).is_err());
    }

    #[test]
    fn test_log_base() {
        assert_eq!(run(vm_log, vec![Value::Int(8), Value::Int(2)]).unwrap(), Value::Float(3.0));
        assert!(run(vm_log, vec![Value::Int(0)]).is_err());
    }
}
