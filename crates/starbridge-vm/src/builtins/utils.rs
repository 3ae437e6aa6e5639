//! Utility functions
//!
//! Type inspection, conversion between scalar types, and attribute access.

use crate::error::VmError;
use crate::thread::Thread;
use crate::value::{Args, Value};
use crate::vm::ValueOperations;

// ============================================================================
// Inspection
// ============================================================================

pub fn vm_len(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("len", ["x"])?;
    match x.len() {
        Some(n) => Ok(Value::Int(n as i64)),
        None => Err(VmError::runtime(format!("len: value of type {} has no len", x.type_name()))),
    }
}

pub fn vm_type(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("type", ["x"])?;
    Ok(Value::string(x.type_name()))
}

/// Java-style 32-bit string hash, stable across runs
pub fn vm_hash(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("hash", ["x"])?;
    let Value::String(s) = &x else {
        return Err(VmError::arg_type("hash", "x", "string", &x));
    };
    let h = s
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32));
    Ok(Value::Int(h as i64))
}

pub fn vm_dir(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("dir", ["x"])?;
    let names = ValueOperations::attr_names(&x);
    Ok(Value::list(names.into_iter().map(Value::from).collect()))
}

pub fn vm_hasattr(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x, name] = args.unpack("hasattr", ["x", "name"])?;
    let Value::String(name) = &name else {
        return Err(VmError::arg_type("hasattr", "name", "string", &name));
    };
    Ok(Value::Bool(ValueOperations::get_attr(&x, name).is_ok()))
}

pub fn vm_getattr(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x, name, default] = args.unpack_opt("getattr", ["x", "name", "default?"])?;
    let (x, name) = (x.unwrap_or_default(), name.unwrap_or_default());
    let Value::String(name) = &name else {
        return Err(VmError::arg_type("getattr", "name", "string", &name));
    };
    match (ValueOperations::get_attr(&x, name), default) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default),
        (Err(err), None) => Err(err),
    }
}

// ============================================================================
// Conversion
// ============================================================================

pub fn vm_str(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("str", ["x"])?;
    match x {
        Value::String(_) => Ok(x),
        other => Ok(Value::string(other.to_str())),
    }
}

pub fn vm_repr(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("repr", ["x"])?;
    Ok(Value::string(x.repr()))
}

pub fn vm_bool(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("bool", ["x?"])?;
    Ok(Value::Bool(x.truth()))
}

pub fn vm_int(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x, base] = args.unpack_opt("int", ["x?", "base?"])?;
    let x = x.unwrap_or(Value::Int(0));
    let base = match base {
        None => None,
        Some(Value::Int(b)) if b == 0 || (2..=36).contains(&b) => Some(b as u32),
        Some(Value::Int(b)) => return Err(VmError::runtime(format!("int: base must be an integer >= 2 && <= 36, got {b}"))),
        Some(other) => return Err(VmError::arg_type("int", "base", "int", &other)),
    };
    match &x {
        Value::String(s) => parse_int(s, base.unwrap_or(10)).map(Value::Int),
        _ if base.is_some() => Err(VmError::runtime("int: can't convert non-string with explicit base")),
        Value::Int(_) => Ok(x),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(VmError::runtime(format!("int: cannot convert float {} to integer", x.repr())));
            }
            let t = f.trunc();
            if t < i64::MIN as f64 || t >= i64::MAX as f64 {
                return Err(VmError::runtime("int: float out of range"));
            }
            Ok(Value::Int(t as i64))
        }
        other => Err(VmError::runtime(format!("int: cannot convert {} to int", other.type_name()))),
    }
}

/// Parse an int literal in `base`; base 0 infers it from a `0x`/`0o`/`0b` prefix
fn parse_int(text: &str, base: u32) -> Result<i64, VmError> {
    let invalid = || VmError::runtime(format!("int: invalid literal with base {base}: {}", crate::value::quote(text)));
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let lower = digits.to_ascii_lowercase();
    let prefixed = |p: &str| lower.starts_with(p);
    let (radix, body) = match base {
        0 if prefixed("0x") => (16, &digits[2..]),
        0 if prefixed("0o") => (8, &digits[2..]),
        0 if prefixed("0b") => (2, &digits[2..]),
        0 => (10, digits),
        16 if prefixed("0x") => (16, &digits[2..]),
        8 if prefixed("0o") => (8, &digits[2..]),
        2 if prefixed("0b") => (2, &digits[2..]),
        b => (b, digits),
    };
    if body.is_empty() || body.starts_with(['+', '-']) {
        return Err(invalid());
    }
    let magnitude = u64::from_str_radix(body, radix).map_err(|_| invalid())?;
    if negative {
        if magnitude > i64::MAX as u64 + 1 {
            return Err(invalid());
        }
        Ok((magnitude as i64).wrapping_neg())
    } else {
        i64::try_from(magnitude).map_err(|_| invalid())
    }
}

pub fn vm_float(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack_opt("float", ["x?"])?;
    match x {
        None => Ok(Value::Float(0.0)),
        Some(Value::Float(f)) => Ok(Value::Float(f)),
        Some(Value::Int(i)) => Ok(Value::Float(i as f64)),
        Some(Value::Bool(b)) => Ok(Value::Float(if b { 1.0 } else { 0.0 })),
        Some(Value::String(s)) => {
            let t = s.trim().to_ascii_lowercase();
            let parsed = match t.trim_start_matches(['+', '-']) {
                "inf" | "infinity" => Some(if t.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY }),
                "nan" => Some(f64::NAN),
                _ => t.parse::<f64>().ok(),
            };
            parsed
                .map(Value::Float)
                .ok_or_else(|| VmError::runtime(format!("float: invalid float literal: {}", s)))
        }
        Some(other) => Err(VmError::runtime(format!("float: cannot convert {} to float", other.type_name()))),
    }
}

pub fn vm_abs(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("abs", ["x"])?;
    match x {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| VmError::runtime("integer overflow")),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(VmError::arg_type("abs", "x", "int or float", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: fn(&mut Thread, &Args) -> Result<Value, VmError>, args: Vec<Value>) -> Result<Value, VmError> {
        f(&mut Thread::new("t"), &Args::new(args))
    }

    #[test]
    fn test_int_parsing() {
        assert_eq!(call(vm_int, vec![Value::string("42")]).unwrap(), Value::Int(42));
        assert_eq!(call(vm_int, vec![Value::string("-0x1f"), Value::Int(0)]).unwrap(), Value::Int(-31));
        assert_eq!(call(vm_int, vec![Value::string("ff"), Value::Int(16)]).unwrap(), Value::Int(255));
        assert_eq!(call(vm_int, vec![Value::Float(-2.7)]).unwrap(), Value::Int(-2));
        assert!(call(vm_int, vec![Value::string("1.5")]).is_err());
        assert!(call(vm_int, vec![Value::Float(f64::NAN)]).is_err());
    }

    #[test]
    fn test_float_parsing() {
        assert_eq!(call(vm_float, vec![Value::string("2.5")]).unwrap(), Value::Float(2.5));
        assert_eq!(call(vm_float, vec![Value::string("-inf")]).unwrap(), Value::Float(f64::NEG_INFINITY));
        assert!(call(vm_float, vec![Value::string("abc")]).is_err());
    }

    #[test]
    fn test_len_of_non_sized() {
        let err = call(vm_len, vec![Value::Int(1)]).unwrap_err();
        assert_eq!(err.message, "len: value of type int has no len");
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(call(vm_hash, vec![Value::string("a")]).unwrap(), Value::Int(97));
        assert_eq!(call(vm_hash, vec![Value::string("ab")]).unwrap(), Value::Int(97 * 31 + 98));
    }
}
