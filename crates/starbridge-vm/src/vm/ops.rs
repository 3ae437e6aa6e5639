//! Value operation helpers

use std::sync::Arc;

use chrono::{Datelike, Timelike};
use starbridge_parser::{BinOp, UnaryOp};

use crate::builtins::methods;
use crate::error::VmError;
use crate::value::{percent_format, Builtin, Dict, Set, Value};

/// Upper bound on the element count produced by `*` repetition
const MAX_REPEAT: usize = 1 << 28;

/// Implementation of value operations for the interpreter
pub(crate) struct ValueOperations;

impl ValueOperations {
    pub(crate) fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value, VmError> {
        match op {
            BinOp::Add => Self::add_values(left, right),
            BinOp::Sub => Self::sub_values(left, right),
            BinOp::Mul => Self::mul_values(left, right),
            BinOp::Div => Self::div_values(left, right),
            BinOp::FloorDiv => Self::floordiv_values(left, right),
            BinOp::Mod => Self::mod_values(left, right),
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => Self::bitwise_values(op, left, right),
            BinOp::Shl | BinOp::Shr => Self::shift_values(op, left, right),
            BinOp::Eq => Ok(Value::Bool(left.equals(right)?)),
            BinOp::Ne => Ok(Value::Bool(!left.equals(right)?)),
            BinOp::Lt => Ok(Value::Bool(left.compare(right)?.is_lt())),
            BinOp::Le => Ok(Value::Bool(left.compare(right)?.is_le())),
            BinOp::Gt => Ok(Value::Bool(left.compare(right)?.is_gt())),
            BinOp::Ge => Ok(Value::Bool(left.compare(right)?.is_ge())),
            BinOp::In => Ok(Value::Bool(Self::contains(right, left)?)),
            BinOp::NotIn => Ok(Value::Bool(!Self::contains(right, left)?)),
        }
    }

    fn unknown(op: BinOp, left: &Value, right: &Value) -> VmError {
        VmError::runtime(format!(
            "unknown binary op: {} {} {}",
            left.type_name(),
            op,
            right.type_name()
        ))
    }

    fn overflow() -> VmError {
        VmError::runtime("integer overflow")
    }

    fn add_values(left: &Value, right: &Value) -> Result<Value, VmError> {
        match (left, right) {
            (Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int).ok_or_else(Self::overflow),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                Ok(Value::Float(float_of(left) + float_of(right)))
            }
            (Value::String(a), Value::String(b)) => Ok(Value::string(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => {
                let mut items = a.snapshot();
                items.extend(b.snapshot());
                Ok(Value::list(items))
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                let mut items = a.as_ref().clone();
                items.extend(b.iter().cloned());
                Ok(Value::tuple(items))
            }
            _ => Err(Self::unknown(BinOp::Add, left, right)),
        }
    }

    fn sub_values(left: &Value, right: &Value) -> Result<Value, VmError> {
        match (left, right) {
            (Value::Int(a), Value::Int(b)) => a.checked_sub(*b).map(Value::Int).ok_or_else(Self::overflow),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                Ok(Value::Float(float_of(left) - float_of(right)))
            }
            (Value::Set(a), Value::Set(b)) => {
                let drop = b.keys();
                let kept = a
                    .values()
                    .into_iter()
                    .filter(|v| v.hash_key().map_or(true, |k| !drop.contains(&k)));
                Ok(Value::Set(Arc::new(Set::from_values(kept)?)))
            }
            _ => Err(Self::unknown(BinOp::Sub, left, right)),
        }
    }

    fn mul_values(left: &Value, right: &Value) -> Result<Value, VmError> {
        match (left, right) {
            (Value::Int(a), Value::Int(b)) => a.checked_mul(*b).map(Value::Int).ok_or_else(Self::overflow),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                Ok(Value::Float(float_of(left) * float_of(right)))
            }
            (Value::String(s), Value::Int(n)) | (Value::Int(n), Value::String(s)) => {
                let n = repeat_count(s.len(), *n)?;
                Ok(Value::string(s.repeat(n)))
            }
            (Value::List(l), Value::Int(n)) | (Value::Int(n), Value::List(l)) => {
                let items = l.snapshot();
                let n = repeat_count(items.len(), *n)?;
                Ok(Value::list(repeat_items(&items, n)))
            }
            (Value::Tuple(t), Value::Int(n)) | (Value::Int(n), Value::Tuple(t)) => {
                let n = repeat_count(t.len(), *n)?;
                Ok(Value::tuple(repeat_items(t, n)))
            }
            _ => Err(Self::unknown(BinOp::Mul, left, right)),
        }
    }

    fn div_values(left: &Value, right: &Value) -> Result<Value, VmError> {
        match (left, right) {
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let divisor = float_of(right);
                if divisor == 0.0 {
                    return Err(VmError::runtime("floating-point division by zero"));
                }
                Ok(Value::Float(float_of(left) / divisor))
            }
            _ => Err(Self::unknown(BinOp::Div, left, right)),
        }
    }

    fn floordiv_values(left: &Value, right: &Value) -> Result<Value, VmError> {
        match (left, right) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    return Err(VmError::runtime("integer division by zero"));
                }
                let q = a.checked_div(*b).ok_or_else(Self::overflow)?;
                // round toward negative infinity
                Ok(Value::Int(if (a % b != 0) && ((*a < 0) != (*b < 0)) { q - 1 } else { q }))
            }
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let divisor = float_of(right);
                if divisor == 0.0 {
                    return Err(VmError::runtime("floating-point division by zero"));
                }
                Ok(Value::Float((float_of(left) / divisor).floor()))
            }
            _ => Err(Self::unknown(BinOp::FloorDiv, left, right)),
        }
    }

    fn mod_values(left: &Value, right: &Value) -> Result<Value, VmError> {
        match (left, right) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    return Err(VmError::runtime("integer modulo by zero"));
                }
                let r = a.checked_rem(*b).unwrap_or(0);
                Ok(Value::Int(if r != 0 && ((r < 0) != (*b < 0)) { r + b } else { r }))
            }
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let (a, b) = (float_of(left), float_of(right));
                if b == 0.0 {
                    return Err(VmError::runtime("floating-point modulo by zero"));
                }
                Ok(Value::Float(a - b * (a / b).floor()))
            }
            (Value::String(format), args) => Ok(Value::string(percent_format(format, args)?)),
            _ => Err(Self::unknown(BinOp::Mod, left, right)),
        }
    }

    fn bitwise_values(op: BinOp, left: &Value, right: &Value) -> Result<Value, VmError> {
        match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(match op {
                BinOp::BitAnd => a & b,
                BinOp::BitOr => a | b,
                _ => a ^ b,
            })),
            (Value::Set(a), Value::Set(b)) => {
                let (a_values, b_keys) = (a.values(), b.keys());
                let values: Vec<Value> = match op {
                    BinOp::BitAnd => a_values
                        .into_iter()
                        .filter(|v| v.hash_key().map_or(false, |k| b_keys.contains(&k)))
                        .collect(),
                    BinOp::BitOr => a_values.into_iter().chain(b.values()).collect(),
                    _ => {
                        let a_keys = a.keys();
                        a_values
                            .into_iter()
                            .filter(|v| v.hash_key().map_or(false, |k| !b_keys.contains(&k)))
                            .chain(
                                b.values()
                                    .into_iter()
                                    .filter(|v| v.hash_key().map_or(false, |k| !a_keys.contains(&k))),
                            )
                            .collect()
                    }
                };
                Ok(Value::Set(Arc::new(Set::from_values(values)?)))
            }
            (Value::Dict(a), Value::Dict(b)) if op == BinOp::BitOr => {
                let merged = Dict::from_pairs(a.items())?;
                for (k, v) in b.items() {
                    merged.insert(k, v)?;
                }
                Ok(Value::dict(merged))
            }
            _ => Err(Self::unknown(op, left, right)),
        }
    }

    fn shift_values(op: BinOp, left: &Value, right: &Value) -> Result<Value, VmError> {
        let (Value::Int(a), Value::Int(b)) = (left, right) else {
            return Err(Self::unknown(op, left, right));
        };
        if *b < 0 {
            return Err(VmError::runtime("negative shift count"));
        }
        if op == BinOp::Shr {
            return Ok(Value::Int(if *b >= 64 { a >> 63 } else { a >> b }));
        }
        if *a == 0 {
            return Ok(Value::Int(0));
        }
        if *b >= 64 {
            return Err(Self::overflow());
        }
        let shifted = a << b;
        if shifted >> b != *a {
            return Err(Self::overflow());
        }
        Ok(Value::Int(shifted))
    }

    pub(crate) fn unary(op: UnaryOp, value: &Value) -> Result<Value, VmError> {
        match (op, value) {
            (UnaryOp::Not, v) => Ok(Value::Bool(!v.truth())),
            (UnaryOp::Plus, Value::Int(_) | Value::Float(_)) => Ok(value.clone()),
            (UnaryOp::Minus, Value::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(Self::overflow),
            (UnaryOp::Minus, Value::Float(f)) => Ok(Value::Float(-f)),
            (UnaryOp::Invert, Value::Int(i)) => Ok(Value::Int(!i)),
            _ => {
                let symbol = match op {
                    UnaryOp::Plus => "+",
                    UnaryOp::Minus => "-",
                    UnaryOp::Invert => "~",
                    UnaryOp::Not => "not ",
                };
                Err(VmError::runtime(format!("unknown unary op: {symbol}{}", value.type_name())))
            }
        }
    }

    /// `needle in container`
    pub(crate) fn contains(container: &Value, needle: &Value) -> Result<bool, VmError> {
        match container {
            Value::String(s) => match needle {
                Value::String(sub) => Ok(s.contains(sub.as_ref())),
                _ => Err(VmError::runtime(format!(
                    "'in <string>' requires string as left operand, not {}",
                    needle.type_name()
                ))),
            },
            Value::List(l) => seq_contains(&l.snapshot(), needle),
            Value::Tuple(t) => seq_contains(t, needle),
            Value::Dict(d) => d.contains(needle),
            Value::Set(s) => s.contains(needle),
            Value::Module(m) => Ok(needle.as_str().map_or(false, |n| m.members.contains_key(n))),
            Value::Object(o) => o.contains(needle),
            _ => Err(Self::unknown(BinOp::In, needle, container)),
        }
    }

    // ========================================================================
    // Indexing
    // ========================================================================

    pub(crate) fn index(object: &Value, key: &Value) -> Result<Value, VmError> {
        match object {
            Value::List(l) => {
                let i = normalize_index(object, key, l.len())?;
                Ok(l.get(i).unwrap_or_default())
            }
            Value::Tuple(t) => {
                let i = normalize_index(object, key, t.len())?;
                Ok(t[i].clone())
            }
            Value::String(s) => {
                let chars: Vec<char> = s.chars().collect();
                let i = normalize_index(object, key, chars.len())?;
                Ok(Value::string(chars[i].to_string()))
            }
            Value::Dict(d) => d
                .get(key)?
                .ok_or_else(|| VmError::runtime(format!("key {} not in dict", key.repr()))),
            Value::Object(o) => o.get_index(key),
            _ => Err(VmError::runtime(format!(
                "unhandled index operation {}[{}]",
                object.type_name(),
                key.type_name()
            ))),
        }
    }

    pub(crate) fn set_index(object: &Value, key: Value, value: Value) -> Result<(), VmError> {
        match object {
            Value::List(l) => {
                l.check_mutable("assign to element of")?;
                let i = normalize_index(object, &key, l.len())?;
                l.set(i, value)
            }
            Value::Dict(d) => d.insert(key, value),
            Value::Object(o) => o.set_index(key, value),
            _ => Err(VmError::runtime(format!(
                "{} value does not support item assignment",
                object.type_name()
            ))),
        }
    }

    pub(crate) fn slice(object: &Value, lo: &Value, hi: &Value, step: &Value) -> Result<Value, VmError> {
        let step = match step {
            Value::None => 1,
            Value::Int(0) => return Err(VmError::runtime("slice step cannot be zero")),
            Value::Int(i) => *i,
            other => {
                return Err(VmError::runtime(format!(
                    "invalid slice step: got {}, want int",
                    other.type_name()
                )))
            }
        };
        match object {
            Value::List(l) => {
                let items = l.snapshot();
                let picked = slice_indices(items.len(), lo, hi, step)?;
                Ok(Value::list(picked.into_iter().map(|i| items[i].clone()).collect()))
            }
            Value::Tuple(t) => {
                let picked = slice_indices(t.len(), lo, hi, step)?;
                Ok(Value::tuple(picked.into_iter().map(|i| t[i].clone()).collect()))
            }
            Value::String(s) => {
                let chars: Vec<char> = s.chars().collect();
                let picked = slice_indices(chars.len(), lo, hi, step)?;
                Ok(Value::string(picked.into_iter().map(|i| chars[i]).collect::<String>()))
            }
            _ => Err(VmError::runtime(format!("invalid slice operand {}", object.type_name()))),
        }
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    pub(crate) fn get_attr(object: &Value, name: &str) -> Result<Value, VmError> {
        if let Some(method) = methods::lookup(object, name) {
            return Ok(Value::Builtin(Arc::new(Builtin::method(name, object.clone(), method))));
        }
        let found = match object {
            Value::Module(m) => m.members.get(name).cloned(),
            Value::Struct(s) => s.fields.get(name).cloned(),
            Value::Time(t) => match name {
                "year" => Some(Value::Int(t.year() as i64)),
                "month" => Some(Value::Int(t.month() as i64)),
                "day" => Some(Value::Int(t.day() as i64)),
                "hour" => Some(Value::Int(t.hour() as i64)),
                "minute" => Some(Value::Int(t.minute() as i64)),
                "second" => Some(Value::Int(t.second() as i64)),
                "nanosecond" => Some(Value::Int(t.nanosecond() as i64)),
                "unix" => Some(Value::Int(t.timestamp())),
                "unix_nano" => t.timestamp_nanos_opt().map(Value::Int),
                _ => None,
            },
            Value::Object(o) => match o.attr(name)? {
                Some(v) => Some(v),
                None => o
                    .method(name)
                    .map(|m| Value::Builtin(Arc::new(Builtin::method(name, object.clone(), m)))),
            },
            _ => None,
        };
        found.ok_or_else(|| {
            VmError::runtime(format!("{} has no .{name} field or method", object.type_name()))
        })
    }

    /// Names reported by `dir()`
    pub(crate) fn attr_names(object: &Value) -> Vec<String> {
        let mut names: Vec<String> = methods::names(object).iter().map(|s| s.to_string()).collect();
        match object {
            Value::Module(m) => names.extend(m.members.keys().cloned()),
            Value::Struct(s) => names.extend(s.fields.keys().cloned()),
            Value::Time(_) => names.extend(
                ["year", "month", "day", "hour", "minute", "second", "nanosecond", "unix", "unix_nano"]
                    .iter()
                    .map(|s| s.to_string()),
            ),
            Value::Object(o) => names.extend(o.attr_names()),
            _ => {}
        }
        names.sort();
        names.dedup();
        names
    }
}

fn float_of(value: &Value) -> f64 {
    value.as_float().unwrap_or(f64::NAN)
}

fn repeat_count(len: usize, n: i64) -> Result<usize, VmError> {
    let n = n.max(0) as usize;
    if len.saturating_mul(n) > MAX_REPEAT {
        return Err(VmError::runtime("excessive repeat"));
    }
    Ok(n)
}

fn repeat_items(items: &[Value], n: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len() * n);
    for _ in 0..n {
        out.extend_from_slice(items);
    }
    out
}

fn seq_contains(items: &[Value], needle: &Value) -> Result<bool, VmError> {
    for item in items {
        if item.equals(needle)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn normalize_index(object: &Value, key: &Value, len: usize) -> Result<usize, VmError> {
    let Value::Int(i) = key else {
        return Err(VmError::runtime(format!(
            "{} index: got {}, want int",
            object.type_name(),
            key.type_name()
        )));
    };
    let n = len as i64;
    let j = if *i < 0 { i + n } else { *i };
    if j < 0 || j >= n {
        return Err(VmError::runtime(format!("index {i} out of range [{}:{n}]", -n)));
    }
    Ok(j as usize)
}

/// Element positions selected by `[lo:hi:step]` over a sequence of `len`
fn slice_indices(len: usize, lo: &Value, hi: &Value, step: i64) -> Result<Vec<usize>, VmError> {
    let n = len as i64;
    let bound = |v: &Value, default: i64| -> Result<i64, VmError> {
        match v {
            Value::None => Ok(default),
            Value::Int(i) => {
                let i = if *i < 0 { i + n } else { *i };
                Ok(if step > 0 { i.clamp(0, n) } else { i.clamp(-1, n - 1) })
            }
            other => Err(VmError::runtime(format!(
                "invalid slice index: got {}, want int",
                other.type_name()
            ))),
        }
    };
    let mut out = Vec::new();
    if step > 0 {
        let (mut i, stop) = (bound(lo, 0)?, bound(hi, n)?);
        while i < stop {
            out.push(i as usize);
            i += step;
        }
    } else {
        let (mut i, stop) = (bound(lo, n - 1)?, bound(hi, -1)?);
        while i > stop {
            out.push(i as usize);
            i += step;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(v: &Value) -> Vec<i64> {
        v.to_vec().unwrap().iter().map(|x| x.as_int().unwrap()).collect()
    }

    #[test]
    fn test_floor_semantics() {
        let fd = |a, b| ValueOperations::binary(BinOp::FloorDiv, &Value::Int(a), &Value::Int(b)).unwrap();
        let md = |a, b| ValueOperations::binary(BinOp::Mod, &Value::Int(a), &Value::Int(b)).unwrap();
        assert_eq!(fd(7, 2), Value::Int(3));
        assert_eq!(fd(-7, 2), Value::Int(-4));
        assert_eq!(md(-7, 2), Value::Int(1));
        assert_eq!(md(7, -2), Value::Int(-1));
    }

    #[test]
    fn test_overflow_is_error() {
        let err = ValueOperations::binary(BinOp::Add, &Value::Int(i64::MAX), &Value::Int(1)).unwrap_err();
        assert_eq!(err.message, "integer overflow");
        let err = ValueOperations::binary(BinOp::Shl, &Value::Int(1), &Value::Int(64)).unwrap_err();
        assert_eq!(err.message, "integer overflow");
    }

    #[test]
    fn test_true_division_is_float() {
        let v = ValueOperations::binary(BinOp::Div, &Value::Int(6), &Value::Int(3)).unwrap();
        assert!(matches!(v, Value::Float(f) if f == 2.0));
        assert!(ValueOperations::binary(BinOp::Div, &Value::Int(1), &Value::Int(0)).is_err());
    }

    #[test]
    fn test_unknown_op_message() {
        let err = ValueOperations::binary(BinOp::Add, &Value::Int(1), &Value::string("a")).unwrap_err();
        assert_eq!(err.message, "unknown binary op: int + string");
    }

    #[test]
    fn test_slices() {
        let list = Value::list((0..6).map(Value::Int).collect());
        let s = |lo: Value, hi: Value, step: Value| ValueOperations::slice(&list, &lo, &hi, &step).unwrap();
        assert_eq!(ints(&s(Value::Int(1), Value::Int(4), Value::None)), vec![1, 2, 3]);
        assert_eq!(ints(&s(Value::None, Value::None, Value::Int(-2))), vec![5, 3, 1]);
        assert_eq!(ints(&s(Value::Int(-2), Value::None, Value::None)), vec![4, 5]);
        let text = ValueOperations::slice(&Value::string("hello"), &Value::None, &Value::None, &Value::Int(-1));
        assert_eq!(text.unwrap(), Value::string("olleh"));
    }

    #[test]
    fn test_index_errors() {
        let t = Value::tuple(vec![Value::Int(1)]);
        assert_eq!(ValueOperations::index(&t, &Value::Int(-1)).unwrap(), Value::Int(1));
        let err = ValueOperations::index(&t, &Value::Int(3)).unwrap_err();
        assert_eq!(err.message, "index 3 out of range [-1:1]");
    }

    #[test]
    fn test_string_contains_requires_string() {
        assert!(ValueOperations::contains(&Value::string("abc"), &Value::string("b")).unwrap());
        assert!(ValueOperations::contains(&Value::string("abc"), &Value::Int(1)).is_err());
    }

    #[test]
    fn test_set_algebra() {
        let a = Value::Set(Arc::new(Set::from_values((1..4).map(Value::Int)).unwrap()));
        let b = Value::Set(Arc::new(Set::from_values((2..6).map(Value::Int)).unwrap()));
        assert_eq!(ints(&ValueOperations::binary(BinOp::BitAnd, &a, &b).unwrap()), vec![2, 3]);
        assert_eq!(ints(&ValueOperations::binary(BinOp::Sub, &a, &b).unwrap()), vec![1]);
        assert_eq!(ints(&ValueOperations::binary(BinOp::BitXor, &a, &b).unwrap()), vec![1, 4, 5]);
    }

    #[test]
    fn test_repetition() {
        let v = ValueOperations::binary(BinOp::Mul, &Value::Int(2), &Value::string("ab")).unwrap();
        assert_eq!(v, Value::string("abab"));
        let l = ValueOperations::binary(BinOp::Mul, &Value::list(vec![Value::Int(1)]), &Value::Int(-1)).unwrap();
        assert_eq!(l.len(), Some(0));
    }
}
