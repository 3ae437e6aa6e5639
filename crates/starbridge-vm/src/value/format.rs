//! Textual forms of values and `%` formatting

use std::fmt::Write;

use crate::error::VmError;
use crate::value::Value;

/// Shortest float form that reads back as a float (`3.0`, `1e+20`, `+inf`)
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "+inf".to_string() } else { "-inf".to_string() };
    }
    let abs = f.abs();
    if f.fract() == 0.0 && abs < 1e16 {
        return format!("{f:.1}");
    }
    if abs >= 1e16 || (abs != 0.0 && abs < 1e-4) {
        return exponent_form(&format!("{f:e}"));
    }
    format!("{f}")
}

/// Rust prints `1e20`; the guest prints `1e+20`
fn exponent_form(s: &str) -> String {
    match s.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => s.to_string(),
    }
}

/// Double-quoted string literal with escapes
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `format % args`
pub fn percent_format(format: &str, args: &Value) -> Result<String, VmError> {
    let positional: Vec<Value> = match args {
        Value::Tuple(items) => items.as_ref().clone(),
        Value::Dict(_) => Vec::new(),
        other => vec![other.clone()],
    };
    let mapping = match args {
        Value::Dict(d) => Some(d.clone()),
        _ => None,
    };

    let mut out = String::with_capacity(format.len());
    let mut next = 0usize;
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut named = None;
        if chars.peek() == Some(&'(') {
            chars.next();
            let mut key = String::new();
            loop {
                match chars.next() {
                    Some(')') => break,
                    Some(k) => key.push(k),
                    None => return Err(VmError::runtime("incomplete format key")),
                }
            }
            named = Some(key);
        }
        let Some(verb) = chars.next() else {
            return Err(VmError::runtime("incomplete format"));
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        let arg = match (&named, &mapping) {
            (Some(key), Some(dict)) => dict
                .get_str(key)
                .ok_or_else(|| VmError::runtime(format!("key {key:?} not found")))?,
            (Some(_), None) => return Err(VmError::runtime("format requires a mapping")),
            (None, _) => {
                let arg = positional
                    .get(next)
                    .cloned()
                    .ok_or_else(|| VmError::runtime("not enough arguments for format string"))?;
                next += 1;
                arg
            }
        };
        match verb {
            's' => out.push_str(&arg.to_str()),
            'r' => out.push_str(&arg.repr()),
            'd' | 'i' => match &arg {
                Value::Int(i) => out.push_str(&i.to_string()),
                Value::Float(f) => out.push_str(&(f.trunc() as i64).to_string()),
                _ => return Err(format_type_error(verb, &arg)),
            },
            'x' | 'X' | 'o' => {
                let Value::Int(i) = arg else {
                    return Err(format_type_error(verb, &arg));
                };
                let sign = if i < 0 { "-" } else { "" };
                let abs = i.unsigned_abs();
                let digits = match verb {
                    'x' => format!("{abs:x}"),
                    'X' => format!("{abs:X}"),
                    _ => format!("{abs:o}"),
                };
                out.push_str(sign);
                out.push_str(&digits);
            }
            'e' | 'f' | 'g' | 'E' | 'F' | 'G' => {
                let f = arg.as_float().ok_or_else(|| format_type_error(verb, &arg))?;
                out.push_str(&match verb {
                    'e' => exponent_form(&format!("{f:.6e}")),
                    'E' => exponent_form(&format!("{f:.6E}")),
                    'f' | 'F' => format!("{f:.6}"),
                    _ => format_float(f),
                });
            }
            other => {
                return Err(VmError::runtime(format!("unknown conversion %{other}")));
            }
        }
    }
    if mapping.is_none() && next < positional.len() {
        return Err(VmError::runtime("too many arguments for format string"));
    }
    Ok(out)
}

fn format_type_error(verb: char, arg: &Value) -> VmError {
    VmError::runtime(format!("%{verb} format requires number, not {}", arg.type_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Dict;

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(1e20), "1e+20");
        assert_eq!(format_float(1e-7), "1e-7");
        assert_eq!(format_float(f64::INFINITY), "+inf");
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a\"b\n"), "\"a\\\"b\\n\"");
    }

    #[test]
    fn test_percent_positional() {
        let args = Value::tuple(vec![Value::string("x"), Value::Int(42)]);
        assert_eq!(percent_format("%s=%d", &args).unwrap(), "x=42");
        assert_eq!(percent_format("%r", &Value::string("q")).unwrap(), "\"q\"");
        assert_eq!(percent_format("100%%", &Value::tuple(vec![])).unwrap(), "100%");
    }

    #[test]
    fn test_percent_named() {
        let dict = Dict::from_pairs(vec![(Value::string("n"), Value::Int(7))]).unwrap();
        assert_eq!(percent_format("%(n)d items", &Value::dict(dict)).unwrap(), "7 items");
    }

    #[test]
    fn test_percent_arity_errors() {
        assert!(percent_format("%s %s", &Value::string("a")).is_err());
        assert!(percent_format("%s", &Value::tuple(vec![Value::Int(1), Value::Int(2)])).is_err());
    }
}
