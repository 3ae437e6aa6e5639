//! String methods
//!
//! Indices and lengths count characters, not bytes.

use crate::error::VmError;
use crate::thread::Thread;
use crate::value::{Args, NativeMethod, Value};

pub(crate) static METHODS: &[(&str, NativeMethod)] = &[
    ("capitalize", vm_capitalize),
    ("count", vm_count),
    ("elems", vm_elems),
    ("endswith", vm_endswith),
    ("find", vm_find),
    ("format", vm_format),
    ("index", vm_index),
    ("isalnum", vm_isalnum),
    ("isalpha", vm_isalpha),
    ("isdigit", vm_isdigit),
    ("islower", vm_islower),
    ("isspace", vm_isspace),
    ("istitle", vm_istitle),
    ("isupper", vm_isupper),
    ("join", vm_join),
    ("lower", vm_lower),
    ("lstrip", vm_lstrip),
    ("partition", vm_partition),
    ("removeprefix", vm_removeprefix),
    ("removesuffix", vm_removesuffix),
    ("replace", vm_replace),
    ("rfind", vm_rfind),
    ("rindex", vm_rindex),
    ("rpartition", vm_rpartition),
    ("rsplit", vm_rsplit),
    ("rstrip", vm_rstrip),
    ("split", vm_split),
    ("splitlines", vm_splitlines),
    ("startswith", vm_startswith),
    ("strip", vm_strip),
    ("title", vm_title),
    ("upper", vm_upper),
];

fn text(recv: &Value) -> &str {
    recv.as_str().unwrap_or_default()
}

fn str_arg(fname: &str, param: &str, value: &Value) -> Result<String, VmError> {
    match value {
        Value::String(s) => Ok(s.to_string()),
        other => Err(VmError::arg_type(fname, param, "string", other)),
    }
}

/// Character window selected by optional `start`/`end`, as (char offset, text)
fn window(fname: &str, s: &str, start: &Value, end: &Value) -> Result<(usize, String), VmError> {
    let chars: Vec<char> = s.chars().collect();
    let n = chars.len() as i64;
    let clamp = |v: &Value, default: i64, param: &str| -> Result<usize, VmError> {
        match v {
            Value::None => Ok(default as usize),
            Value::Int(i) => Ok((if *i < 0 { i + n } else { *i }).clamp(0, n) as usize),
            other => Err(VmError::arg_type(fname, param, "int", other)),
        }
    };
    let lo = clamp(start, 0, "start")?;
    let hi = clamp(end, n, "end")?.max(lo);
    Ok((lo, chars[lo..hi].iter().collect()))
}

fn char_index(s: &str, byte: usize) -> usize {
    s[..byte].chars().count()
}

// ============================================================================
// Case Conversion
// ============================================================================

pub fn vm_lower(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    args.no_args("lower")?;
    Ok(Value::string(text(recv).to_lowercase()))
}

pub fn vm_upper(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    args.no_args("upper")?;
    Ok(Value::string(text(recv).to_uppercase()))
}

pub fn vm_capitalize(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    args.no_args("capitalize")?;
    let mut chars = text(recv).chars();
    let out = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    };
    Ok(Value::string(out))
}

pub fn vm_title(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    args.no_args("title")?;
    let mut out = String::new();
    let mut prev_letter = false;
    for c in text(recv).chars() {
        if prev_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_letter = c.is_alphabetic();
    }
    Ok(Value::string(out))
}

// ============================================================================
// Predicates
// ============================================================================

fn predicate(fname: &str, recv: &Value, args: &Args, test: impl Fn(&str) -> bool) -> Result<Value, VmError> {
    args.no_args(fname)?;
    let s = text(recv);
    Ok(Value::Bool(!s.is_empty() && test(s)))
}

pub fn vm_isalnum(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    predicate("isalnum", recv, args, |s| s.chars().all(char::is_alphanumeric))
}

pub fn vm_isalpha(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    predicate("isalpha", recv, args, |s| s.chars().all(char::is_alphabetic))
}

pub fn vm_isdigit(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    predicate("isdigit", recv, args, |s| s.chars().all(|c| c.is_ascii_digit()))
}

pub fn vm_isspace(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    predicate("isspace", recv, args, |s| s.chars().all(char::is_whitespace))
}

pub fn vm_islower(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    predicate("islower", recv, args, |s| {
        s.chars().any(char::is_lowercase) && !s.chars().any(char::is_uppercase)
    })
}

pub fn vm_isupper(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    predicate("isupper", recv, args, |s| {
        s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
    })
}

pub fn vm_istitle(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    predicate("istitle", recv, args, |s| {
        let mut prev_letter = false;
        let mut cased = false;
        for c in s.chars() {
            if c.is_uppercase() {
                if prev_letter {
                    return false;
                }
                cased = true;
            } else if c.is_lowercase() && !prev_letter {
                return false;
            }
            prev_letter = c.is_alphabetic();
        }
        cased
    })
}

// ============================================================================
// Search
// ============================================================================

fn affix_test(fname: &str, recv: &Value, args: &Args, test: fn(&str, &str) -> bool) -> Result<Value, VmError> {
    let [affix, start, end] = args.unpack(fname, ["x", "start?", "end?"])?;
    let (_, hay) = window(fname, text(recv), &start, &end)?;
    let candidates = match &affix {
        Value::Tuple(items) => items.iter().map(|v| str_arg(fname, "x", v)).collect::<Result<Vec<_>, _>>()?,
        other => vec![str_arg(fname, "x", other)?],
    };
    Ok(Value::Bool(candidates.iter().any(|c| test(&hay, c))))
}

pub fn vm_startswith(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    affix_test("startswith", recv, args, |s, p| s.starts_with(p))
}

pub fn vm_endswith(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    affix_test("endswith", recv, args, |s, p| s.ends_with(p))
}

/// Character index of `sub`, from the left or the right
fn locate(fname: &str, recv: &Value, args: &Args, from_right: bool) -> Result<Option<usize>, VmError> {
    let [sub, start, end] = args.unpack(fname, ["sub", "start?", "end?"])?;
    let sub = str_arg(fname, "sub", &sub)?;
    let (offset, hay) = window(fname, text(recv), &start, &end)?;
    let found = if from_right { hay.rfind(&sub) } else { hay.find(&sub) };
    Ok(found.map(|byte| offset + char_index(&hay, byte)))
}

pub fn vm_find(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    Ok(Value::Int(locate("find", recv, args, false)?.map_or(-1, |i| i as i64)))
}

pub fn vm_rfind(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    Ok(Value::Int(locate("rfind", recv, args, true)?.map_or(-1, |i| i as i64)))
}

pub fn vm_index(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    locate("index", recv, args, false)?
        .map(|i| Value::Int(i as i64))
        .ok_or_else(|| VmError::runtime("index: substring not found"))
}

pub fn vm_rindex(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    locate("rindex", recv, args, true)?
        .map(|i| Value::Int(i as i64))
        .ok_or_else(|| VmError::runtime("rindex: substring not found"))
}

pub fn vm_count(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [sub, start, end] = args.unpack("count", ["sub", "start?", "end?"])?;
    let sub = str_arg("count", "sub", &sub)?;
    let (_, hay) = window("count", text(recv), &start, &end)?;
    let n = if sub.is_empty() {
        hay.chars().count() + 1
    } else {
        hay.matches(sub.as_str()).count()
    };
    Ok(Value::Int(n as i64))
}

// ============================================================================
// Manipulation
// ============================================================================

pub fn vm_elems(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    args.no_args("elems")?;
    Ok(Value::list(text(recv).chars().map(|c| Value::string(c.to_string())).collect()))
}

pub fn vm_join(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [items] = args.unpack("join", ["iterable"])?;
    let mut parts = Vec::new();
    for item in items.iterate()? {
        match item {
            Value::String(s) => parts.push(s.to_string()),
            other => {
                return Err(VmError::runtime(format!(
                    "join: in {}, want string, got {}",
                    items.type_name(),
                    other.type_name()
                )))
            }
        }
    }
    Ok(Value::string(parts.join(text(recv))))
}

fn strip_with(fname: &str, recv: &Value, args: &Args, left: bool, right: bool) -> Result<Value, VmError> {
    let [chars] = args.unpack(fname, ["chars?"])?;
    let s = text(recv);
    let out = match &chars {
        Value::None => match (left, right) {
            (true, true) => s.trim(),
            (true, false) => s.trim_start(),
            _ => s.trim_end(),
        },
        Value::String(set) => {
            let in_set = |c: char| set.contains(c);
            match (left, right) {
                (true, true) => s.trim_matches(in_set),
                (true, false) => s.trim_start_matches(in_set),
                _ => s.trim_end_matches(in_set),
            }
        }
        other => return Err(VmError::arg_type(fname, "chars", "string", other)),
    };
    Ok(Value::string(out))
}

pub fn vm_strip(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    strip_with("strip", recv, args, true, true)
}

pub fn vm_lstrip(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    strip_with("lstrip", recv, args, true, false)
}

pub fn vm_rstrip(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    strip_with("rstrip", recv, args, false, true)
}

pub fn vm_removeprefix(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [prefix] = args.unpack("removeprefix", ["prefix"])?;
    let prefix = str_arg("removeprefix", "prefix", &prefix)?;
    let s = text(recv);
    Ok(Value::string(s.strip_prefix(prefix.as_str()).unwrap_or(s)))
}

pub fn vm_removesuffix(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [suffix] = args.unpack("removesuffix", ["suffix"])?;
    let suffix = str_arg("removesuffix", "suffix", &suffix)?;
    let s = text(recv);
    Ok(Value::string(s.strip_suffix(suffix.as_str()).unwrap_or(s)))
}

pub fn vm_replace(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [old, new, count] = args.unpack("replace", ["old", "new", "count?"])?;
    let old = str_arg("replace", "old", &old)?;
    let new = str_arg("replace", "new", &new)?;
    let s = text(recv);
    let out = match count {
        Value::None => s.replace(&old, &new),
        Value::Int(n) if n < 0 => s.replace(&old, &new),
        Value::Int(n) => s.replacen(&old, &new, n as usize),
        other => return Err(VmError::arg_type("replace", "count", "int", &other)),
    };
    Ok(Value::string(out))
}

fn partition_at(fname: &str, recv: &Value, args: &Args, from_right: bool) -> Result<Value, VmError> {
    let [sep] = args.unpack(fname, ["sep"])?;
    let sep = str_arg(fname, "sep", &sep)?;
    if sep.is_empty() {
        return Err(VmError::runtime(format!("{fname}: empty separator")));
    }
    let s = text(recv);
    let found = if from_right { s.rfind(&sep) } else { s.find(&sep) };
    let parts = match found {
        Some(i) => [&s[..i], sep.as_str(), &s[i + sep.len()..]],
        None if from_right => ["", "", s],
        None => [s, "", ""],
    };
    Ok(Value::tuple(parts.iter().map(|p| Value::string(p)).collect()))
}

pub fn vm_partition(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    partition_at("partition", recv, args, false)
}

pub fn vm_rpartition(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    partition_at("rpartition", recv, args, true)
}

fn split_with(fname: &str, recv: &Value, args: &Args, from_right: bool) -> Result<Value, VmError> {
    let [sep, maxsplit] = args.unpack(fname, ["sep?", "maxsplit?"])?;
    let limit = match maxsplit {
        Value::None => None,
        Value::Int(n) if n < 0 => None,
        Value::Int(n) => Some(n as usize),
        other => return Err(VmError::arg_type(fname, "maxsplit", "int", &other)),
    };
    let s = text(recv);
    let parts: Vec<String> = match &sep {
        Value::None => split_whitespace(s, limit, from_right),
        Value::String(sep) if sep.is_empty() => {
            return Err(VmError::runtime(format!("{fname}: empty separator")));
        }
        Value::String(sep) => match (limit, from_right) {
            (None, _) => s.split(sep.as_ref()).map(String::from).collect(),
            (Some(n), false) => s.splitn(n + 1, sep.as_ref()).map(String::from).collect(),
            (Some(n), true) => {
                let mut parts: Vec<String> = s.rsplitn(n + 1, sep.as_ref()).map(String::from).collect();
                parts.reverse();
                parts
            }
        },
        other => return Err(VmError::arg_type(fname, "sep", "string", other)),
    };
    Ok(Value::list(parts.into_iter().map(Value::from).collect()))
}

/// Whitespace split honoring `maxsplit`; the unsplit remainder keeps its inner spacing
fn split_whitespace(s: &str, limit: Option<usize>, from_right: bool) -> Vec<String> {
    let Some(limit) = limit else {
        return s.split_whitespace().map(String::from).collect();
    };
    let mut parts = Vec::new();
    let mut rest = if from_right { s.trim_end() } else { s.trim_start() };
    while parts.len() < limit && !rest.is_empty() {
        let cut = if from_right {
            rest.rfind(char::is_whitespace).map(|i| (i, rest[i..].chars().next().map_or(1, char::len_utf8)))
        } else {
            rest.find(char::is_whitespace).map(|i| (i, rest[i..].chars().next().map_or(1, char::len_utf8)))
        };
        let Some((i, width)) = cut else { break };
        if from_right {
            parts.push(rest[i + width..].to_string());
            rest = rest[..i].trim_end();
        } else {
            parts.push(rest[..i].to_string());
            rest = rest[i + width..].trim_start();
        }
    }
    if !rest.is_empty() {
        parts.push(rest.to_string());
    }
    if from_right {
        parts.reverse();
    }
    parts
}

pub fn vm_split(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    split_with("split", recv, args, false)
}

pub fn vm_rsplit(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    split_with("rsplit", recv, args, true)
}

pub fn vm_splitlines(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let [keepends] = args.unpack("splitlines", ["keepends?"])?;
    let keep = keepends.truth();
    let s = text(recv);
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if c == '\n' {
            let end = if keep { i + 1 } else { i };
            let line = &s[start..end];
            lines.push(if keep { line } else { line.strip_suffix('\r').unwrap_or(line) });
            start = i + 1;
        }
    }
    if start < s.len() {
        lines.push(&s[start..]);
    }
    Ok(Value::list(lines.into_iter().map(Value::from).collect()))
}

// ============================================================================
// Formatting
// ============================================================================

/// "{} {name} {0!r}".format(...)
pub fn vm_format(_thread: &mut Thread, recv: &Value, args: &Args) -> Result<Value, VmError> {
    let s = text(recv);
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    let mut auto_index = 0usize;
    let mut manual = None;

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(VmError::runtime("format: single '}' in format")),
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => field.push(c),
                        None => return Err(VmError::runtime("format: unmatched '{' in format")),
                    }
                }
                let (name, conversion) = match field.split_once('!') {
                    Some((name, conv)) => (name.to_string(), Some(conv.to_string())),
                    None => (field.clone(), None),
                };
                if name.contains(':') {
                    return Err(VmError::runtime("format: format spec features not supported in replacement fields"));
                }
                let value = if name.is_empty() {
                    if manual == Some(true) {
                        return Err(VmError::runtime(
                            "format: cannot switch from manual field specification to automatic field numbering",
                        ));
                    }
                    manual = Some(false);
                    let v = args.positional.get(auto_index).cloned().ok_or_else(|| {
                        VmError::runtime(format!("format: tuple index out of range: {auto_index}"))
                    })?;
                    auto_index += 1;
                    v
                } else if let Ok(index) = name.parse::<usize>() {
                    if manual == Some(false) {
                        return Err(VmError::runtime(
                            "format: cannot switch from automatic field numbering to manual field specification",
                        ));
                    }
                    manual = Some(true);
                    args.positional
                        .get(index)
                        .cloned()
                        .ok_or_else(|| VmError::runtime(format!("format: tuple index out of range: {index}")))?
                } else {
                    args.named
                        .iter()
                        .find(|(n, _)| *n == name)
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| VmError::runtime(format!("format: keyword {name} not found")))?
                };
                match conversion.as_deref() {
                    None | Some("s") => out.push_str(&value.to_str()),
                    Some("r") => out.push_str(&value.repr()),
                    Some(other) => {
                        return Err(VmError::runtime(format!("format: unknown conversion {other:?}")))
                    }
                }
            }
            c => out.push(c),
        }
    }
    Ok(Value::string(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoke(f: NativeMethod, recv: &str, args: Args) -> Result<Value, VmError> {
        f(&mut Thread::new("t"), &Value::string(recv), &args)
    }

    fn strs(v: &Value) -> Vec<String> {
        v.to_vec().unwrap().iter().map(Value::to_str).collect()
    }

    #[test]
    fn test_format_fields() {
        let args = Args::with_named(vec![Value::Int(1), Value::string("x")], vec![("k".into(), Value::Bool(true))]);
        let out = invoke(vm_format, "{} {!r} {k} {{}}", args).unwrap();
        assert_eq!(out, Value::string("1 \"x\" True {}"));
    }

    #[test]
    fn test_format_mixed_numbering() {
        let args = Args::new(vec![Value::Int(1), Value::Int(2)]);
        assert!(invoke(vm_format, "{} {1}", args).is_err());
    }

    #[test]
    fn test_split_forms() {
        let v = invoke(vm_split, "  a  b c ", Args::new(vec![])).unwrap();
        assert_eq!(strs(&v), vec!["a", "b", "c"]);
        let v = invoke(vm_split, "a,b,c", Args::new(vec![Value::string(","), Value::Int(1)])).unwrap();
        assert_eq!(strs(&v), vec!["a", "b,c"]);
        let v = invoke(vm_rsplit, "a,b,c", Args::new(vec![Value::string(","), Value::Int(1)])).unwrap();
        assert_eq!(strs(&v), vec!["a,b", "c"]);
        let v = invoke(vm_split, "a b  c", Args::with_named(vec![], vec![("maxsplit".into(), Value::Int(1))])).unwrap();
        assert_eq!(strs(&v), vec!["a", "b  c"]);
    }

    #[test]
    fn test_find_counts_chars() {
        let v = invoke(vm_find, "héllo", Args::new(vec![Value::string("l")])).unwrap();
        assert_eq!(v, Value::Int(2));
        let v = invoke(vm_find, "abcabc", Args::new(vec![Value::string("a"), Value::Int(1)])).unwrap();
        assert_eq!(v, Value::Int(3));
        assert!(invoke(vm_index, "abc", Args::new(vec![Value::string("z")])).is_err());
    }

    #[test]
    fn test_join_requires_strings() {
        let err = invoke(vm_join, ",", Args::new(vec![Value::list(vec![Value::Int(1)])])).unwrap_err();
        assert_eq!(err.message, "join: in list, want string, got int");
    }

    #[test]
    fn test_partition_and_strip() {
        let v = invoke(vm_partition, "k=v=w", Args::new(vec![Value::string("=")])).unwrap();
        assert_eq!(v.repr(), "(\"k\", \"=\", \"v=w\")");
        let v = invoke(vm_strip, "xxhixx", Args::new(vec![Value::string("x")])).unwrap();
        assert_eq!(v, Value::string("hi"));
    }

    #[test]
    fn test_title_and_capitalize() {
        assert_eq!(invoke(vm_title, "hello world", Args::default()).unwrap(), Value::string("Hello World"));
        assert_eq!(invoke(vm_capitalize, "hELLO", Args::default()).unwrap(), Value::string("Hello"));
        assert_eq!(invoke(vm_istitle, "Hello World", Args::default()).unwrap(), Value::Bool(true));
    }
}
