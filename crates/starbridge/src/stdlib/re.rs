//! Regular expressions (RE2 syntax, no backreferences)

use regex::{Captures, Regex};
use starbridge_vm::builtins::registry::BuiltinRegistry;
use starbridge_vm::{Args, Env, Thread, Value, VmError};

use super::{int_arg, module_env, str_arg};

pub const NAME: &str = "re";

pub fn load() -> Result<Env, VmError> {
    let mut registry = BuiltinRegistry::new();
    registry.register("match", vm_match);
    registry.register("search", vm_search);
    registry.register("findall", vm_findall);
    registry.register("split", vm_split);
    registry.register("sub", vm_sub);
    module_env(NAME, registry)
}

fn compile(fname: &str, pattern: &Value) -> Result<Regex, VmError> {
    let pattern = str_arg(fname, "pattern", pattern)?;
    Regex::new(pattern).map_err(|e| VmError::runtime(format!("{fname}: {e}")))
}

/// Whole match followed by each group; unmatched groups are `None`
fn groups(caps: &Captures) -> Value {
    Value::tuple(
        caps.iter()
            .map(|m| m.map_or(Value::None, |m| Value::string(m.as_str())))
            .collect(),
    )
}

fn count_arg(fname: &str, param: &str, value: &Value) -> Result<usize, VmError> {
    match value {
        Value::None => Ok(0),
        other => {
            let n = int_arg(fname, param, other)?;
            usize::try_from(n).map_err(|_| VmError::runtime(format!("{fname}: negative {param} {n}")))
        }
    }
}

/// `match(pattern, text)`: groups of a match anchored at the start of `text`
fn vm_match(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [pattern, text] = args.unpack("match", ["pattern", "text"])?;
    let re = compile("match", &pattern)?;
    let text = str_arg("match", "text", &text)?;
    Ok(match re.captures(text) {
        Some(caps) if caps.get(0).is_some_and(|m| m.start() == 0) => groups(&caps),
        _ => Value::None,
    })
}

/// `search(pattern, text)`: groups of the leftmost match
fn vm_search(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [pattern, text] = args.unpack("search", ["pattern", "text"])?;
    let re = compile("search", &pattern)?;
    let text = str_arg("search", "text", &text)?;
    Ok(re.captures(text).map_or(Value::None, |caps| groups(&caps)))
}

/// `findall(pattern, text)`: matched strings, or group tuples when the
/// pattern has groups
fn vm_findall(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [pattern, text] = args.unpack("findall", ["pattern", "text"])?;
    let re = compile("findall", &pattern)?;
    let text = str_arg("findall", "text", &text)?;
    let found = match re.captures_len() {
        1 => re.find_iter(text).map(|m| Value::string(m.as_str())).collect(),
        2 => re
            .captures_iter(text)
            .map(|caps| caps.get(1).map_or(Value::string(""), |m| Value::string(m.as_str())))
            .collect(),
        _ => re
            .captures_iter(text)
            .map(|caps| {
                Value::tuple(
                    caps.iter()
                        .skip(1)
                        .map(|m| Value::string(m.map_or("", |m| m.as_str())))
                        .collect(),
                )
            })
            .collect(),
    };
    Ok(Value::list(found))
}

/// `split(pattern, text, maxsplit=0)`
fn vm_split(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [pattern, text, maxsplit] = args.unpack("split", ["pattern", "text", "maxsplit?"])?;
    let re = compile("split", &pattern)?;
    let text = str_arg("split", "text", &text)?;
    let parts: Vec<Value> = match count_arg("split", "maxsplit", &maxsplit)? {
        0 => re.split(text).map(Value::string).collect(),
        n => re.splitn(text, n + 1).map(Value::string).collect(),
    };
    Ok(Value::list(parts))
}

/// `sub(pattern, repl, text, count=0)`: `$1` and `${name}` expand groups
fn vm_sub(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [pattern, repl, text, count] = args.unpack("sub", ["pattern", "repl", "text", "count?"])?;
    let re = compile("sub", &pattern)?;
    let repl = str_arg("sub", "repl", &repl)?;
    let text = str_arg("sub", "text", &text)?;
    let limit = count_arg("sub", "count", &count)?;
    Ok(Value::string(re.replacen(text, limit, repl)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: fn(&mut Thread, &Args) -> Result<Value, VmError>, args: &[&str]) -> Value {
        let args = Args::new(args.iter().map(Value::string).collect());
        f(&mut Thread::new("t"), &args).unwrap()
    }

    #[test]
    fn test_match_is_anchored() {
        assert_eq!(call(vm_match, &[r"b+", "abbb"]), Value::None);
        assert_eq!(
            call(vm_search, &[r"(b)+", "abbb"]),
            Value::tuple(vec![Value::string("bbb"), Value::string("b")])
        );
    }

    #[test]
    fn test_findall_shapes() {
        assert_eq!(
            call(vm_findall, &[r"\d+", "a1b22"]),
            Value::list(vec![Value::string("1"), Value::string("22")])
        );
        assert_eq!(
            call(vm_findall, &[r"(\w)=(\d)", "a=1 b=2"]),
            Value::list(vec![
                Value::tuple(vec![Value::string("a"), Value::string("1")]),
                Value::tuple(vec![Value::string("b"), Value::string("2")]),
            ])
        );
    }

    #[test]
    fn test_split_and_sub() {
        assert_eq!(
            call(vm_split, &[r",\s*", "a, b,c"]),
            Value::list(vec![Value::string("a"), Value::string("b"), Value::string("c")])
        );
        assert_eq!(call(vm_sub, &[r"(\w+)@", "<$1>", "bob@x"]), Value::string("<bob>x"));
    }

    #[test]
    fn test_bad_pattern() {
        let err = vm_search(&mut Thread::new("t"), &Args::new(vec![Value::string("("), Value::string("")])).unwrap_err();
        assert!(err.message.starts_with("search:"));
    }
}
