//! Character classes and string helpers

use starbridge_vm::builtins::registry::BuiltinRegistry;
use starbridge_vm::value::quote;
use starbridge_vm::{Args, Env, Thread, Value, VmError};

use super::{module_env, str_arg};

pub const NAME: &str = "string";

const ASCII_LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const ASCII_UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const HEXDIGITS: &str = "0123456789abcdefABCDEF";
const OCTDIGITS: &str = "01234567";
const PUNCTUATION: &str = r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"##;
const WHITESPACE: &str = " \t\n\r\x0b\x0c";

pub fn load() -> Result<Env, VmError> {
    let letters = format!("{ASCII_LOWERCASE}{ASCII_UPPERCASE}");
    let printable = format!("{DIGITS}{letters}{PUNCTUATION}{WHITESPACE}");

    let mut registry = BuiltinRegistry::new();
    registry.constant("ascii_lowercase", Value::string(ASCII_LOWERCASE));
    registry.constant("ascii_uppercase", Value::string(ASCII_UPPERCASE));
    registry.constant("ascii_letters", Value::string(letters));
    registry.constant("digits", Value::string(DIGITS));
    registry.constant("hexdigits", Value::string(HEXDIGITS));
    registry.constant("octdigits", Value::string(OCTDIGITS));
    registry.constant("punctuation", Value::string(PUNCTUATION));
    registry.constant("whitespace", Value::string(WHITESPACE));
    registry.constant("printable", Value::string(printable));

    registry.register("length", vm_length);
    registry.register("reverse", vm_reverse);
    registry.register("escape", vm_escape);
    registry.register("unescape", vm_unescape);
    registry.register("quote", vm_quote);
    registry.register("unquote", vm_unquote);
    module_env(NAME, registry)
}

fn text<'a>(fname: &str, args: &'a Args) -> Result<&'a str, VmError> {
    if args.positional.len() != 1 || !args.named.is_empty() {
        return Err(VmError::runtime(format!("{fname}: want exactly 1 argument")));
    }
    str_arg(fname, "s", &args.positional[0])
}

/// Characters for strings, element count for other sized values
fn vm_length(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [x] = args.unpack("length", ["x"])?;
    let n = x
        .len()
        .ok_or_else(|| VmError::runtime(format!("length: {} has no length", x.type_name())))?;
    Ok(Value::Int(n as i64))
}

fn vm_reverse(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    Ok(Value::string(text("reverse", args)?.chars().rev().collect::<String>()))
}

/// HTML escaping of `< > & ' "`
fn vm_escape(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let s = text("escape", args)?;
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&#34;"),
            c => out.push(c),
        }
    }
    Ok(Value::string(out))
}

const ENTITIES: [(&str, char); 7] = [
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&amp;", '&'),
    ("&#39;", '\''),
    ("&#34;", '"'),
    ("&quot;", '"'),
    ("&apos;", '\''),
];

fn vm_unescape(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let mut rest = text("unescape", args)?;
    let mut out = String::with_capacity(rest.len());
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match ENTITIES.iter().find(|(entity, _)| rest.starts_with(entity)) {
            Some((entity, c)) => {
                out.push(*c);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Ok(Value::string(out))
}

fn vm_quote(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    Ok(Value::string(quote(text("quote", args)?)))
}

/// Inverse of `quote`: strips one pair of matching quotes and decodes
/// backslash escapes
fn vm_unquote(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let s = text("unquote", args)?;
    let inner = ['"', '\'']
        .iter()
        .find_map(|&q| s.strip_prefix(q).and_then(|s| s.strip_suffix(q)).filter(|_| s.len() >= 2))
        .ok_or_else(|| VmError::runtime(format!("unquote: {s:?} is not quoted")))?;
    unescape_backslashes(inner).map(Value::string)
}

fn unescape_backslashes(s: &str) -> Result<String, VmError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(c @ ('\\' | '"' | '\'')) => out.push(c),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                out.push(code_point(&hex)?);
            }
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                out.push(code_point(&hex)?);
            }
            Some('U') => {
                let hex: String = chars.by_ref().take(8).collect();
                out.push(code_point(&hex)?);
            }
            Some(other) => return Err(VmError::runtime(format!("unquote: invalid escape \\{other}"))),
            None => return Err(VmError::runtime("unquote: trailing backslash")),
        }
    }
    Ok(out)
}

fn code_point(hex: &str) -> Result<char, VmError> {
    u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| VmError::runtime(format!("unquote: invalid escape {hex:?}")))
}
