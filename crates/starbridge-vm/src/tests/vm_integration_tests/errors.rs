use super::helpers::{execute, execute_err};
use crate::error::ErrorKind;

#[test]
fn test_undefined_name() {
    assert_eq!(execute_err("y = x + 1\n"), "undefined: x");
}

#[test]
fn test_fail_backtrace() {
    let source = "def inner():\n    fail(\"boom\")\n\ndef outer():\n    inner()\n\nouter()\n";
    let err = execute(source).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert_eq!(err.message, "fail: boom");

    let functions: Vec<&str> = err.frames.iter().map(|f| f.function.as_str()).collect();
    assert_eq!(functions, ["<toplevel>", "outer", "inner", "fail"]);
    let lines: Vec<u32> = err.frames.iter().take(3).map(|f| f.pos.line).collect();
    assert_eq!(lines, [7, 5, 2]);

    let trace = err.backtrace();
    assert!(trace.starts_with("Traceback (most recent call last):\n"));
    assert!(trace.contains("test.star:7:"));
    assert!(trace.contains("<builtin>: in fail"));
    assert!(trace.ends_with("Error: fail: boom"));
}

#[test]
fn test_syntax_error_position() {
    let err = execute("x = (1,\n").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert!(err.message.starts_with("test.star:"));
    assert_eq!(err.frames.len(), 1);
}

#[test]
fn test_frozen_after_init() {
    use crate::program::compile;
    use crate::thread::Thread;
    use crate::value::{Args, Env};

    let source = "x = [1]\ndef add():\n    x.append(2)\n";
    let program = compile("test.star", source).unwrap();
    let mut thread = Thread::new("test");
    let globals = program.init(&mut thread, &Env::new()).unwrap();
    let err = crate::call(&mut thread, &globals["add"], Args::default()).unwrap_err();
    assert_eq!(err.message, "cannot append to frozen list");
}

#[test]
fn test_partial_globals_on_failure() {
    use crate::program::compile;
    use crate::thread::Thread;
    use crate::value::Env;

    let program = compile("test.star", "a = 1\nfail('stop')\nb = 2\n").unwrap();
    let (globals, result) = program.init_partial(&mut Thread::new("test"), &Env::new());
    assert!(result.is_err());
    assert!(globals.contains_key("a"));
    assert!(!globals.contains_key("b"));
}

#[test]
fn test_fail_with_sep() {
    assert_eq!(execute_err("fail('a', 1, sep = '-')\n"), "fail: a-1");
}
