use super::helpers::execute_with;
use crate::options::Options;
use crate::value::Value;

const FIB: &str = "def fib(n):\n    return n if n < 2 else fib(n - 1) + fib(n - 2)\n\nr = fib(6)\n";

#[test]
fn test_recursion_rejected_when_disabled() {
    let options = Options {
        allow_recursion: false,
        ..Options::default()
    };
    let err = execute_with(options, FIB).unwrap_err();
    assert_eq!(err.message, "function fib called recursively");
}

#[test]
fn test_recursion_allowed() {
    let globals = execute_with(Options::default(), FIB).unwrap();
    assert_eq!(globals["r"], Value::Int(8));
}

#[test]
fn test_global_reassign_rejected_when_disabled() {
    let options = Options {
        allow_global_reassign: false,
        ..Options::default()
    };
    let err = execute_with(options.clone(), "x = 1\nx = 2\n").unwrap_err();
    assert_eq!(err.message, "cannot reassign global x");

    // Bindings inside functions are unaffected
    let globals = execute_with(options, "def f():\n    y = 1\n    y = 2\n    return y\n\nz = f()\n").unwrap();
    assert_eq!(globals["z"], Value::Int(2));
}

#[test]
fn test_call_depth_limit() {
    let options = Options {
        max_call_depth: 16,
        ..Options::default()
    };
    let err = execute_with(options, "def f(n):\n    return f(n + 1)\n\nf(0)\n").unwrap_err();
    assert_eq!(err.message, "call stack depth exceeded (max 16)");
}
