use super::helpers::{execute, execute_err};
use crate::value::Value;

#[test]
fn test_def_and_call() {
    let source = r#"
def add(a, b = 10):
    return a + b

[add(1), add(1, 2), add(b = 3, a = 4)]
"#;
    assert_eq!(execute(source).unwrap().repr(), "[11, 3, 7]");
}

#[test]
fn test_varargs_and_kwargs() {
    let source = r#"
def f(a, *args, **kwargs):
    return (a, args, kwargs)

f(1, 2, 3, x = 4)
"#;
    assert_eq!(execute(source).unwrap().repr(), r#"(1, (2, 3), {"x": 4})"#);
}

#[test]
fn test_star_arguments_at_call_site() {
    let source = r#"
def f(a, b, c):
    return a * 100 + b * 10 + c

f(*[1, 2], **{"c": 3})
"#;
    assert_eq!(execute(source).unwrap(), Value::Int(123));
}

#[test]
fn test_closure_capture() {
    let source = r#"
def make_adder(n):
    def add(x):
        return x + n
    return add

make_adder(5)(10)
"#;
    assert_eq!(execute(source).unwrap(), Value::Int(15));
}

#[test]
fn test_lambda() {
    assert_eq!(execute("(lambda x, y: x * y)(6, 7)").unwrap(), Value::Int(42));
    assert_eq!(
        execute("sorted([3, 1, 2], key = lambda x: -x)").unwrap().repr(),
        "[3, 2, 1]"
    );
}

#[test]
fn test_recursion_allowed_by_default() {
    let source = r#"
def fib(n):
    return n if n < 2 else fib(n - 1) + fib(n - 2)

fib(10)
"#;
    assert_eq!(execute(source).unwrap(), Value::Int(55));
}

#[test]
fn test_implicit_none_return() {
    let source = r#"
def f():
    pass

f()
"#;
    assert_eq!(execute(source).unwrap(), Value::None);
}

#[test]
fn test_argument_errors() {
    let def = "def f(x, y = 1):\n    return x\n";
    assert_eq!(execute_err(&format!("{def}f()\n")), "f: missing argument for x");
    assert_eq!(execute_err(&format!("{def}f(1, 2, 3)\n")), "f: got 3 arguments, want at most 2");
    assert_eq!(execute_err(&format!("{def}f(1, z = 2)\n")), "f: unexpected keyword argument \"z\"");
    assert_eq!(execute_err(&format!("{def}f(1, x = 2)\n")), "f: got multiple values for parameter x");
}

#[test]
fn test_call_non_function() {
    assert_eq!(execute_err("x = 1\nx()\n"), "invalid call of non-function (int)");
}

#[test]
fn test_local_referenced_before_assignment() {
    let source = r#"
x = 1
def f():
    y = x
    x = 2
    return y

f()
"#;
    assert_eq!(execute_err(source), "local variable x referenced before assignment");
}
