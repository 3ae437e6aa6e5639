use super::helpers::{execute, execute_err};
use crate::value::Value;

#[test]
fn test_if_elif_else() {
    let source = r#"
def classify(n):
    if n < 0:
        return "neg"
    elif n == 0:
        return "zero"
    else:
        return "pos"

[classify(-1), classify(0), classify(5)]
"#;
    let result = execute(source).unwrap();
    assert_eq!(result.repr(), r#"["neg", "zero", "pos"]"#);
}

#[test]
fn test_for_loop_with_break_and_continue() {
    let source = r#"
def total():
    s = 0
    for i in range(10):
        if i % 2 == 0:
            continue
        if i > 7:
            break
        s += i
    return s

total()
"#;
    // 1 + 3 + 5 + 7
    assert_eq!(execute(source).unwrap(), Value::Int(16));
}

#[test]
fn test_while_loop() {
    let source = r#"
def count():
    i = 0
    while i < 5:
        i += 1
    return i

count()
"#;
    assert_eq!(execute(source).unwrap(), Value::Int(5));
}

#[test]
fn test_tuple_unpacking_in_for() {
    let source = r#"
def pairs():
    out = []
    for k, v in {"a": 1, "b": 2}.items():
        out.append(k + str(v))
    return out

pairs()
"#;
    assert_eq!(execute(source).unwrap().repr(), r#"["a1", "b2"]"#);
}

#[test]
fn test_unpack_count_mismatch() {
    assert_eq!(
        execute_err("a, b = [1, 2, 3]\n"),
        "too many values to unpack (got 3, want 2)"
    );
    assert_eq!(
        execute_err("a, b, c = (1, 2)\n"),
        "too few values to unpack (got 2, want 3)"
    );
}

#[test]
fn test_break_outside_loop_is_syntax_error() {
    let err = execute("break\n").unwrap_err();
    assert_eq!(err.kind, crate::ErrorKind::Syntax);
    assert!(err.message.contains("break not in a loop"));
}
