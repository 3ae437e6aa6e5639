use super::helpers::{execute, execute_err, repr};
use crate::value::Value;

#[test]
fn test_literals() {
    assert_eq!(execute("42").unwrap(), Value::Int(42));
    assert_eq!(execute("True").unwrap(), Value::Bool(true));
    assert_eq!(execute("None").unwrap(), Value::None);
    assert_eq!(execute("'hi'").unwrap(), Value::string("hi"));
    assert_eq!(repr("1.5"), "1.5");
}

#[test]
fn test_arithmetic() {
    assert_eq!(execute("2 + 3 * 4").unwrap(), Value::Int(14));
    assert_eq!(execute("(2 + 3) * 4").unwrap(), Value::Int(20));
    assert_eq!(execute("7 // 2").unwrap(), Value::Int(3));
    assert_eq!(execute("-7 // 2").unwrap(), Value::Int(-4));
    assert_eq!(execute("-7 % 3").unwrap(), Value::Int(2));
    assert_eq!(repr("7 / 2"), "3.5");
    assert_eq!(repr("1 + 2.0"), "3.0");
}

#[test]
fn test_bitwise_and_shift() {
    assert_eq!(execute("6 & 3").unwrap(), Value::Int(2));
    assert_eq!(execute("6 | 3").unwrap(), Value::Int(7));
    assert_eq!(execute("6 ^ 3").unwrap(), Value::Int(5));
    assert_eq!(execute("1 << 4").unwrap(), Value::Int(16));
    assert_eq!(execute("~0").unwrap(), Value::Int(-1));
}

#[test]
fn test_comparison_and_logic() {
    assert_eq!(execute("1 < 2 and 2 < 3").unwrap(), Value::Bool(true));
    assert_eq!(execute("0 or 'x'").unwrap(), Value::string("x"));
    assert_eq!(execute("[] and 1").unwrap(), Value::list(vec![]));
    assert_eq!(execute("not None").unwrap(), Value::Bool(true));
    assert_eq!(execute("'a' if 1 > 2 else 'b'").unwrap(), Value::string("b"));
    assert_eq!(execute("2 in [1, 2]").unwrap(), Value::Bool(true));
    assert_eq!(execute("'z' not in 'abc'").unwrap(), Value::Bool(true));
}

#[test]
fn test_string_operations() {
    assert_eq!(execute("'ab' + 'cd'").unwrap(), Value::string("abcd"));
    assert_eq!(execute("'ab' * 3").unwrap(), Value::string("ababab"));
    assert_eq!(execute("'hello'[1:4]").unwrap(), Value::string("ell"));
    assert_eq!(execute("'hello'[::-1]").unwrap(), Value::string("olleh"));
    assert_eq!(execute("'%s=%d' % ('n', 3)").unwrap(), Value::string("n=3"));
    assert_eq!(execute("'{}-{}'.format(1, 'x')").unwrap(), Value::string("1-x"));
    assert_eq!(execute("','.join(['a', 'b'])").unwrap(), Value::string("a,b"));
}

#[test]
fn test_arithmetic_errors() {
    assert_eq!(execute_err("1 // 0"), "integer division by zero");
    assert_eq!(execute_err("1 + 'a'"), "unknown binary op: int + string");
    assert_eq!(execute_err("9223372036854775807 + 1"), "integer overflow");
}
