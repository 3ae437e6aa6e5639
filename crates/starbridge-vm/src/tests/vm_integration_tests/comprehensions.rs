use super::helpers::{execute, repr};

#[test]
fn test_list_comprehension() {
    assert_eq!(repr("[x * x for x in range(5) if x % 2 == 0]"), "[0, 4, 16]");
}

#[test]
fn test_nested_clauses() {
    assert_eq!(
        repr("[(x, y) for x in [1, 2] for y in 'ab'.elems()]"),
        r#"[(1, "a"), (1, "b"), (2, "a"), (2, "b")]"#
    );
}

#[test]
fn test_dict_comprehension() {
    assert_eq!(repr("{k: len(k) for k in ['a', 'bcd']}"), r#"{"a": 1, "bcd": 3}"#);
}

#[test]
fn test_comprehension_variable_does_not_leak() {
    let source = r#"
x = "outer"
ys = [x for x in [1, 2]]
x
"#;
    assert_eq!(repr(source), r#""outer""#);
}

#[test]
fn test_comprehension_sees_enclosing_locals() {
    let source = r#"
def f(n):
    return [i + n for i in range(3)]

f(10)
"#;
    assert_eq!(execute(source).unwrap().repr(), "[10, 11, 12]");
}
