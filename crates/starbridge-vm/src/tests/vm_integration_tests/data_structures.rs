use super::helpers::{execute, execute_err, repr};
use crate::value::Value;

#[test]
fn test_list_indexing_and_mutation() {
    let source = r#"
x = [1, 2, 3]
x[1] = 20
x.append(4)
x += [5]
(x, x[-1], len(x))
"#;
    assert_eq!(repr(source), "([1, 20, 3, 4, 5], 5, 5)");
}

#[test]
fn test_list_aliasing() {
    let source = r#"
a = [1]
b = a
b.append(2)
a
"#;
    assert_eq!(repr(source), "[1, 2]");
}

#[test]
fn test_index_out_of_range() {
    assert_eq!(execute_err("[1, 2][5]"), "index 5 out of range [-2:2]");
}

#[test]
fn test_dict_operations() {
    let source = r#"
d = {"b": 1}
d["a"] = 2
d.update(c = 3)
(d, d.get("zz", 0), sorted(d.keys()), "a" in d)
"#;
    assert_eq!(repr(source), r#"({"b": 1, "a": 2, "c": 3}, 0, ["a", "b", "c"], True)"#);
}

#[test]
fn test_dict_missing_key() {
    assert_eq!(execute_err("{}['k']"), "key \"k\" not in dict");
}

#[test]
fn test_duplicate_dict_literal_key() {
    assert_eq!(execute_err("{'a': 1, 'a': 2}"), "duplicate key: \"a\"");
}

#[test]
fn test_unhashable_key() {
    assert!(execute("{[1]: 2}").is_err());
}

#[test]
fn test_tuples_and_sets() {
    assert_eq!(repr("(1,)"), "(1,)");
    assert_eq!(repr("(1, 2) + (3,)"), "(1, 2, 3)");
    assert_eq!(repr("set([1, 2, 2, 3])"), "set([1, 2, 3])");
    assert_eq!(repr("set([1, 2]) | set([3])"), "set([1, 2, 3])");
    assert_eq!(execute("len(set([1, 1]))").unwrap(), Value::Int(1));
}

#[test]
fn test_range_is_lazy() {
    assert_eq!(execute("len(range(0, 1000000000, 2))").unwrap(), Value::Int(500000000));
    assert_eq!(repr("list(range(5, 0, -2))"), "[5, 3, 1]");
}

#[test]
fn test_attribute_error() {
    assert_eq!(execute_err("(1).foo"), "int has no .foo field or method");
}

#[test]
fn test_builtin_functions() {
    assert_eq!(repr("sorted([3, 1, 2], reverse = True)"), "[3, 2, 1]");
    assert_eq!(repr("list(zip([1, 2], 'ab'.elems()))"), r#"[(1, "a"), (2, "b")]"#);
    assert_eq!(repr("list(enumerate(['x']))"), r#"[(0, "x")]"#);
    assert_eq!(repr("(min(3, 1, 2), max([4, 9]))"), "(1, 9)");
    assert_eq!(repr("(any([0, 1]), all([]))"), "(True, True)");
    assert_eq!(repr("type({})"), r#""dict""#);
    assert_eq!(repr("int('ff', 16)"), "255");
}
