//! Frozen values reject every mutation and keep their contents

use proptest::prelude::*;

use crate::value::{Dict, List, Value};

#[derive(Debug, Clone)]
enum ListOp {
    Push(i64),
    Extend(Vec<i64>),
    Set(usize, i64),
}

fn list_op() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        any::<i64>().prop_map(ListOp::Push),
        prop::collection::vec(any::<i64>(), 0..4).prop_map(ListOp::Extend),
        (0usize..8, any::<i64>()).prop_map(|(i, v)| ListOp::Set(i, v)),
    ]
}

fn apply(list: &List, op: &ListOp) -> Result<(), crate::VmError> {
    match op {
        ListOp::Push(v) => list.push(Value::Int(*v)),
        ListOp::Extend(vs) => list.extend(vs.iter().copied().map(Value::Int).collect()),
        ListOp::Set(i, v) => list.set(*i, Value::Int(*v)),
    }
}

proptest! {
    #[test]
    fn prop_frozen_list_is_unchanged(
        items in prop::collection::vec(any::<i64>(), 0..8),
        ops in prop::collection::vec(list_op(), 1..6),
    ) {
        let list = List::new(items.iter().copied().map(Value::Int).collect());
        list.freeze();
        for op in &ops {
            prop_assert!(apply(&list, op).is_err());
        }
        let expected: Vec<Value> = items.into_iter().map(Value::Int).collect();
        prop_assert_eq!(list.snapshot(), expected);
    }

    #[test]
    fn prop_frozen_dict_is_unchanged(
        keys in prop::collection::vec("[a-z]{1,4}", 0..6),
        extra in "[a-z]{1,4}",
    ) {
        let value = Value::dict(Dict::new());
        let Value::Dict(dict) = &value else { unreachable!() };
        for (i, k) in keys.iter().enumerate() {
            dict.insert(Value::string(k), Value::Int(i as i64)).unwrap();
        }
        let before = dict.items();
        value.freeze();

        prop_assert!(dict.insert(Value::string(&extra), Value::None).is_err());
        prop_assert!(dict.remove(&Value::string(&extra)).is_err());
        prop_assert!(dict.clear().is_err());
        prop_assert_eq!(dict.items(), before);
    }
}

#[test]
fn test_freeze_reaches_nested_values() {
    let inner = Value::list(vec![Value::Int(1)]);
    let outer = Value::list(vec![inner.clone()]);
    outer.freeze();
    let Value::List(inner) = inner else { unreachable!() };
    assert!(inner.push(Value::Int(2)).is_err());
}
