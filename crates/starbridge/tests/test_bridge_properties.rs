//! Property tests for the value bridge and JSON encoding

use proptest::prelude::*;
use starbridge::{from_guest, marshal_json, to_guest, unmarshal_json, HostMap, HostValue};

/// Floats that survive a decimal round trip exactly
fn exact_float() -> impl Strategy<Value = f64> {
    (-100_000i32..100_000).prop_map(|n| f64::from(n) / 8.0)
}

fn scalar() -> impl Strategy<Value = HostValue> {
    prop_oneof![
        Just(HostValue::None),
        any::<bool>().prop_map(HostValue::Bool),
        any::<i64>().prop_map(HostValue::Int),
        exact_float().prop_map(HostValue::Float),
        "[a-zA-Z0-9 <>&\"\\\\é]{0,12}".prop_map(HostValue::String),
    ]
}

fn host_value() -> impl Strategy<Value = HostValue> {
    scalar().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(HostValue::List),
            prop::collection::vec(("[a-z]{1,6}", inner), 0..4)
                .prop_map(|entries| HostValue::Map(entries.into_iter().collect::<HostMap>())),
        ]
    })
}

proptest! {
    #[test]
    fn prop_host_guest_round_trip(value in host_value()) {
        let guest = to_guest(&value).unwrap();
        prop_assert_eq!(from_guest(&guest).unwrap(), value);
    }

    #[test]
    fn prop_unsigned_canonicalizes_to_int(n in 0u64..=i64::MAX as u64) {
        let guest = to_guest(&HostValue::UInt(n)).unwrap();
        prop_assert_eq!(from_guest(&guest).unwrap(), HostValue::Int(n as i64));
    }

    #[test]
    fn prop_json_round_trip(value in host_value(), indent in 0usize..4) {
        let guest = to_guest(&value).unwrap();
        let text = marshal_json(&guest, indent).unwrap();
        let back = unmarshal_json(&text).unwrap();
        prop_assert_eq!(from_guest(&back).unwrap(), value);
    }

    #[test]
    fn prop_compact_json_is_single_line(value in host_value()) {
        let text = marshal_json(&to_guest(&value).unwrap(), 0).unwrap();
        prop_assert!(!text.contains('\n'));
    }
}
