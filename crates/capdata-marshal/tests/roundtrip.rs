//! Property tests for the pure-data fragment: round-trip fidelity,
//! canonical bodies, deterministic encode.

use capdata_marshal::{pure_copy, BigInt, Marshal, Value};
use proptest::prelude::*;

/// Pure-data values: no remotables, no promises, no NaN (which is
/// intentionally not equal to itself). Error names stay on the revive
/// whitelist so errors round-trip exactly.
fn arb_pure_value() -> BoxedStrategy<Value> {
    let error_name = prop_oneof![
        Just("Error"),
        Just("RangeError"),
        Just("SyntaxError"),
        Just("TypeError"),
    ];
    let leaf = prop_oneof![
        2 => Just(Value::Null),
        2 => Just(Value::Undefined),
        3 => any::<bool>().prop_map(Value::Bool),
        5 => (-1_000_000i64..1_000_000).prop_map(Value::integer),
        // Exclude NaN/Inf: they travel as envelopes but NaN != NaN.
        5 => (-1.0e12f64..1.0e12).prop_map(Value::Number),
        3 => prop_oneof![
            Just(0.0_f64),
            Just(-0.0_f64),
            Just(0.5_f64),
            Just(-1.0_f64),
        ].prop_map(Value::Number),
        5 => "[a-z0-9 ]{0,12}".prop_map(Value::string),
        3 => any::<i128>().prop_map(|i| Value::bigint(BigInt::from(i))),
        2 => (error_name, "[a-z ]{0,16}").prop_map(|(name, msg)| Value::error(name, msg)),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::list),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..6).prop_map(Value::record),
        ]
    })
    .boxed()
}

proptest! {
    #[test]
    fn pure_data_round_trips(v in arb_pure_value()) {
        let marshal = Marshal::new();
        let data = marshal.serialize(&v).unwrap();
        let out = marshal.unserialize(&data).unwrap();
        prop_assert_eq!(out, v);
    }

    #[test]
    fn encode_is_deterministic(v in arb_pure_value()) {
        let data1 = Marshal::new().serialize(&v).unwrap();
        let data2 = Marshal::new().serialize(&v).unwrap();
        prop_assert_eq!(data1.body, data2.body);
        prop_assert_eq!(data1.slots, data2.slots);
    }

    #[test]
    fn structurally_equal_inputs_share_a_body(v in arb_pure_value()) {
        let clone = pure_copy(&v).unwrap();
        prop_assert_eq!(&clone, &v);
        let body1 = Marshal::new().serialize(&v).unwrap().body;
        let body2 = Marshal::new().serialize(&clone).unwrap().body;
        prop_assert_eq!(body1, body2);
    }

    #[test]
    fn bodies_stay_slot_free_for_pure_data(v in arb_pure_value()) {
        let data = Marshal::new().serialize(&v).unwrap();
        prop_assert!(data.slots.is_empty());
    }
}

#[test]
fn round_trip_is_exact_for_whitelisted_error_names() {
    let marshal = Marshal::new();
    let v = Value::record([
        ("err", Value::error("SyntaxError", "bad token")),
        ("list", Value::list([Value::integer(1), Value::string("two")])),
        ("none", Value::Null),
        ("gone", Value::Undefined),
    ]);
    let out = marshal.unserialize(&marshal.serialize(&v).unwrap()).unwrap();
    assert_eq!(out, v);
}
