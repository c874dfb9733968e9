//! Property-based test generators using proptest.

use proptest::prelude::*;
use serde_json::{Map, Value};

/// Strategy for store keys: short, printable, never empty, and outside the
/// control-row namespaces (`_Event`, `_MessageQueue`, `_Operation`).
pub fn key_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-zA-Z][a-zA-Z0-9_.-]{0,23}")
        .expect("valid regex")
        .prop_filter("keys must stay out of control namespaces", |k| {
            !k.starts_with('_')
        })
}

/// Strategy for free-form queue and event names, including characters that
/// force the base64url encoding to earn its keep.
pub fn name_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-zA-Z0-9 :*?_-]{1,16}").expect("valid regex")
}

/// Strategy for arbitrary JSON values a few levels deep.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        proptest::string::string_regex("[a-zA-Z0-9 ]{0,12}")
            .expect("valid regex")
            .prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            proptest::collection::vec(
                (
                    proptest::string::string_regex("[a-z]{1,8}").expect("valid regex"),
                    inner
                ),
                0..4
            )
            .prop_map(|members| Value::Object(members.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Strategy for glob patterns built from a key: keeps some bytes, replaces
/// runs with `*` and single bytes with `?`, so the pattern matches the key
/// by construction.
pub fn matching_pattern_strategy(key: &str) -> impl Strategy<Value = String> {
    let bytes: Vec<u8> = key.bytes().collect();
    proptest::collection::vec(0u8..3, bytes.len()).prop_map(move |choices| {
        let mut pattern = String::new();
        for (byte, choice) in bytes.iter().zip(choices) {
            match choice {
                0 => pattern.push(*byte as char),
                1 => pattern.push('?'),
                _ => pattern.push('*'),
            }
        }
        pattern
    })
}
