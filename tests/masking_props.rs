use proptest::prelude::*;
use request_scope_log::{Masker, MaskingKey, MaskingRule, MaskingType};
use serde_json::{json, Value};
use std::borrow::Cow;

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9@.]{0,16}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-c]", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn arb_rule() -> impl Strategy<Value = MaskingRule> {
    let kind = prop_oneof![
        Just(MaskingType::Msisdn),
        Just(MaskingType::Email),
        Just(MaskingType::Full),
        Just(MaskingType::Hash),
        Just(MaskingType::IdCard),
    ];
    ("[a-c*](\\.[a-c*]){0,2}", kind).prop_map(|(path, kind)| MaskingRule::new(path, kind))
}

proptest! {
    #[test]
    fn no_rules_is_identity(payload in arb_json()) {
        let masker = Masker::new(MaskingKey::new("k"));
        let out = masker.mask(&payload, &[]);
        prop_assert!(matches!(out, Cow::Borrowed(_)));
        prop_assert_eq!(out.as_ref(), &payload);
    }

    #[test]
    fn input_is_never_mutated(payload in arb_json(), rules in prop::collection::vec(arb_rule(), 1..4)) {
        let original = payload.clone();
        let masker = Masker::new(MaskingKey::new("k"));
        let _ = masker.mask(&payload, &rules);
        prop_assert_eq!(payload, original);
    }

    #[test]
    fn full_mask_preserves_length(value in "\\PC{0,24}") {
        let masked = Masker::default().mask_value(&value, MaskingType::Full);
        prop_assert_eq!(masked.chars().count(), value.chars().count());
        prop_assert!(masked.chars().all(|c| c == 'X'));
    }
}
