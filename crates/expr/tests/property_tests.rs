//! Property-based tests for condition evaluation: re-evaluating the
//! same parsed expression against the same item and placeholders must
//! always produce the same answer, since nothing in the evaluator
//! consults time, randomness, or any state outside its arguments.

use std::collections::BTreeMap;

use dynado_core::AttributeValue;
use dynado_expr::{eval_condition, EvaluationContext, Parser};
use proptest::prelude::*;

fn arb_attribute_value() -> impl Strategy<Value = AttributeValue> {
    prop_oneof![
        any::<i64>().prop_map(|n| AttributeValue::N(n.to_string())),
        "[a-z]{0,8}".prop_map(AttributeValue::S),
        any::<bool>().prop_map(AttributeValue::Bool),
    ]
}

fn arb_item() -> impl Strategy<Value = BTreeMap<String, AttributeValue>> {
    prop::collection::btree_map("[a-z]{1,4}", arb_attribute_value(), 0..4)
        .prop_map(|mut m| {
            m.entry("score".to_string())
                .or_insert(AttributeValue::N("0".to_string()));
            m
        })
}

proptest! {
    /// Evaluating `score > :n` twice against the same item and value
    /// map always agrees with itself.
    #[test]
    fn eval_condition_is_deterministic(
        item in arb_item(),
        threshold in -1000i64..1000,
    ) {
        let ast = Parser::parse_condition("score > :n").unwrap();
        let mut values = BTreeMap::new();
        values.insert("n".to_string(), AttributeValue::N(threshold.to_string()));
        let names = BTreeMap::new();
        let ctx = EvaluationContext::new(Some(&item), &names, &values);

        let first = eval_condition(&ast, &ctx).unwrap();
        let second = eval_condition(&ast, &ctx).unwrap();
        prop_assert_eq!(first, second);
    }

    /// `NOT (NOT cond)` always agrees with `cond` itself — a sanity
    /// check that double negation doesn't drift under repeated
    /// evaluation of arbitrary items.
    #[test]
    fn double_negation_is_identity(
        item in arb_item(),
        threshold in -1000i64..1000,
    ) {
        let ast = Parser::parse_condition("score > :n").unwrap();
        let negated = Parser::parse_condition("NOT (NOT score > :n)").unwrap();
        let mut values = BTreeMap::new();
        values.insert("n".to_string(), AttributeValue::N(threshold.to_string()));
        let names = BTreeMap::new();
        let ctx = EvaluationContext::new(Some(&item), &names, &values);

        let direct = eval_condition(&ast, &ctx).unwrap();
        let double_negated = eval_condition(&negated, &ctx).unwrap();
        prop_assert_eq!(direct, double_negated);
    }
}
