//! Property-based tests for decimal comparison, the one place the
//! data model deliberately avoids floating point (§4.1 numeric
//! semantics): every decision here is about exact values, so
//! antisymmetry and consistency with arithmetic must hold for any
//! pair of decimal strings a caller can construct, not just the
//! handful exercised by example-based tests.

use dynado_core::value::{add_decimal, compare_decimal};
use proptest::prelude::*;
use std::cmp::Ordering;

fn arb_decimal() -> impl Strategy<Value = String> {
    (-1_000_000i64..1_000_000, 0u32..3).prop_map(|(whole, scale)| {
        if scale == 0 {
            whole.to_string()
        } else {
            format!("{}.{:0width$}", whole, (whole.unsigned_abs() % 1000) as u32, width = scale as usize)
        }
    })
}

proptest! {
    /// Swapping the operands of `compare_decimal` always flips the
    /// ordering (or leaves it `Equal` for equal values).
    #[test]
    fn compare_decimal_is_antisymmetric(a in arb_decimal(), b in arb_decimal()) {
        let forward = compare_decimal(&a, &b);
        let backward = compare_decimal(&b, &a);
        prop_assert_eq!(forward.map(Ordering::reverse), backward);
    }

    /// Adding a non-negative decimal never decreases the value under
    /// `compare_decimal`'s own ordering.
    #[test]
    fn adding_a_non_negative_amount_does_not_decrease(a in arb_decimal(), delta in 0i64..1_000_000) {
        let sum = add_decimal(&a, &delta.to_string()).unwrap();
        let cmp = compare_decimal(&sum, &a).unwrap();
        prop_assert_ne!(cmp, Ordering::Less);
    }
}
