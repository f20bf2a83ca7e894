//! Property tests for the expression iterator.

use proptest::prelude::*;

use cueplan::plan::{ExprIter, InstanceIter, PlanIter};
use cueplan::{parse_expr, parse_file, Runtime};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: for values `v0..vn` and expressions `e0..em` the iterator
    /// yields `e0(v0), .., em(v0), e0(v1), ..` and nothing else.
    #[test]
    fn property_expressions_cycle_within_each_value(
        values in 1usize..5,
        exprs in 1usize..5,
    ) {
        let rt = Runtime::new();
        let instances = (0..values)
            .map(|v| {
                let src: String = (0..exprs).map(|e| format!("k{}: {}\n", e, v * 10 + e)).collect();
                rt.build(&format!("i{}", v), &[parse_file("i.cue", &src).unwrap()])
            })
            .collect();
        let exprs = (0..exprs)
            .map(|e| {
                let text = format!("k{}", e);
                let expr = parse_expr("-e", &text).unwrap();
                (text, expr)
            })
            .collect::<Vec<_>>();
        let count = exprs.len();

        let mut it = ExprIter::new(PlanIter::Instances(InstanceIter::new(instances)), exprs);
        let mut seen = Vec::new();
        while it.scan() {
            seen.push(it.value().unwrap().to_json().unwrap());
        }
        prop_assert!(it.err().is_none());

        let expected: Vec<serde_json::Value> = (0..values)
            .flat_map(|v| (0..count).map(move |e| serde_json::json!(v * 10 + e)))
            .collect();
        prop_assert_eq!(seen, expected);
    }
}
