//! Property tests for parsing and formatting.

use proptest::prelude::*;

use cueplan::{format_file, parse_expr, parse_file};

fn field() -> impl Strategy<Value = String> {
    let label = proptest::string::string_regex("k[a-z0-9]{0,6}").unwrap();
    let value = prop_oneof![
        any::<i32>().prop_map(|n| n.to_string()),
        "[a-z ]{0,10}".prop_map(|s| format!("{:?}", s)),
        Just("int".to_string()),
        Just("true".to_string()),
        Just("[1, 2]".to_string()),
    ];
    (label, value).prop_map(|(l, v)| format!("{}:   {}", l, v))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: the parser never panics on arbitrary input.
    #[test]
    fn property_parse_never_panics(s in "(?s).{0,256}") {
        let _ = parse_file("p.cue", &s);
        let _ = parse_expr("-e", &s);
    }

    /// PROPERTY: formatting is a fixed point.
    #[test]
    fn property_format_is_idempotent(fields in proptest::collection::vec(field(), 0..6)) {
        let src = fields.join("\n");
        let once = format_file(&parse_file("a.cue", &src).unwrap(), 4);
        let twice = format_file(&parse_file("a.cue", &once).unwrap(), 4);
        prop_assert_eq!(once, twice);
    }
}
