//! Property tests for schema resolution.

use proptest::prelude::*;

use cueplan::plan::SchemaResolver;
use cueplan::{parse_expr, CodecRegistry, EncodingConfig, Mode, PlanError};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: any schema expression without schema files is the
    /// "schema flag specified without a schema" error.
    #[test]
    fn property_expression_without_schema_files_fails(name in "#?[A-Z][A-Za-z0-9]{0,8}") {
        let cfg = EncodingConfig::new(Mode::Export);
        let registry = CodecRegistry::default();
        let resolver = SchemaResolver::new(&cfg, &registry);
        let expr = parse_expr("--schema", &name).unwrap();

        let result = resolver.resolve(&[], Some(&expr));
        prop_assert!(matches!(result, Err(PlanError::SchemaWithoutSchema)));
    }
}

#[test]
fn no_schema_files_is_no_schema() {
    let cfg = EncodingConfig::new(Mode::Export);
    let registry = CodecRegistry::default();
    let resolver = SchemaResolver::new(&cfg, &registry);

    assert!(matches!(resolver.resolve(&[], None), Ok(None)));
}
