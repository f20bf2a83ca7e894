//! Property tests for `--list` placement.

use proptest::prelude::*;

use cueplan::plan::{place_orphans, DecoderSlot, PlacementFlags};
use cueplan::{BuildUnit, CodecRegistry, EncodingConfig, FileSpec, Mode, Runtime};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: objects placed under the same path share one list, one
    /// element per object, whatever file they came from.
    #[test]
    fn property_same_path_shares_one_list(copies in 1usize..6, n in 0i64..100) {
        let mut unit = BuildUnit::new(true, ".", "command-line-arguments");
        let slots = (0..copies)
            .map(|i| DecoderSlot::new(FileSpec::new(format!("d{}.json", i)).with_source(format!("{{\"n\": {}}}", n))))
            .collect();
        let flags = PlacementFlags {
            list: true,
            paths: vec!["\"items\"".into()],
            ..Default::default()
        };
        let cfg = EncodingConfig::new(Mode::Export);

        let files = place_orphans(&mut unit, slots, &flags, false, &cfg, &CodecRegistry::default())
            .unwrap()
            .unwrap();
        prop_assert_eq!(files.len(), 1);

        let value = Runtime::new().compile_file(&files[0]).to_json().unwrap();
        let expected = serde_json::json!({ "items": vec![serde_json::json!({ "n": n }); copies] });
        prop_assert_eq!(value, expected);
    }
}
