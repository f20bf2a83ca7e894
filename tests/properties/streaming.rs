//! Property tests for streaming data files.

use proptest::prelude::*;

use cueplan::plan::{DecoderSlot, StreamIter};
use cueplan::{CodecRegistry, EncodingConfig, FileSpec, Mode};

fn yaml_stream(docs: &[i64]) -> String {
    docs.iter()
        .map(|n| format!("n: {}\n", n))
        .collect::<Vec<_>>()
        .join("---\n")
}

fn stream(files: &[Vec<i64>]) -> StreamIter {
    let slots = files
        .iter()
        .enumerate()
        .map(|(i, docs)| DecoderSlot::new(FileSpec::new(format!("f{}.yaml", i)).with_source(yaml_stream(docs))))
        .collect();
    StreamIter::new(slots, EncodingConfig::new(Mode::Export), CodecRegistry::default(), None)
}

fn files() -> impl Strategy<Value = Vec<Vec<i64>>> {
    proptest::collection::vec(proptest::collection::vec(-1000i64..1000, 1..4), 0..5)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: documents come out file by file, in order within each file.
    #[test]
    fn property_stream_is_the_concatenation(files in files()) {
        let mut it = stream(&files);
        let mut seen = Vec::new();
        let mut ids = Vec::new();
        while it.scan() {
            seen.push(it.value().unwrap().to_json().unwrap());
            ids.push(it.id().to_string());
        }
        prop_assert!(it.err().is_none(), "{:?}", it.err());

        let expected: Vec<serde_json::Value> = files
            .iter()
            .flatten()
            .map(|n| serde_json::json!({ "n": n }))
            .collect();
        prop_assert_eq!(seen, expected);

        let expected_ids: Vec<String> = files
            .iter()
            .enumerate()
            .flat_map(|(i, docs)| std::iter::repeat(format!("f{}.yaml", i)).take(docs.len()))
            .collect();
        prop_assert_eq!(ids, expected_ids);
    }

    /// PROPERTY: closing at any point, any number of times, ends the stream.
    #[test]
    fn property_close_is_idempotent(files in files(), stop in 0usize..8) {
        let mut it = stream(&files);
        for _ in 0..stop {
            if !it.scan() {
                break;
            }
        }
        it.close();
        it.close();
        prop_assert!(!it.scan());
        prop_assert!(it.value().is_none());
        prop_assert!(it.err().is_none());
    }
}
