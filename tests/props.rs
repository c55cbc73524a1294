mod common;

use common::{log_path, start_day, writer_in};
use proptest::prelude::*;
use std::fs;
use tempfile::tempdir;

fn arb_record() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,12}",
        "[^\n]{0,8}",
        Just("こんにちは".to_string()),
        Just("🦀 ok".to_string()),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    // Records written in one burst land in the file in call order, each
    // followed by a newline.
    #[test]
    fn prop_burst_preserves_order(records in proptest::collection::vec(arb_record(), 1..40)) {
        let dir = tempdir().unwrap();
        let content = runtime().block_on(async {
            let writer = writer_in(dir.path()).open().unwrap();
            for record in &records {
                writer.write(record.clone());
            }
            writer.wait_next_released().await.unwrap();
            fs::read_to_string(log_path(dir.path(), start_day(), 0)).unwrap()
        });

        let mut expected = records.join("\n");
        expected.push('\n');
        prop_assert_eq!(content, expected);
    }

    // Below the ceiling nothing is dropped; past it exactly the records that
    // would cross it are dropped and the rest keep their order.
    #[test]
    fn prop_buffer_ceiling_drops_only_crossing_records(
        records in proptest::collection::vec(arb_record(), 1..40),
        max in 1usize..120,
    ) {
        let mut pending = 0;
        let mut accepted = Vec::new();
        for record in &records {
            if pending + record.len() < max {
                pending += record.len();
                accepted.push(record.clone());
            }
        }

        let dir = tempdir().unwrap();
        let (content, stats) = runtime().block_on(async {
            let writer = writer_in(dir.path()).max_buffer_bytes(max).open().unwrap();
            for record in &records {
                writer.write(record.clone());
            }
            if !accepted.is_empty() {
                writer.wait_next_released().await.unwrap();
            }
            let content = fs::read_to_string(log_path(dir.path(), start_day(), 0)).ok();
            (content, writer.stats())
        });

        prop_assert_eq!(stats.records_accepted as usize, accepted.len());
        prop_assert_eq!(stats.records_dropped as usize, records.len() - accepted.len());
        if accepted.is_empty() {
            prop_assert!(content.is_none());
        } else {
            let mut expected = accepted.join("\n");
            expected.push('\n');
            prop_assert_eq!(content, Some(expected));
        }
    }
}
