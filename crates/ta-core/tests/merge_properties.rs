//! Property-based tests for the tree merger.
//!
//! Each property is checked over randomly generated batches against an
//! independent computation of the expected result.

use proptest::prelude::*;
use ta_common::{Number, Record, Value};
use ta_core::{MergeConfig, TreeMerger};
use ta_schema::{DocumentFormat, SchemaRegistry};

const SCHEMA: &str = r#"{
    "types": {
        "sample": {"1": "primary_key", "2": 12, "3": "or", "4": "unique", "5": "limited"},
        "slot": {"1": "primary_key", "2": 22}
    },
    "skip": ["opaque"]
}"#;

fn registry() -> SchemaRegistry {
    SchemaRegistry::parse_str(SCHEMA, DocumentFormat::Json).unwrap()
}

fn sample() -> Record {
    Record::new("sample").with(1, "k")
}

fn slot(key: u64) -> Record {
    Record::new("slot").with(1, key).with(2, 1u64)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// The merged PrimaryKey equals the shared input value.
    #[test]
    fn primary_key_is_preserved(key in "[a-z]{1,12}", n in 1usize..20) {
        let registry = registry();
        let merger = TreeMerger::with_defaults(&registry);
        let batch: Vec<Record> = (0..n).map(|_| Record::new("sample").with(1, key.as_str())).collect();

        let outcome = merger.merge(&batch).unwrap();
        prop_assert_eq!(outcome.record.get(1), Some(&Value::from(key.as_str())));
        prop_assert!(outcome.report.violations.is_empty());
    }

    /// weight counts present values; sum is exact; min <= every value <= max.
    #[test]
    fn rollup_is_exact(values in prop::collection::vec(prop::option::of(0u32..1_000_000), 1..40)) {
        let registry = registry();
        let merger = TreeMerger::with_defaults(&registry);
        let batch: Vec<Record> = values
            .iter()
            .map(|v| match v {
                Some(v) => sample().with(2, u64::from(*v)),
                None => sample(),
            })
            .collect();

        let record = merger.merge(&batch).unwrap().record;
        let present: Vec<u64> = values.iter().flatten().map(|v| u64::from(*v)).collect();

        match record.rollup(12) {
            None => prop_assert!(present.is_empty()),
            Some(rollup) => {
                prop_assert_eq!(rollup.weight, present.len() as u64);
                prop_assert_eq!(rollup.sum, Some(Number::UInt(present.iter().sum())));
                let (Some(Number::UInt(min)), Some(Number::UInt(max))) = (rollup.min, rollup.max) else {
                    return Err(TestCaseError::fail("min/max missing"));
                };
                for v in &present {
                    prop_assert!(min <= *v && *v <= max);
                }
            }
        }
        prop_assert!(record.get(2).is_none());
    }

    /// Signed and fractional inputs still sum exactly within f64 precision.
    #[test]
    fn rollup_widens_mixed_kinds(ints in prop::collection::vec(-1000i64..1000, 1..10), frac in 0u32..100) {
        let registry = registry();
        let merger = TreeMerger::with_defaults(&registry);
        let mut batch: Vec<Record> = ints.iter().map(|v| sample().with(2, *v)).collect();
        let half = f64::from(frac) / 2.0;
        batch.push(sample().with(2, half));

        let rollup = *merger.merge(&batch).unwrap().record.rollup(12).unwrap();
        let expected = ints.iter().map(|v| *v as f64).sum::<f64>() + half;
        prop_assert_eq!(rollup.weight, ints.len() as u64 + 1);
        prop_assert!(matches!(rollup.sum, Some(Number::Double(s)) if (s - expected).abs() < 1e-9));
    }

    /// OR over one value is that value; over many it is the bitwise OR.
    #[test]
    fn or_is_exact(masks in prop::collection::vec(any::<u64>(), 1..16)) {
        let registry = registry();
        let merger = TreeMerger::with_defaults(&registry);
        let batch: Vec<Record> = masks.iter().map(|m| sample().with(3, *m)).collect();

        let record = merger.merge(&batch).unwrap().record;
        let expected = masks.iter().fold(0u64, |acc, m| acc | m);
        prop_assert_eq!(record.get(3), Some(&Value::UInt(expected)));
    }

    /// Boolean OR.
    #[test]
    fn or_over_bools(flags in prop::collection::vec(any::<bool>(), 1..16)) {
        let registry = registry();
        let merger = TreeMerger::with_defaults(&registry);
        let batch: Vec<Record> = flags.iter().map(|f| sample().with(3, *f)).collect();

        let record = merger.merge(&batch).unwrap().record;
        prop_assert_eq!(record.get(3), Some(&Value::Bool(flags.iter().any(|f| *f))));
    }

    /// N identical values count 1; N pairwise-distinct values count N.
    #[test]
    fn unique_is_exact(value in any::<i64>(), n in 1usize..30) {
        let registry = registry();
        let merger = TreeMerger::with_defaults(&registry);

        let same: Vec<Record> = (0..n).map(|_| sample().with(4, value)).collect();
        let record = merger.merge(&same).unwrap().record;
        prop_assert_eq!(record.get(4), Some(&Value::UInt(1)));

        let distinct: Vec<Record> = (0..n as u64).map(|i| sample().with(4, i)).collect();
        let record = merger.merge(&distinct).unwrap().record;
        prop_assert_eq!(record.get(4), Some(&Value::UInt(n as u64)));
    }

    /// A limited collection holds at most K groups, exactly the K heaviest,
    /// ties broken by first appearance, in first-seen order.
    #[test]
    fn limited_keeps_heaviest(
        instances in prop::collection::vec(prop::collection::vec(0u64..25, 0..12), 1..8),
        capacity in 1usize..10,
    ) {
        let registry = registry();
        let merger = TreeMerger::new(&registry, MergeConfig::default().with_limited_capacity(capacity)).unwrap();
        let batch: Vec<Record> = instances
            .iter()
            .map(|keys| sample().with(5, keys.iter().map(|k| slot(*k)).collect::<Vec<_>>()))
            .collect();

        // Expected: weights in first-seen order, then a stable sort.
        let mut order: Vec<(u64, u64)> = Vec::new();
        for key in instances.iter().flatten() {
            match order.iter_mut().find(|(k, _)| k == key) {
                Some((_, w)) => *w += 1,
                None => order.push((*key, 1)),
            }
        }
        let mut ranked: Vec<(usize, u64)> = order.iter().enumerate().map(|(i, (_, w))| (i, *w)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        let mut kept_idx: Vec<usize> = ranked.iter().take(capacity).map(|(i, _)| *i).collect();
        kept_idx.sort_unstable();
        let expected: Vec<u64> = kept_idx.iter().map(|i| order[*i].0).collect();

        let outcome = merger.merge(&batch).unwrap();
        let kept: Vec<u64> = outcome
            .record
            .children(5)
            .iter()
            .map(|c| match c.get(1) {
                Some(Value::UInt(k)) => *k,
                _ => u64::MAX,
            })
            .collect();

        prop_assert!(kept.len() <= capacity);
        prop_assert_eq!(kept, expected);
        prop_assert_eq!(outcome.report.groups_truncated, order.len().saturating_sub(capacity));
    }

    /// Skipped types return the first instance untouched.
    #[test]
    fn skip_passes_first_through(values in prop::collection::vec(any::<u64>(), 1..10)) {
        let registry = registry();
        let merger = TreeMerger::with_defaults(&registry);
        let batch: Vec<Record> = values.iter().map(|v| Record::new("opaque").with(1, *v).with(2, "x")).collect();

        let outcome = merger.merge(&batch).unwrap();
        prop_assert_eq!(&outcome.record, &batch[0]);
        prop_assert!(outcome.report.violations.is_empty());
    }

    /// Same input, same output, with or without partition fan-out.
    #[test]
    fn merge_is_deterministic(instances in prop::collection::vec(prop::collection::vec(0u64..40, 0..20), 1..6)) {
        let registry = registry();
        let sequential = TreeMerger::with_defaults(&registry);
        let parallel = TreeMerger::new(&registry, MergeConfig::default().with_parallel_partitions(2)).unwrap();
        let batch: Vec<Record> = instances
            .iter()
            .map(|keys| sample().with(5, keys.iter().map(|k| slot(*k)).collect::<Vec<_>>()))
            .collect();

        let a = sequential.merge(&batch).unwrap();
        let b = sequential.merge(&batch).unwrap();
        let c = parallel.merge(&batch).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(&a, &c);
    }
}
