//! Fuzz target for merging arbitrary record trees.
//!
//! Builds small batches from fuzzer input and merges them against the
//! built-in table. Merging may fail with an error but must not panic, and a
//! limited collection must never exceed the configured bound.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ta_common::{Record, Value};
use ta_core::{MergeConfig, TreeMerger};
use ta_schema::SchemaRegistry;

#[derive(Debug, Arbitrary)]
enum Leaf {
    Bool(bool),
    UInt(u64),
    Int(i64),
    Double(f64),
    Str(String),
}

#[derive(Debug, Arbitrary)]
struct Child {
    key: u8,
    fields: Vec<(u8, Leaf)>,
}

#[derive(Debug, Arbitrary)]
struct Instance {
    fields: Vec<(u8, Leaf)>,
    children: Vec<Child>,
}

#[derive(Debug, Arbitrary)]
struct Input {
    parent: u8,
    child: u8,
    limited_capacity: u8,
    instances: Vec<Instance>,
}

const TYPES: [&str; 8] = [
    "metrics",
    "process",
    "container",
    "prom_metric",
    "prometheus_info",
    "counter_time",
    "statsd_metric",
    "aggregations64",
];

fn leaf(value: &Leaf) -> Value {
    match value {
        Leaf::Bool(v) => Value::Bool(*v),
        Leaf::UInt(v) => Value::UInt(*v),
        Leaf::Int(v) => Value::Int(*v),
        Leaf::Double(v) => Value::Double(*v),
        Leaf::Str(v) => Value::Str(v.clone()),
    }
}

fn record(type_name: &str, fields: &[(u8, Leaf)]) -> Record {
    let mut record = Record::new(type_name);
    for (field, value) in fields {
        record.set(u32::from(*field) + 1, leaf(value));
    }
    record
}

fuzz_target!(|input: Input| {
    let Ok(registry) = SchemaRegistry::builtin() else {
        return;
    };
    let capacity = usize::from(input.limited_capacity.max(1));
    let Ok(merger) = TreeMerger::new(&registry, MergeConfig::default().with_limited_capacity(capacity)) else {
        return;
    };

    let parent = TYPES[usize::from(input.parent) % TYPES.len()];
    let child = TYPES[usize::from(input.child) % TYPES.len()];
    let batch: Vec<Record> = input
        .instances
        .iter()
        .take(16)
        .map(|inst| {
            let children: Vec<Record> = inst
                .children
                .iter()
                .take(32)
                .map(|c| record(child, &c.fields).with(1, u64::from(c.key)))
                .collect();
            record(parent, &inst.fields).with(200, children)
        })
        .collect();

    if let Ok(outcome) = merger.merge(&batch) {
        if let Some(schema) = registry.lookup(parent) {
            for (field, set) in schema.fields() {
                if set.limited && !set.primary_key && set.rollup_target.is_none() && !set.or {
                    assert!(outcome.record.children(field).len() <= capacity);
                }
            }
        }
    }
});
