//! Fuzz target for decoding JSON record batches and merging them.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ta_common::Record;
use ta_core::TreeMerger;
use ta_schema::SchemaRegistry;

fuzz_target!(|data: &[u8]| {
    let Ok(batch) = serde_json::from_slice::<Vec<Record>>(data) else {
        return;
    };
    if batch.is_empty() {
        return;
    }
    if let Ok(registry) = SchemaRegistry::builtin() {
        let _ = TreeMerger::with_defaults(&registry).merge(&batch);
    }
});
