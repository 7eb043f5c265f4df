//! Fuzz target for JSON schema documents.
//!
//! Loading must reject bad documents with an error, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ta_schema::{DocumentFormat, SchemaRegistry};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = SchemaRegistry::parse_str(text, DocumentFormat::Json);
    }
});
