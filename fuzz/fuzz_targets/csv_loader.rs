#![no_main]

use libfuzzer_sys::fuzz_target;
use runcompare::loader::parse_source;
use runcompare::schema::{BoundColumns, Schema};

fuzz_target!(|data: &[u8]| {
    // Malformed tables must come back as errors, never panics
    let schema = Schema::default();
    let _ = parse_source("fuzz.csv", data, &schema, None);
    let _ = parse_source("fuzz.csv", data, &schema, Some(&"fuzz".into()));

    let with_bounds = Schema {
        bounds: Some(BoundColumns::default()),
        ..Schema::default()
    };
    let _ = parse_source("fuzz.csv", data, &with_bounds, None);
});
