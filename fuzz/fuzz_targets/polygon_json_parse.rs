//! Fuzz target for polygon annotation JSON parsing and conversion.
//!
//! Run with:
//!   cargo +nightly fuzz run polygon_json_parse

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = dltrainer::annotation::convert::fuzz_convert_polygon(data);
});
