#![allow(dead_code)]

use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

/// Tolerance for normalized coordinates printed with six decimals.
pub const EPS_LABEL: f64 = 1e-6;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Image size in pixels.
pub fn arb_image_size() -> impl Strategy<Value = (u32, u32)> {
    (1u32..=4096, 1u32..=4096)
}

/// Two corners inside an image of the given size.
pub fn arb_corners(width: u32, height: u32) -> impl Strategy<Value = ([f64; 2], [f64; 2])> {
    let (w, h) = (width as f64, height as f64);
    ((0.0..=w, 0.0..=h), (0.0..=w, 0.0..=h)).prop_map(|((x1, y1), (x2, y2))| ([x1, y1], [x2, y2]))
}

/// Labels drawn from a small pool so some miss the catalog.
pub fn arb_label() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("dent".to_string()),
        Just("scratch".to_string()),
        Just("crack".to_string()),
    ]
}
