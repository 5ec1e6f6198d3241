//! Shared fixture helpers for integration tests.

use std::path::PathBuf;

/// Path to fixtures directory used by tests.
#[allow(dead_code)]
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures")
}

/// Training-layout model directory (`CF_Z_0/`, `HF_Z_0/`, ...).
#[allow(dead_code)]
pub fn models_dir() -> PathBuf {
    fixtures_dir().join("models")
}

#[allow(dead_code)]
pub fn cooling_model() -> PathBuf {
    models_dir().join("CF_Z_0/trained_model.txt")
}

#[allow(dead_code)]
pub fn heating_model() -> PathBuf {
    models_dir().join("HF_Z_0/trained_model.txt")
}

/// Assert two rates agree to a relative tolerance.
#[allow(dead_code)]
pub fn assert_close(actual: f64, expected: f64) {
    let rel = ((actual - expected) / expected).abs();
    assert!(
        rel < 1.0e-6,
        "expected {expected:E}, got {actual:E} (relative error {rel:E})"
    );
}
