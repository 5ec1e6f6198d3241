//! Shared helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;

/// Training-layout fixture directory.
#[allow(dead_code)]
pub fn models_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures/models")
}

#[allow(dead_code)]
pub fn model_path(relative: &str) -> String {
    models_dir().join(relative).to_string_lossy().into_owned()
}

/// The `mlchf` binary with model-related environment variables cleared.
pub fn mlchf() -> Command {
    let mut cmd = Command::cargo_bin("mlchf").expect("binary exists");
    for var in [
        "MLCHF_CF_MODEL",
        "MLCHF_HF_MODEL",
        "MLCHF_MODEL_DIR",
        "MLCHF_MODEL_LABEL",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}
