//! Integration tests for the `inspect` subcommand.

mod common;

use predicates::prelude::*;

use common::{mlchf, model_path, models_dir};

#[test]
fn prints_json_model_metadata() {
    mlchf()
        .args(["inspect", &model_path("CF_Z_0/trained_model.txt")])
        .assert()
        .success()
        .stdout(predicate::str::contains("format:      json"))
        .stdout(predicate::str::contains("objective:   reg:squarederror"))
        .stdout(predicate::str::contains("base score:  -22"))
        .stdout(predicate::str::contains("trees:       2"))
        .stdout(predicate::str::contains("version:     2.0.3"));
}

#[test]
fn text_dump_reports_feature_names() {
    let output = mlchf()
        .args(["--format", "json", "inspect", &model_path("cf_z0_dump.txt")])
        .output()
        .expect("command runs");
    assert!(output.status.success());

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let report = &reports[0];
    assert_eq!(report["format"], "text_dump");
    assert_eq!(report["num_features"], 6);
    assert_eq!(report["feature_names"][2], "q_lw");
}

#[test]
fn defaults_to_configured_pair() {
    let output = mlchf()
        .env("MLCHF_MODEL_DIR", models_dir())
        .args(["--format", "json", "inspect"])
        .output()
        .expect("command runs");
    assert!(output.status.success());

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let reports = reports.as_array().expect("array");
    assert_eq!(reports.len(), 2);
    assert!(reports[1]["path"]
        .as_str()
        .expect("path string")
        .contains("HF_Z_0"));
}

#[test]
fn reports_binary_encodings() {
    mlchf()
        .args(["inspect", &model_path("cf_z0_model.ubj")])
        .assert()
        .success()
        .stdout(predicate::str::contains("format:      ubjson"))
        .stdout(predicate::str::contains("version:     2.1.1"));

    mlchf()
        .args(["inspect", &model_path("cf_z0_legacy.bin")])
        .assert()
        .success()
        .stdout(predicate::str::contains("format:      legacy-binary"))
        .stdout(predicate::str::contains("trees:       2"));
}

#[test]
fn manifest_lists_its_model_files() {
    let output = mlchf()
        .env("MLCHF_MODEL_DIR", "/nonexistent")
        .args(["--format", "json", "--manifest", &model_path("manifest.json"), "inspect"])
        .output()
        .expect("command runs");
    assert!(output.status.success());

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let paths: Vec<&str> = reports
        .as_array()
        .expect("array")
        .iter()
        .map(|r| r["path"].as_str().expect("path string"))
        .collect();
    assert_eq!(paths.len(), 2);
    assert!(paths[0].ends_with("CF_Z_0/trained_model.txt"));
    assert!(paths[1].ends_with("HF_Z_0/trained_model.txt"));
}

#[test]
fn unsupported_file_fails() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("model.bin");
    std::fs::write(&path, b"\x00\x01\x02").expect("write file");
    mlchf()
        .arg("inspect")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load model"));
}
