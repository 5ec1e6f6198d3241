mod common;

use std::fs;

use mlchf_lib::{
    Booster, DumpOptions, Error, FeatureMatrix, ModelFormat, ModelSet, PhysicalConditions,
    PredictConfig,
};
use tempfile::tempdir;

use common::{assert_close, cooling_model, heating_model, models_dir};

/// Rows that reach every leaf of the cooling fixture, including missing cells.
fn leaf_rows() -> FeatureMatrix {
    let rows = [
        [0.1, 0.25, 0.43, 0.8, 0.7, 0.4],
        [0.6, 0.25, 0.43, 0.8, 0.7, 0.4],
        [0.6, 0.9, 0.43, 0.8, 0.7, 0.4],
        [0.0, 0.0, 0.43, 0.8, 0.7, 0.4],
    ];
    let data: Vec<f32> = rows.iter().flatten().copied().collect();
    FeatureMatrix::from_dense(&data, rows.len(), 6, 0.0).unwrap()
}

fn assert_same_predictions(expected: &Booster, actual: &Booster) {
    let matrix = leaf_rows();
    let config = PredictConfig::default();
    assert_eq!(
        expected.predict(&matrix, &config).unwrap().values,
        actual.predict(&matrix, &config).unwrap().values
    );
}

#[test]
fn json_model_reports_metadata() {
    let booster = Booster::from_path(&cooling_model()).expect("fixture loads");
    let summary = booster.summary();
    assert_eq!(summary.format, ModelFormat::Json);
    assert_eq!(summary.booster, "gbtree");
    assert_eq!(summary.objective, "reg:squarederror");
    assert_eq!(summary.base_score, -22.0);
    assert_eq!(summary.num_trees, 2);
    assert_eq!(summary.num_iterations, 2);
    assert_eq!(summary.num_features, 6);
    assert_eq!(summary.max_depth, 1);
    assert_eq!(summary.total_leaves, 4);
    assert_eq!(summary.version, Some([2, 0, 3]));
}

#[test]
fn text_dump_matches_json_model() {
    let json = Booster::from_path(&cooling_model()).expect("json fixture loads");
    let options = DumpOptions {
        base_score: -22.0,
        num_feature: Some(6),
        feature_names: ["t", "n_h", "q_lw", "q_hi", "q_hei", "q_cvi"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        ..DumpOptions::default()
    };
    let dump = Booster::from_path_with(&models_dir().join("cf_z0_dump.txt"), &options)
        .expect("dump fixture loads");
    assert_eq!(dump.format(), ModelFormat::TextDump);
    assert_same_predictions(&json, &dump);
}

#[test]
fn ubjson_model_matches_json_model() {
    let json = Booster::from_path(&cooling_model()).unwrap();
    let ubj = Booster::from_path(&models_dir().join("cf_z0_model.ubj")).expect("ubjson loads");
    let summary = ubj.summary();
    assert_eq!(summary.format, ModelFormat::Ubjson);
    assert_eq!(summary.base_score, -22.0);
    assert_eq!(summary.num_trees, 2);
    assert_eq!(summary.version, Some([2, 1, 1]));
    assert_same_predictions(&json, &ubj);
}

#[test]
fn legacy_binary_model_matches_json_model() {
    let json = Booster::from_path(&cooling_model()).unwrap();
    let binary =
        Booster::from_path(&models_dir().join("cf_z0_legacy.bin")).expect("binary model loads");
    let summary = binary.summary();
    assert_eq!(summary.format, ModelFormat::LegacyBinary);
    assert_eq!(summary.objective, "reg:squarederror");
    assert_eq!(summary.base_score, -22.0);
    assert_eq!(summary.num_features, 6);
    assert_eq!(summary.total_leaves, 4);
    assert_eq!(summary.version, Some([1, 7, 0]));
    assert_same_predictions(&json, &binary);
}

#[test]
fn training_layout_accepts_binary_model_files() {
    let dir = tempdir().unwrap();
    let sources = [
        ("CF_Z_0", models_dir().join("cf_z0_legacy.bin")),
        ("HF_Z_0", heating_model()),
    ];
    for (name, from) in sources {
        let target = dir.path().join(name);
        fs::create_dir(&target).unwrap();
        fs::copy(from, target.join("trained_model.txt")).unwrap();
    }
    let set = ModelSet::from_dir(dir.path()).expect("binary layout loads");
    let rates = set
        .evaluate("Z_0", &PhysicalConditions::default().with_temperature(1.0e8))
        .unwrap();
    assert_close(rates.cooling, 1.778279e-22);
    assert_close(rates.heating, 5.623413e-25);
}

#[test]
fn missing_cells_follow_default_branch() {
    let booster = Booster::from_path(&cooling_model()).unwrap();
    // Both features missing: tree 0 defaults left (-1), tree 1 defaults right (+0.25).
    let matrix = FeatureMatrix::from_row(&[0.0, 0.0, 0.5, 0.5, 0.5, 0.5], 0.0);
    let value = booster
        .predict(&matrix, &PredictConfig::default())
        .unwrap()
        .first()
        .unwrap();
    assert_eq!(value, -22.75);
}

#[test]
fn dart_weights_scale_tree_outputs() {
    let booster = Booster::from_path(&models_dir().join("CF_Z_1/trained_model.json")).unwrap();
    assert_eq!(booster.summary().booster, "dart");
    let matrix = FeatureMatrix::from_row(&[0.1, 0.25, 0.43, 0.8, 0.7, 0.4], 0.0);
    let value = booster
        .predict(&matrix, &PredictConfig::default())
        .unwrap()
        .first()
        .unwrap();
    assert_eq!(value, -23.125);
}

#[test]
fn missing_file_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.json");
    match Booster::from_path(&path) {
        Err(Error::ModelNotFound { path: reported }) => assert_eq!(reported, path),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn unknown_encoding_names_the_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.bin");
    fs::write(&path, b"binf\x00\x00\x00\x3f").unwrap();
    let err = Booster::from_path(&path).unwrap_err();
    assert!(matches!(err, Error::UnsupportedModelFormat { origin: Some(_) }));
    assert!(err.to_string().contains("model.bin"));
}

#[test]
fn gblinear_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("linear.json");
    fs::write(
        &path,
        r#"{"learner": {
            "gradient_booster": {"name": "gblinear", "model": {"weights": [0.0]}},
            "learner_model_param": {"base_score": "5E-1", "num_feature": "1"},
            "objective": {"name": "reg:squarederror"}
        }}"#,
    )
    .unwrap();
    assert!(matches!(
        Booster::from_path(&path),
        Err(Error::UnsupportedBooster { name }) if name == "gblinear"
    ));
}
