//! Gradient-boosted tree inference.
//!
//! This module provides:
//! - [`Booster`] - A loaded tree ensemble (XGBoost JSON, UBJSON or legacy
//!   binary model, or a text dump)
//! - [`PredictConfig`] - Prediction options, mirroring XGBoost's JSON config
//! - [`Prediction`] - Flat prediction values plus their shape
//! - [`Predict`] - The seam higher layers depend on instead of [`Booster`]
//!
//! # Example
//!
//! ```no_run
//! use mlchf_lib::{Booster, FeatureMatrix, PredictConfig};
//!
//! let booster = Booster::from_path("CF_Z_0/trained_model.txt".as_ref())?;
//! let matrix = FeatureMatrix::from_dense(&[0.1, 0.25, 0.43, 0.82, 0.68, 0.38], 1, 6, 0.0)?;
//! let prediction = booster.predict(&matrix, &PredictConfig::default())?;
//! println!("log10 rate: {:?}", prediction.values);
//! # Ok::<(), mlchf_lib::Error>(())
//! ```

mod dump;
mod json;
mod legacy;
mod objective;
mod tree;
mod ubjson;

pub use objective::{Objective, OutputTransform};
pub use tree::{RegTree, TreeNode};

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::matrix::FeatureMatrix;

/// Encoding a model was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFormat {
    Json,
    Ubjson,
    /// Binary `save_model` output of XGBoost 1.x and 2.0.
    LegacyBinary,
    TextDump,
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ModelFormat::Json => "json",
            ModelFormat::Ubjson => "ubjson",
            ModelFormat::LegacyBinary => "legacy-binary",
            ModelFormat::TextDump => "text-dump",
        };
        f.write_str(value)
    }
}

/// Parameters a text dump cannot carry itself.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpOptions {
    /// Base score in output space (converted with the objective's link).
    pub base_score: f32,
    pub objective: String,
    /// Feature count; defaults to `feature_names.len()` or the highest split
    /// index seen plus one.
    pub num_feature: Option<usize>,
    /// Names used in place of `f<index>` tokens.
    pub feature_names: Vec<String>,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            base_score: 0.0,
            objective: "reg:squarederror".to_string(),
            num_feature: None,
            feature_names: Vec::new(),
        }
    }
}

/// What [`Booster::predict`] returns per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredictionType {
    /// Objective-transformed value (`type: 0`).
    #[default]
    Value,
    /// Raw untransformed margin (`type: 1`).
    Margin,
}

/// Prediction options.
///
/// Field names follow XGBoost's prediction config so the same JSON string
/// (`{"training": false, "type": 0, "iteration_begin": 0, "iteration_end": 0,
/// "strict_shape": false}`) can be parsed with [`PredictConfig::from_json`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PredictConfig {
    #[serde(default)]
    pub training: bool,
    #[serde(rename = "type", default)]
    pub kind: u32,
    #[serde(default)]
    pub iteration_begin: usize,
    /// Exclusive; `0` selects every iteration.
    #[serde(default)]
    pub iteration_end: usize,
    #[serde(default)]
    pub strict_shape: bool,
}

impl PredictConfig {
    pub fn from_json(config: &str) -> Result<Self> {
        Ok(serde_json::from_str(config)?)
    }

    /// Request raw margins instead of transformed values.
    pub fn margin() -> Self {
        Self {
            kind: 1,
            ..Self::default()
        }
    }

    pub fn prediction_type(&self) -> Result<PredictionType> {
        match self.kind {
            0 => Ok(PredictionType::Value),
            1 => Ok(PredictionType::Margin),
            other => Err(Error::InvalidPredictConfig {
                message: format!("prediction type {other} is not supported (expected 0 or 1)"),
            }),
        }
    }
}

/// Flat row-major prediction values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

impl Prediction {
    /// First value, i.e. the prediction for a single-row, single-output call.
    pub fn first(&self) -> Option<f32> {
        self.values.first().copied()
    }
}

/// Anything that can score a feature matrix.
pub trait Predict {
    fn predict(&self, matrix: &FeatureMatrix, config: &PredictConfig) -> Result<Prediction>;

    /// Number of feature columns the predictor reads.
    fn num_features(&self) -> usize;
}

/// Model metadata reported by `inspect`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub format: ModelFormat,
    pub booster: String,
    pub objective: String,
    pub base_score: f32,
    pub num_trees: usize,
    pub num_iterations: usize,
    pub num_groups: usize,
    pub num_features: usize,
    pub max_depth: usize,
    pub total_leaves: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub feature_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<[u32; 3]>,
}

pub(crate) struct BoosterParts {
    pub format: ModelFormat,
    pub booster_name: String,
    pub objective: Objective,
    pub base_score: f32,
    pub base_margin: f32,
    pub trees: Vec<RegTree>,
    pub tree_groups: Vec<usize>,
    pub tree_weights: Vec<f32>,
    pub iteration_indptr: Vec<usize>,
    pub num_groups: usize,
    pub num_feature: usize,
    pub feature_names: Vec<String>,
    pub version: Option<[u32; 3]>,
}

/// A loaded, validated tree ensemble.
#[derive(Debug, Clone)]
pub struct Booster {
    format: ModelFormat,
    booster_name: String,
    objective: Objective,
    base_score: f32,
    base_margin: f32,
    trees: Vec<RegTree>,
    tree_groups: Vec<usize>,
    tree_weights: Vec<f32>,
    iteration_indptr: Vec<usize>,
    num_groups: usize,
    num_feature: usize,
    feature_names: Vec<String>,
    version: Option<[u32; 3]>,
}

impl Booster {
    /// Load a model file, detecting its encoding from the contents.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_path_with(path, &DumpOptions::default())
    }

    /// Load a model file; `options` applies only when it is a text dump.
    pub fn from_path_with(path: &Path, options: &DumpOptions) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ModelNotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = fs::read(path)?;
        let booster = Self::from_slice(&bytes, options).map_err(|err| match err {
            Error::UnsupportedModelFormat { origin: None } => Error::UnsupportedModelFormat {
                origin: Some(path.to_path_buf()),
            },
            other => other,
        })?;
        debug!(
            path = %path.display(),
            format = %booster.format,
            objective = %booster.objective,
            trees = booster.trees.len(),
            "loaded booster"
        );
        Ok(booster)
    }

    /// Decode a model from memory.
    ///
    /// The encoding is detected from the leading bytes: `{` followed by a
    /// UBJSON marker is UBJSON, any other `{` is JSON, `booster[` starts a
    /// text dump, and everything else is tried as a legacy binary model.
    pub fn from_slice(bytes: &[u8], options: &DumpOptions) -> Result<Self> {
        if ubjson::looks_like_ubjson(bytes) {
            return json::decode_ubjson(bytes);
        }
        let start = bytes
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(bytes.len());
        let body = &bytes[start..];

        if body.first() == Some(&b'{') {
            return json::decode(body);
        }
        match std::str::from_utf8(body) {
            Ok(text) if dump::looks_like_dump(text) => dump::decode(text, options),
            _ => legacy::decode(bytes),
        }
    }

    pub(crate) fn assemble(parts: BoosterParts) -> Result<Self> {
        let num_trees = parts.trees.len();
        if parts.tree_groups.len() != num_trees || parts.tree_weights.len() != num_trees {
            return Err(Error::MalformedModel {
                message: "per-tree metadata does not match the number of trees".to_string(),
            });
        }
        let indptr = &parts.iteration_indptr;
        let monotonic = indptr.windows(2).all(|w| w[0] <= w[1]);
        if indptr.first() != Some(&0) || indptr.last() != Some(&num_trees) || !monotonic {
            return Err(Error::MalformedModel {
                message: format!("iteration boundaries {indptr:?} do not cover {num_trees} trees"),
            });
        }

        Ok(Self {
            format: parts.format,
            booster_name: parts.booster_name,
            objective: parts.objective,
            base_score: parts.base_score,
            base_margin: parts.base_margin,
            trees: parts.trees,
            tree_groups: parts.tree_groups,
            tree_weights: parts.tree_weights,
            iteration_indptr: parts.iteration_indptr,
            num_groups: parts.num_groups,
            num_feature: parts.num_feature,
            feature_names: parts.feature_names,
            version: parts.version,
        })
    }

    pub fn format(&self) -> ModelFormat {
        self.format
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Base score as stored in the model (output space).
    pub fn base_score(&self) -> f32 {
        self.base_score
    }

    pub fn trees(&self) -> &[RegTree] {
        &self.trees
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_iterations(&self) -> usize {
        self.iteration_indptr.len() - 1
    }

    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    pub fn num_features(&self) -> usize {
        self.num_feature
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            format: self.format,
            booster: self.booster_name.clone(),
            objective: self.objective.name().to_string(),
            base_score: self.base_score,
            num_trees: self.trees.len(),
            num_iterations: self.num_iterations(),
            num_groups: self.num_groups,
            num_features: self.num_feature,
            max_depth: self.trees.iter().map(RegTree::depth).max().unwrap_or(0),
            total_leaves: self.trees.iter().map(RegTree::num_leaves).sum(),
            feature_names: self.feature_names.clone(),
            version: self.version,
        }
    }

    /// Resolve `[iteration_begin, iteration_end)` into a tree index range.
    fn tree_range(&self, config: &PredictConfig) -> Result<(usize, usize)> {
        let iterations = self.num_iterations();
        let end = if config.iteration_end == 0 {
            iterations
        } else {
            config.iteration_end
        };
        if end > iterations {
            return Err(Error::InvalidPredictConfig {
                message: format!(
                    "iteration_end {end} exceeds the {iterations} iterations in the model"
                ),
            });
        }
        if config.iteration_begin > end || (config.iteration_begin == end && end != 0) {
            return Err(Error::InvalidPredictConfig {
                message: format!(
                    "empty iteration range [{}, {end})",
                    config.iteration_begin
                ),
            });
        }
        Ok((
            self.iteration_indptr[config.iteration_begin],
            self.iteration_indptr[end],
        ))
    }

    /// Score every row of `matrix`.
    ///
    /// # Errors
    ///
    /// Fails when the matrix has more columns than the model has features,
    /// or when the config requests an unsupported prediction type, training
    /// mode, or an out-of-range iteration window. Columns a narrower matrix
    /// lacks are treated as missing.
    pub fn predict(&self, matrix: &FeatureMatrix, config: &PredictConfig) -> Result<Prediction> {
        if config.training {
            return Err(Error::InvalidPredictConfig {
                message: "training-mode prediction is not supported".to_string(),
            });
        }
        let kind = config.prediction_type()?;
        if matrix.cols() > self.num_feature {
            return Err(Error::FeatureCountMismatch {
                expected: self.num_feature,
                actual: matrix.cols(),
            });
        }
        let (tree_begin, tree_end) = self.tree_range(config)?;

        let width = match kind {
            PredictionType::Margin => self.num_groups,
            PredictionType::Value => self.objective.output_width(self.num_groups),
        };
        let mut values = Vec::with_capacity(matrix.rows() * width);
        let mut margins = vec![0.0f32; self.num_groups];

        for row in matrix.iter_rows() {
            margins.fill(self.base_margin);
            for t in tree_begin..tree_end {
                margins[self.tree_groups[t]] +=
                    self.tree_weights[t] * self.trees[t].leaf_value(row, matrix);
            }
            match kind {
                PredictionType::Margin => values.extend_from_slice(&margins),
                PredictionType::Value => self.objective.transform_row(&margins, &mut values),
            }
        }

        let shape = if config.strict_shape || width > 1 {
            vec![matrix.rows(), width]
        } else {
            vec![matrix.rows()]
        };
        debug!(rows = matrix.rows(), trees = tree_end - tree_begin, "predicted");

        Ok(Prediction { shape, values })
    }
}

impl Predict for Booster {
    fn predict(&self, matrix: &FeatureMatrix, config: &PredictConfig) -> Result<Prediction> {
        Booster::predict(self, matrix, config)
    }

    fn num_features(&self) -> usize {
        self.num_feature
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_round_model() -> Booster {
        Booster::assemble(BoosterParts {
            format: ModelFormat::Json,
            booster_name: "gbtree".to_string(),
            objective: Objective::from_name("reg:squarederror").unwrap(),
            base_score: 1.0,
            base_margin: 1.0,
            trees: vec![
                tree::stump(0, 0.5, -1.0, 1.0, true),
                tree::stump(0, 0.5, 10.0, 20.0, false),
            ],
            tree_groups: vec![0, 0],
            tree_weights: vec![1.0, 1.0],
            iteration_indptr: vec![0, 1, 2],
            num_groups: 1,
            num_feature: 1,
            feature_names: Vec::new(),
            version: None,
        })
        .expect("valid parts")
    }

    #[test]
    fn sums_all_iterations_by_default() {
        let booster = two_round_model();
        let m = FeatureMatrix::from_dense(&[0.1, 0.9], 2, 1, f32::NAN).unwrap();
        let p = booster.predict(&m, &PredictConfig::default()).unwrap();
        assert_eq!(p.shape, vec![2]);
        assert_eq!(p.values, vec![1.0 - 1.0 + 10.0, 1.0 + 1.0 + 20.0]);
    }

    #[test]
    fn honours_iteration_window() {
        let booster = two_round_model();
        let m = FeatureMatrix::from_row(&[0.1], f32::NAN);
        let config = PredictConfig {
            iteration_begin: 1,
            iteration_end: 2,
            ..PredictConfig::default()
        };
        assert_eq!(booster.predict(&m, &config).unwrap().values, vec![11.0]);

        let first_only = PredictConfig {
            iteration_end: 1,
            ..PredictConfig::default()
        };
        assert_eq!(booster.predict(&m, &first_only).unwrap().values, vec![0.0]);

        let too_far = PredictConfig {
            iteration_end: 3,
            ..PredictConfig::default()
        };
        assert!(booster.predict(&m, &too_far).is_err());
    }

    #[test]
    fn strict_shape_keeps_group_axis() {
        let booster = two_round_model();
        let m = FeatureMatrix::from_row(&[0.1], f32::NAN);
        let config = PredictConfig {
            strict_shape: true,
            ..PredictConfig::default()
        };
        assert_eq!(booster.predict(&m, &config).unwrap().shape, vec![1, 1]);
    }

    #[test]
    fn parses_xgboost_config_string() {
        let config = PredictConfig::from_json(
            r#"{"training": false, "type": 0, "iteration_begin": 0,
                "iteration_end": 0, "strict_shape": false}"#,
        )
        .unwrap();
        assert_eq!(config, PredictConfig::default());
        assert_eq!(config.prediction_type().unwrap(), PredictionType::Value);
    }

    #[test]
    fn rejects_unsupported_requests() {
        let booster = two_round_model();
        let m = FeatureMatrix::from_row(&[0.1], f32::NAN);
        let contribs = PredictConfig {
            kind: 2,
            ..PredictConfig::default()
        };
        assert!(matches!(
            booster.predict(&m, &contribs),
            Err(Error::InvalidPredictConfig { .. })
        ));
        let training = PredictConfig {
            training: true,
            ..PredictConfig::default()
        };
        assert!(booster.predict(&m, &training).is_err());
    }

    #[test]
    fn rejects_matrix_wider_than_model() {
        let booster = two_round_model();
        let m = FeatureMatrix::from_dense(&[0.1, 0.1], 1, 2, f32::NAN).unwrap();
        match booster.predict(&m, &PredictConfig::default()) {
            Err(Error::FeatureCountMismatch { expected, actual }) => {
                assert_eq!((expected, actual), (1, 2))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn absent_columns_read_as_missing() {
        let booster = two_round_model();
        let m = FeatureMatrix::from_dense(&[], 1, 0, f32::NAN).unwrap();
        // Default directions: left (-1) in the first tree, right (20) in the second.
        let p = booster.predict(&m, &PredictConfig::default()).unwrap();
        assert_eq!(p.values, vec![1.0 - 1.0 + 20.0]);
    }

    #[test]
    fn unknown_bytes_are_unsupported() {
        let err = Booster::from_slice(b"binf\x00\x01", &DumpOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedModelFormat { origin: None }));
        let text = Booster::from_slice(b"not a model", &DumpOptions::default()).unwrap_err();
        assert!(matches!(text, Error::UnsupportedModelFormat { origin: None }));
    }
}
