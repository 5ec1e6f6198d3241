use std::path::PathBuf;

use thiserror::Error;

/// Convenient result alias for the mlchf library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Model file could not be located at the resolved path.
    #[error("model file not found at {path}")]
    ModelNotFound { path: PathBuf },

    /// Raised when the model bytes match none of the supported encodings.
    #[error("unsupported model format{}", format_origin(.origin))]
    UnsupportedModelFormat { origin: Option<PathBuf> },

    /// Raised when a model decoded but its contents are inconsistent.
    #[error("malformed model: {message}")]
    MalformedModel { message: String },

    /// Raised when a model uses an objective with no known output transform.
    #[error("unsupported objective: {name}")]
    UnsupportedObjective { name: String },

    /// Raised for boosters other than tree ensembles (e.g. `gblinear`).
    #[error("unsupported booster: {name}")]
    UnsupportedBooster { name: String },

    /// Raised when a tree contains a categorical or otherwise unknown split.
    #[error("tree {tree} node {node}: unsupported split ({detail})")]
    UnsupportedSplit {
        tree: usize,
        node: usize,
        detail: String,
    },

    /// Raised when the feature matrix has more columns than the model has
    /// features.
    #[error("feature matrix has {actual} columns but the model uses {expected} features")]
    FeatureCountMismatch { expected: usize, actual: usize },

    /// Raised when dense data does not fill the declared matrix shape.
    #[error("matrix data has {len} values, expected {rows} x {cols}")]
    MatrixShape { rows: usize, cols: usize, len: usize },

    /// Raised when a physical input cannot be scaled.
    #[error("invalid physical input {name} = {value}: {reason}")]
    InvalidInput {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// Raised when a prediction request cannot be honoured.
    #[error("invalid prediction config: {message}")]
    InvalidPredictConfig { message: String },

    /// Raised when a temperature sweep has an unusable range or step.
    #[error("invalid sweep: {message}")]
    InvalidSweep { message: String },

    /// Raised when a model set has no entry for the requested label.
    #[error("unknown model label: {label}{}", format_labels(.available))]
    UnknownLabel {
        label: String,
        available: Vec<String>,
    },

    /// Raised when a model directory holds no complete cooling/heating pair.
    #[error("no cooling/heating model pairs found under {path}")]
    EmptyModelSet { path: PathBuf },

    /// Raised when a manifest lists the same label twice.
    #[error("duplicate model label in manifest: {label}")]
    DuplicateLabel { label: String },

    /// Raised when no model path was given and none could be resolved.
    #[error("no {what} configured; {hint}")]
    MissingConfiguration {
        what: &'static str,
        hint: &'static str,
    },

    /// Wrapper for JSON decoding errors (models, manifests, configs).
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn format_origin(origin: &Option<PathBuf>) -> String {
    match origin {
        Some(path) => format!(
            " in {}; expected an XGBoost JSON, UBJSON or binary model, or a text dump",
            path.display()
        ),
        None => "; expected an XGBoost JSON, UBJSON or binary model, or a text dump".to_string(),
    }
}

fn format_labels(available: &[String]) -> String {
    if available.is_empty() {
        String::new()
    } else {
        format!(". Available: {}", available.join(", "))
    }
}
