//! Cooling and heating function predictions from gradient-boosted trees.
//!
//! This crate loads XGBoost tree ensembles trained on `log10` of the gas
//! cooling (CF) and heating (HF) functions, scales physical conditions into
//! the model's feature space, and returns `10^prediction`. Higher-level
//! consumers (the `mlchf` CLI) should only depend on the items exported here
//! instead of reimplementing behavior.
//!

pub mod booster;
pub mod chf;
pub mod config;
pub mod error;
pub mod features;
pub mod matrix;
pub mod model_set;
pub mod sweep;

pub use booster::{
    Booster, DumpOptions, ModelFormat, ModelSummary, Predict, PredictConfig, Prediction,
    PredictionType,
};
pub use chf::{load_booster, ChfModels, ChfRates, LogRates, RateKind, RateModel};
pub use config::{ModelOptions, ModelSource, RateSource, DEFAULT_LABEL};
pub use error::{Error, Result};
pub use features::{scale_features, FeatureRange, FeatureScaling, PhysicalConditions};
pub use matrix::FeatureMatrix;
pub use model_set::{LabeledRates, Manifest, ModelSet};
pub use sweep::{run_single_sweep, run_sweep, SweepRow, TemperatureSweep, MAX_SWEEP_POINTS};
