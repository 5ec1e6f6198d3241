//! Cooling and heating function evaluation.
//!
//! The boosters are trained on `log10` of the rates, so every prediction is
//! exponentiated before it is returned:
//!
//! ```text
//! conditions -> scale_features -> 1x6 matrix (missing = 0) -> predict -> 10^log
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::booster::{Booster, DumpOptions, Predict, PredictConfig};
use crate::error::{Error, Result};
use crate::features::{
    scale_features, FeatureScaling, FeatureVector, PhysicalConditions, FEATURE_NAMES,
    NUM_FEATURES,
};
use crate::matrix::FeatureMatrix;

/// Missing-value sentinel for CHF feature matrices. An exact `0.0` feature is
/// routed down each split's default branch.
pub const MISSING_SENTINEL: f32 = 0.0;

/// Which of the two rates a model predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateKind {
    Cooling,
    Heating,
}

impl RateKind {
    /// Directory prefix used by the training layout (`CF_Z_0`, `HF_Z_0`).
    pub fn prefix(self) -> &'static str {
        match self {
            RateKind::Cooling => "CF",
            RateKind::Heating => "HF",
        }
    }
}

impl fmt::Display for RateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            RateKind::Cooling => "cooling",
            RateKind::Heating => "heating",
        };
        f.write_str(value)
    }
}

/// Cooling and heating rates at one set of conditions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChfRates {
    pub cooling: f64,
    pub heating: f64,
}

/// Raw model outputs, before exponentiation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LogRates {
    pub log_cooling: f32,
    pub log_heating: f32,
}

impl LogRates {
    pub fn rates(&self) -> ChfRates {
        ChfRates {
            cooling: exp10(self.log_cooling),
            heating: exp10(self.log_heating),
        }
    }
}

pub(crate) fn exp10(log: f32) -> f64 {
    10f64.powf(f64::from(log))
}

/// Options for text-dump models, which name the CHF features directly.
fn chf_dump_options() -> DumpOptions {
    DumpOptions {
        num_feature: Some(NUM_FEATURES),
        feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
        ..DumpOptions::default()
    }
}

/// Load a booster for one rate.
pub fn load_booster(path: &Path) -> Result<Booster> {
    Booster::from_path_with(path, &chf_dump_options())
}

/// The CHF matrix always has six columns, which a model must cover.
fn check_width<P: Predict>(predictor: &P) -> Result<()> {
    if predictor.num_features() < NUM_FEATURES {
        return Err(Error::FeatureCountMismatch {
            expected: predictor.num_features(),
            actual: NUM_FEATURES,
        });
    }
    Ok(())
}

fn feature_matrix(features: &FeatureVector) -> FeatureMatrix {
    FeatureMatrix::from_row(features, MISSING_SENTINEL)
}

fn predict_one<P: Predict>(
    predictor: &P,
    matrix: &FeatureMatrix,
    config: &PredictConfig,
) -> Result<f32> {
    predictor
        .predict(matrix, config)?
        .first()
        .ok_or_else(|| Error::MalformedModel {
            message: "prediction returned no values".to_string(),
        })
}

/// A single-rate model: one booster plus its feature scaling.
#[derive(Debug, Clone)]
pub struct RateModel<P = Booster> {
    kind: RateKind,
    predictor: P,
    scaling: FeatureScaling,
    config: PredictConfig,
}

impl RateModel<Booster> {
    pub fn load(kind: RateKind, path: &Path) -> Result<Self> {
        Self::new(kind, load_booster(path)?)
    }
}

impl<P: Predict> RateModel<P> {
    pub fn new(kind: RateKind, predictor: P) -> Result<Self> {
        check_width(&predictor)?;
        Ok(Self {
            kind,
            predictor,
            scaling: FeatureScaling::default(),
            config: PredictConfig::default(),
        })
    }

    #[must_use]
    pub fn with_scaling(mut self, scaling: FeatureScaling) -> Self {
        self.scaling = scaling;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: PredictConfig) -> Self {
        self.config = config;
        self
    }

    pub fn kind(&self) -> RateKind {
        self.kind
    }

    pub fn predictor(&self) -> &P {
        &self.predictor
    }

    /// `log10` of the rate at `conditions`.
    pub fn evaluate_log(&self, conditions: &PhysicalConditions) -> Result<f32> {
        let features = scale_features(conditions, &self.scaling)?;
        predict_one(&self.predictor, &feature_matrix(&features), &self.config)
    }

    pub fn evaluate(&self, conditions: &PhysicalConditions) -> Result<f64> {
        self.evaluate_log(conditions).map(exp10)
    }
}

/// A cooling/heating model pair sharing one feature scaling.
#[derive(Debug, Clone)]
pub struct ChfModels<P = Booster> {
    cooling: P,
    heating: P,
    scaling: FeatureScaling,
    config: PredictConfig,
}

impl ChfModels<Booster> {
    /// Load the cooling and heating boosters from their model files.
    pub fn load(cooling_path: &Path, heating_path: &Path) -> Result<Self> {
        let cooling = load_booster(cooling_path)?;
        let heating = load_booster(heating_path)?;
        debug!(
            cooling = %cooling_path.display(),
            heating = %heating_path.display(),
            "loaded CHF model pair"
        );
        Self::new(cooling, heating)
    }
}

impl<P: Predict> ChfModels<P> {
    pub fn new(cooling: P, heating: P) -> Result<Self> {
        check_width(&cooling)?;
        check_width(&heating)?;
        Ok(Self {
            cooling,
            heating,
            scaling: FeatureScaling::default(),
            config: PredictConfig::default(),
        })
    }

    #[must_use]
    pub fn with_scaling(mut self, scaling: FeatureScaling) -> Self {
        self.scaling = scaling;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: PredictConfig) -> Self {
        self.config = config;
        self
    }

    pub fn scaling(&self) -> &FeatureScaling {
        &self.scaling
    }

    pub fn cooling(&self) -> &P {
        &self.cooling
    }

    pub fn heating(&self) -> &P {
        &self.heating
    }

    /// Raw `log10` outputs of both models for one set of conditions.
    pub fn evaluate_log(&self, conditions: &PhysicalConditions) -> Result<LogRates> {
        let features = scale_features(conditions, &self.scaling)?;
        let matrix = feature_matrix(&features);
        Ok(LogRates {
            log_cooling: predict_one(&self.cooling, &matrix, &self.config)?,
            log_heating: predict_one(&self.heating, &matrix, &self.config)?,
        })
    }

    pub fn evaluate(&self, conditions: &PhysicalConditions) -> Result<ChfRates> {
        self.evaluate_log(conditions).map(|log| log.rates())
    }

    /// Split the pair into single-rate models.
    pub fn into_rate_models(self) -> (RateModel<P>, RateModel<P>) {
        let make = |kind, predictor| RateModel {
            kind,
            predictor,
            scaling: self.scaling,
            config: self.config,
        };
        (
            make(RateKind::Cooling, self.cooling),
            make(RateKind::Heating, self.heating),
        )
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn exponentiates_log_outputs() {
        let models = ChfModels::new(constant(-23.0), constant(-25.0)).unwrap();
        let rates = models.evaluate(&PhysicalConditions::default()).unwrap();
        assert!((rates.cooling / 1.0e-23 - 1.0).abs() < 1e-9);
        assert!((rates.heating / 1.0e-25 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn models_see_scaled_features() {
        // Only the temperature feature contributes.
        let t_only = LinearPredictor {
            offset: 0.0,
            weights: vec![8.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        };
        let models = ChfModels::new(t_only.clone(), t_only).unwrap();
        let conditions = PhysicalConditions::default().with_temperature(1.0e5);
        let log = models.evaluate_log(&conditions).unwrap();
        // (5 - 1) / 8 * 8
        assert!((log.log_cooling - 4.0).abs() < 1e-5);
        assert_eq!(log.log_cooling, log.log_heating);
    }

    #[test]
    fn invalid_conditions_fail_before_prediction() {
        let models = ChfModels::new(constant(0.0), constant(0.0)).unwrap();
        let bad = PhysicalConditions {
            hydrogen_density: -1.0,
            ..PhysicalConditions::default()
        };
        assert!(matches!(
            models.evaluate(&bad),
            Err(Error::InvalidInput {
                name: "hydrogen_density",
                ..
            })
        ));
    }

    #[test]
    fn rejects_predictor_narrower_than_feature_vector() {
        let narrow = LinearPredictor {
            offset: 0.0,
            weights: vec![1.0; NUM_FEATURES - 1],
        };
        match RateModel::new(RateKind::Cooling, narrow) {
            Err(Error::FeatureCountMismatch { expected, actual }) => {
                assert_eq!((expected, actual), (NUM_FEATURES - 1, NUM_FEATURES))
            }
            other => panic!("unexpected result: {:?}", other.map(|m| m.kind())),
        }
    }

    #[test]
    fn accepts_predictor_wider_than_feature_vector() {
        let wide = LinearPredictor {
            offset: -2.0,
            weights: vec![0.0; NUM_FEATURES + 2],
        };
        let model = RateModel::new(RateKind::Heating, wide).unwrap();
        assert!((model.evaluate(&PhysicalConditions::default()).unwrap() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn split_pair_keeps_kind() {
        let models = ChfModels::new(constant(-1.0), constant(-2.0)).unwrap();
        let (cooling, heating) = models.into_rate_models();
        assert_eq!(cooling.kind(), RateKind::Cooling);
        assert_eq!(heating.kind(), RateKind::Heating);
        let c = PhysicalConditions::default();
        assert!((heating.evaluate(&c).unwrap() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn rate_kind_prefixes_match_training_layout() {
        assert_eq!(RateKind::Cooling.prefix(), "CF");
        assert_eq!(RateKind::Heating.prefix(), "HF");
        assert_eq!(RateKind::Heating.to_string(), "heating");
    }
}
