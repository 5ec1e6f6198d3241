//! Physical inputs and the fixed min-max feature scaling applied to them.
//!
//! Every feature is the base-10 logarithm of a physical quantity (or a ratio
//! of two) mapped onto the training range:
//!
//! ```text
//! feature = (log10(x) - min) / (max - min)
//! ```
//!
//! | # | name    | x             |
//! |---|---------|---------------|
//! | 0 | `t`     | T             |
//! | 1 | `n_h`   | n_H           |
//! | 2 | `q_lw`  | P_LW / n_H    |
//! | 3 | `q_hi`  | P_HI / P_LW   |
//! | 4 | `q_hei` | P_HeI / P_LW  |
//! | 5 | `q_cvi` | P_CVI / P_LW  |

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of model features.
pub const NUM_FEATURES: usize = 6;

/// Feature names in model column order.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = ["t", "n_h", "q_lw", "q_hi", "q_hei", "q_cvi"];

/// Floor for the temperature feature; an exact zero would read as missing.
pub const TEMPERATURE_FEATURE_FLOOR: f32 = 1.0e-30;

/// Scaled model inputs in [`FEATURE_NAMES`] order.
pub type FeatureVector = [f32; NUM_FEATURES];

/// Gas state and radiation field at which the rates are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalConditions {
    /// Gas temperature (K).
    pub temperature: f64,
    /// Hydrogen number density (cm^-3).
    pub hydrogen_density: f64,
    /// Lyman-Werner H2 photo-dissociation rate (s^-1).
    pub p_lw: f64,
    /// HI photo-ionization rate (s^-1).
    pub p_hi: f64,
    /// HeI photo-ionization rate (s^-1).
    pub p_hei: f64,
    /// CVI photo-ionization rate (s^-1).
    pub p_cvi: f64,
}

impl Default for PhysicalConditions {
    /// Reference conditions used by the temperature sweeps.
    fn default() -> Self {
        Self {
            temperature: 1.0e4,
            hydrogen_density: 1.0e-3,
            p_lw: 2.11814e-13,
            p_hi: 1.08928e-13,
            p_hei: 2.76947e-14,
            p_cvi: 1.03070e-17,
        }
    }
}

impl PhysicalConditions {
    #[must_use]
    pub fn with_temperature(self, temperature: f64) -> Self {
        Self {
            temperature,
            ..self
        }
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            ("temperature", self.temperature),
            ("hydrogen_density", self.hydrogen_density),
            ("p_lw", self.p_lw),
            ("p_hi", self.p_hi),
            ("p_hei", self.p_hei),
            ("p_cvi", self.p_cvi),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(Error::InvalidInput {
                    name,
                    value,
                    reason: "must be finite",
                });
            }
            if value <= 0.0 {
                return Err(Error::InvalidInput {
                    name,
                    value,
                    reason: "must be strictly positive",
                });
            }
        }
        Ok(())
    }
}

/// Training range of one feature, in log10 units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange {
    pub min: f64,
    pub max: f64,
}

impl FeatureRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Map `log10(x)` onto the unit interval of the training range.
    pub fn scale(&self, x: f64) -> f64 {
        (x.log10() - self.min) / (self.max - self.min)
    }
}

/// Normalization constants for all six features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaling {
    pub t: FeatureRange,
    pub n_h: FeatureRange,
    pub q_lw: FeatureRange,
    pub q_hi: FeatureRange,
    pub q_hei: FeatureRange,
    pub q_cvi: FeatureRange,
}

impl Default for FeatureScaling {
    /// Ranges of the gh12 rate training set.
    fn default() -> Self {
        Self {
            t: FeatureRange::new(1.0, 9.0),
            n_h: FeatureRange::new(-6.0, 6.0),
            q_lw: FeatureRange::new(-14.940437, -2.822464),
            q_hi: FeatureRange::new(-6.911031, 0.481141),
            q_hei: FeatureRange::new(-5.551412, 0.717863),
            q_cvi: FeatureRange::new(-9.017760, -1.062396),
        }
    }
}

impl FeatureScaling {
    fn validate(&self) -> Result<()> {
        let ranges = [self.t, self.n_h, self.q_lw, self.q_hi, self.q_hei, self.q_cvi];
        for (name, range) in FEATURE_NAMES.into_iter().zip(ranges) {
            if !(range.min.is_finite() && range.max.is_finite()) || range.max <= range.min {
                return Err(Error::InvalidInput {
                    name,
                    value: range.max - range.min,
                    reason: "scaling range must be finite with max > min",
                });
            }
        }
        Ok(())
    }
}

/// Compute the six scaled features for `conditions`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] when any physical quantity is not a finite
/// positive number, or when `scaling` has an empty range.
///
/// # Examples
///
/// ```
/// use mlchf_lib::features::{scale_features, FeatureScaling, PhysicalConditions};
///
/// let conditions = PhysicalConditions::default().with_temperature(1.0e5);
/// let features = scale_features(&conditions, &FeatureScaling::default()).unwrap();
/// assert!((features[0] - 0.5).abs() < 1e-6);
/// assert!((features[1] - 0.25).abs() < 1e-6);
/// ```
pub fn scale_features(
    conditions: &PhysicalConditions,
    scaling: &FeatureScaling,
) -> Result<FeatureVector> {
    conditions.validate()?;
    scaling.validate()?;

    let c = conditions;
    let mut t = scaling.t.scale(c.temperature) as f32;
    if t <= 0.0 {
        t = TEMPERATURE_FEATURE_FLOOR;
    }

    Ok([
        t,
        scaling.n_h.scale(c.hydrogen_density) as f32,
        scaling.q_lw.scale(c.p_lw / c.hydrogen_density) as f32,
        scaling.q_hi.scale(c.p_hi / c.p_lw) as f32,
        scaling.q_hei.scale(c.p_hei / c.p_lw) as f32,
        scaling.q_cvi.scale(c.p_cvi / c.p_lw) as f32,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn reference_conditions_scale_into_unit_range() {
        let f = scale_features(&PhysicalConditions::default(), &FeatureScaling::default())
            .expect("defaults are valid");
        // T = 1e4 -> (4 - 1) / 8
        assert!(close(f[0], 0.375));
        assert!(close(f[1], 0.25));
        // log10(2.11814e-13 / 1e-3) = -9.674045
        assert!(close(f[2], 0.434_593));
        for value in f {
            assert!(value > 0.0 && value < 1.0, "feature {value} outside (0, 1)");
        }
    }

    #[test]
    fn temperature_feature_is_clamped_at_lower_edge() {
        let scaling = FeatureScaling::default();
        let at_edge = PhysicalConditions::default().with_temperature(10.0);
        assert_eq!(scale_features(&at_edge, &scaling).unwrap()[0], TEMPERATURE_FEATURE_FLOOR);

        let below = PhysicalConditions::default().with_temperature(1.0);
        assert_eq!(scale_features(&below, &scaling).unwrap()[0], TEMPERATURE_FEATURE_FLOOR);
    }

    #[test]
    fn other_features_may_leave_unit_range() {
        let dense = PhysicalConditions {
            hydrogen_density: 1.0e8,
            ..PhysicalConditions::default()
        };
        let f = scale_features(&dense, &FeatureScaling::default()).unwrap();
        assert!(f[1] > 1.0);
    }

    #[test]
    fn rejects_non_positive_inputs() {
        let bad = PhysicalConditions {
            p_lw: 0.0,
            ..PhysicalConditions::default()
        };
        match scale_features(&bad, &FeatureScaling::default()) {
            Err(Error::InvalidInput { name, .. }) => assert_eq!(name, "p_lw"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn rejects_nan_temperature() {
        let bad = PhysicalConditions::default().with_temperature(f64::NAN);
        assert!(scale_features(&bad, &FeatureScaling::default()).is_err());
    }

    #[test]
    fn rejects_empty_scaling_range() {
        let scaling = FeatureScaling {
            q_hi: FeatureRange::new(1.0, 1.0),
            ..FeatureScaling::default()
        };
        match scale_features(&PhysicalConditions::default(), &scaling) {
            Err(Error::InvalidInput { name, .. }) => assert_eq!(name, "q_hi"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn scaling_deserializes_from_json() {
        let json = r#"{
            "t": {"min": 2.0, "max": 8.0},
            "n_h": {"min": -6.0, "max": 6.0},
            "q_lw": {"min": -15.0, "max": -3.0},
            "q_hi": {"min": -7.0, "max": 0.5},
            "q_hei": {"min": -5.5, "max": 0.7},
            "q_cvi": {"min": -9.0, "max": -1.0}
        }"#;
        let scaling: FeatureScaling = serde_json::from_str(json).expect("valid scaling");
        assert_eq!(scaling.t, FeatureRange::new(2.0, 8.0));
    }
}
