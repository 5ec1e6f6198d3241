//! Temperature sweeps over decades of `log10 T`.

use serde::{Deserialize, Serialize};

use crate::booster::Predict;
use crate::chf::{ChfModels, ChfRates, RateKind, RateModel};
use crate::error::{Error, Result};
use crate::features::PhysicalConditions;

/// Largest number of points a sweep may produce.
pub const MAX_SWEEP_POINTS: usize = 1_000_000;

/// Half-open sweep `[start, end)` in `log10 T`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSweep {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl Default for TemperatureSweep {
    fn default() -> Self {
        Self {
            start: 1.0,
            end: 9.0,
            step: 0.1,
        }
    }
}

/// One sweep position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepPoint {
    /// `log10 T`
    pub alt: f64,
    /// `10^alt` (K)
    pub temperature: f64,
}

impl TemperatureSweep {
    pub fn new(start: f64, end: f64, step: f64) -> Result<Self> {
        let sweep = Self { start, end, step };
        sweep.validate()?;
        Ok(sweep)
    }

    fn validate(&self) -> Result<()> {
        if !(self.start.is_finite() && self.end.is_finite()) {
            return Err(Error::InvalidSweep {
                message: format!("bounds must be finite (got {} .. {})", self.start, self.end),
            });
        }
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(Error::InvalidSweep {
                message: format!("step must be positive (got {})", self.step),
            });
        }
        if self.end < self.start {
            return Err(Error::InvalidSweep {
                message: format!("end {} is below start {}", self.end, self.start),
            });
        }
        let span = (self.end - self.start) / self.step;
        if span > MAX_SWEEP_POINTS as f64 {
            return Err(Error::InvalidSweep {
                message: format!(
                    "step {} over {} .. {} gives more than {MAX_SWEEP_POINTS} points",
                    self.step, self.start, self.end
                ),
            });
        }
        Ok(())
    }

    /// Number of points with `start + i * step < end`.
    ///
    /// A point within `1e-9` steps of `end` is excluded so that round-off in
    /// `(end - start) / step` never adds a spurious final row. Never exceeds
    /// [`MAX_SWEEP_POINTS`].
    pub fn len(&self) -> usize {
        let span = (self.end - self.start) / self.step;
        if span.is_nan() || span <= 0.0 {
            return 0;
        }
        (span - 1.0e-9).ceil().min(MAX_SWEEP_POINTS as f64) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn points(&self) -> impl Iterator<Item = SweepPoint> + '_ {
        (0..self.len()).map(move |i| {
            let alt = self.start + i as f64 * self.step;
            SweepPoint {
                alt,
                temperature: 10f64.powf(alt),
            }
        })
    }
}

/// One evaluated sweep row. Rates not requested are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepRow {
    pub alt: f64,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooling: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heating: Option<f64>,
}

/// Evaluate both rates across the sweep.
///
/// Stops at the first failing point.
pub fn run_sweep<P: Predict>(
    models: &ChfModels<P>,
    base: &PhysicalConditions,
    sweep: &TemperatureSweep,
) -> Result<Vec<SweepRow>> {
    sweep.validate()?;
    sweep
        .points()
        .map(|point| -> Result<SweepRow> {
            let ChfRates { cooling, heating } =
                models.evaluate(&base.with_temperature(point.temperature))?;
            Ok(SweepRow {
                alt: point.alt,
                temperature: point.temperature,
                cooling: Some(cooling),
                heating: Some(heating),
            })
        })
        .collect()
}

/// Evaluate a single rate across the sweep.
pub fn run_single_sweep<P: Predict>(
    model: &RateModel<P>,
    base: &PhysicalConditions,
    sweep: &TemperatureSweep,
) -> Result<Vec<SweepRow>> {
    sweep.validate()?;
    sweep
        .points()
        .map(|point| -> Result<SweepRow> {
            let rate = model.evaluate(&base.with_temperature(point.temperature))?;
            let (cooling, heating) = match model.kind() {
                RateKind::Cooling => (Some(rate), None),
                RateKind::Heating => (None, Some(rate)),
            };
            Ok(SweepRow {
                alt: point.alt,
                temperature: point.temperature,
                cooling,
                heating,
            })
        })
        .collect()
}
