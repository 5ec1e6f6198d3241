//! Learning objectives and their output transforms.

use std::fmt;

use crate::error::{Error, Result};

/// How raw margins are turned into prediction values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTransform {
    Identity,
    Sigmoid,
    Exp,
    /// Per-row softmax over output groups (`multi:softprob`).
    Softprob,
    /// Per-row argmax over output groups, emitted as the class index.
    Softmax,
    /// 1.0 for positive margins, 0.0 otherwise.
    Hinge,
}

/// Inverse link applied to `base_score` when a model is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BaseLink {
    Identity,
    Logit,
    Log,
}

/// A named objective with its output transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Objective {
    name: String,
    transform: OutputTransform,
    base_link: BaseLink,
}

impl Objective {
    /// Look up an objective by its XGBoost name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedObjective`] for names with no known
    /// transform.
    pub fn from_name(name: &str) -> Result<Self> {
        use BaseLink as L;
        use OutputTransform as T;

        let (transform, base_link) = match name {
            "reg:squarederror" | "reg:linear" | "reg:squaredlogerror" | "reg:pseudohubererror"
            | "reg:absoluteerror" | "reg:quantileerror" => (T::Identity, L::Identity),
            "rank:pairwise" | "rank:ndcg" | "rank:map" => (T::Identity, L::Identity),
            "reg:logistic" | "binary:logistic" => (T::Sigmoid, L::Logit),
            "binary:logitraw" => (T::Identity, L::Logit),
            "binary:hinge" => (T::Hinge, L::Identity),
            "count:poisson" | "reg:gamma" | "reg:tweedie" | "survival:cox" | "survival:aft" => {
                (T::Exp, L::Log)
            }
            "multi:softprob" => (T::Softprob, L::Identity),
            "multi:softmax" => (T::Softmax, L::Identity),
            other => {
                return Err(Error::UnsupportedObjective {
                    name: other.to_string(),
                })
            }
        };

        Ok(Self {
            name: name.to_string(),
            transform,
            base_link,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transform(&self) -> OutputTransform {
        self.transform
    }

    /// Convert a `base_score` stored in output space into margin space.
    pub fn base_margin(&self, base_score: f32) -> Result<f32> {
        match self.base_link {
            BaseLink::Identity => Ok(base_score),
            BaseLink::Logit => {
                if !(base_score > 0.0 && base_score < 1.0) {
                    return Err(Error::MalformedModel {
                        message: format!(
                            "base_score {base_score} must lie in (0, 1) for {}",
                            self.name
                        ),
                    });
                }
                Ok(-(1.0 / base_score - 1.0).ln())
            }
            BaseLink::Log => {
                if base_score <= 0.0 {
                    return Err(Error::MalformedModel {
                        message: format!(
                            "base_score {base_score} must be positive for {}",
                            self.name
                        ),
                    });
                }
                Ok(base_score.ln())
            }
        }
    }

    /// Number of values emitted per row for `groups` margins.
    pub fn output_width(&self, groups: usize) -> usize {
        match self.transform {
            OutputTransform::Softmax => 1,
            _ => groups,
        }
    }

    /// Transform one row of margins and append the results to `out`.
    pub fn transform_row(&self, margins: &[f32], out: &mut Vec<f32>) {
        match self.transform {
            OutputTransform::Identity => out.extend_from_slice(margins),
            OutputTransform::Sigmoid => {
                out.extend(margins.iter().map(|m| 1.0 / (1.0 + (-m).exp())))
            }
            OutputTransform::Exp => out.extend(margins.iter().map(|m| m.exp())),
            OutputTransform::Hinge => {
                out.extend(margins.iter().map(|&m| if m > 0.0 { 1.0 } else { 0.0 }))
            }
            OutputTransform::Softprob => {
                let max = margins.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let start = out.len();
                out.extend(margins.iter().map(|m| (m - max).exp()));
                let sum: f32 = out[start..].iter().sum();
                for p in &mut out[start..] {
                    *p /= sum;
                }
            }
            OutputTransform::Softmax => {
                let mut best = 0;
                for (i, m) in margins.iter().enumerate() {
                    if *m > margins[best] {
                        best = i;
                    }
                }
                out.push(best as f32);
            }
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
