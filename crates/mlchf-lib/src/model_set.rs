//! Collections of labelled cooling/heating model pairs.
//!
//! Training runs write one directory per rate and configuration:
//!
//! ```text
//! all_data/
//! ├── CF_Z_0/trained_model.txt
//! ├── HF_Z_0/trained_model.txt
//! ├── CF_Z_1/trained_model.txt
//! └── HF_Z_1/trained_model.txt
//! ```
//!
//! [`ModelSet::from_dir`] discovers that layout; [`ModelSet::from_manifest`]
//! reads an explicit JSON listing instead.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::booster::{Booster, Predict};
use crate::chf::{ChfModels, ChfRates, RateKind, RateModel};
use crate::error::{Error, Result};
use crate::features::{FeatureScaling, PhysicalConditions};

/// File names looked for inside each `CF_<label>` / `HF_<label>` directory,
/// in order.
pub const MODEL_FILENAMES: [&str; 3] = [
    "trained_model.txt",
    "trained_model.json",
    "trained_model.ubj",
];

/// Cooling and heating model files for one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelPaths {
    pub label: String,
    pub cooling: PathBuf,
    pub heating: PathBuf,
}

/// JSON manifest listing model pairs.
///
/// ```json
/// {"models": [{"label": "Z_0", "cooling": "CF_Z_0/trained_model.txt",
///              "heating": "HF_Z_0/trained_model.txt"}]}
/// ```
///
/// Relative paths resolve against the manifest's directory.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub models: Vec<ManifestEntry>,
}

impl Manifest {
    /// Read a manifest and resolve its model paths against its directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelNotFound`] if `path` is not a file and
    /// [`Error::EmptyModelSet`] if it lists no models.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ModelNotFound {
                path: path.to_path_buf(),
            });
        }
        let mut manifest: Manifest = serde_json::from_slice(&fs::read(path)?)?;
        if manifest.models.is_empty() {
            return Err(Error::EmptyModelSet {
                path: path.to_path_buf(),
            });
        }
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for entry in &mut manifest.models {
            entry.cooling = base.join(&entry.cooling);
            entry.heating = base.join(&entry.heating);
        }
        Ok(manifest)
    }

    /// First entry registered under `label`.
    pub fn entry(&self, label: &str) -> Result<&ManifestEntry> {
        self.models
            .iter()
            .find(|entry| entry.label == label)
            .ok_or_else(|| Error::UnknownLabel {
                label: label.to_string(),
                available: self.models.iter().map(|e| e.label.clone()).collect(),
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub label: String,
    pub cooling: PathBuf,
    pub heating: PathBuf,
    /// Overrides the default feature scaling for this pair.
    #[serde(default)]
    pub scaling: Option<FeatureScaling>,
}

impl ManifestEntry {
    pub fn model_path(&self, kind: RateKind) -> &Path {
        match kind {
            RateKind::Cooling => &self.cooling,
            RateKind::Heating => &self.heating,
        }
    }

    /// Feature scaling for this pair, falling back to the default ranges.
    pub fn feature_scaling(&self) -> FeatureScaling {
        self.scaling.unwrap_or_default()
    }

    /// Load both models with the entry's scaling.
    pub fn load(&self) -> Result<ChfModels> {
        Ok(ChfModels::load(&self.cooling, &self.heating)?.with_scaling(self.feature_scaling()))
    }

    /// Load the model for one rate with the entry's scaling.
    pub fn load_rate(&self, kind: RateKind) -> Result<RateModel> {
        Ok(RateModel::load(kind, self.model_path(kind))?.with_scaling(self.feature_scaling()))
    }
}

/// Rates for one label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledRates {
    pub label: String,
    #[serde(flatten)]
    pub rates: ChfRates,
}

/// Locate the model file inside a `CF_<label>` or `HF_<label>` directory.
pub fn find_model_file(dir: &Path) -> Option<PathBuf> {
    MODEL_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Path of the model directory for `kind` and `label` under `root`.
pub fn rate_dir(root: &Path, kind: RateKind, label: &str) -> PathBuf {
    root.join(format!("{}_{}", kind.prefix(), label))
}

/// Find every label under `root` that has both a cooling and a heating model.
///
/// Labels with only one half are skipped with a warning.
pub fn discover_model_pairs(root: &Path) -> Result<Vec<ModelPaths>> {
    if !root.is_dir() {
        return Err(Error::ModelNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut halves: BTreeMap<String, (Option<PathBuf>, Option<PathBuf>)> = BTreeMap::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let (kind, label) = if let Some(label) = name.strip_prefix("CF_") {
            (RateKind::Cooling, label)
        } else if let Some(label) = name.strip_prefix("HF_") {
            (RateKind::Heating, label)
        } else {
            continue;
        };
        let Some(file) = find_model_file(&entry.path()) else {
            warn!(dir = %entry.path().display(), "no model file in directory; skipping");
            continue;
        };
        let slot = halves.entry(label.to_string()).or_default();
        match kind {
            RateKind::Cooling => slot.0 = Some(file),
            RateKind::Heating => slot.1 = Some(file),
        }
    }

    let mut pairs = Vec::new();
    for (label, halves) in halves {
        match halves {
            (Some(cooling), Some(heating)) => pairs.push(ModelPaths {
                label,
                cooling,
                heating,
            }),
            (cooling, _) => {
                let missing = if cooling.is_none() {
                    RateKind::Cooling
                } else {
                    RateKind::Heating
                };
                warn!(%label, %missing, "incomplete model pair; skipping");
            }
        }
    }

    if pairs.is_empty() {
        return Err(Error::EmptyModelSet {
            path: root.to_path_buf(),
        });
    }
    Ok(pairs)
}

/// Labelled CHF model pairs, iterated in label order.
#[derive(Debug, Clone)]
pub struct ModelSet<P = Booster> {
    models: BTreeMap<String, ChfModels<P>>,
}

impl<P> Default for ModelSet<P> {
    fn default() -> Self {
        Self {
            models: BTreeMap::new(),
        }
    }
}

impl ModelSet<Booster> {
    /// Load every complete pair found under `root`.
    pub fn from_dir(root: &Path) -> Result<Self> {
        let mut set = Self::default();
        for pair in discover_model_pairs(root)? {
            debug!(label = %pair.label, "loading model pair");
            let models = ChfModels::load(&pair.cooling, &pair.heating)?;
            set.insert(pair.label, models)?;
        }
        Ok(set)
    }

    /// Load the pairs listed in a JSON manifest.
    pub fn from_manifest(path: &Path) -> Result<Self> {
        let manifest = Manifest::from_path(path)?;
        let mut set = Self::default();
        for entry in manifest.models {
            let models = entry.load()?;
            set.insert(entry.label, models)?;
        }
        Ok(set)
    }
}

impl<P: Predict> ModelSet<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair under `label`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateLabel`] if the label is already present.
    pub fn insert(&mut self, label: String, models: ChfModels<P>) -> Result<()> {
        if self.models.contains_key(&label) {
            return Err(Error::DuplicateLabel { label });
        }
        self.models.insert(label, models);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    pub fn get(&self, label: &str) -> Result<&ChfModels<P>> {
        self.models.get(label).ok_or_else(|| Error::UnknownLabel {
            label: label.to_string(),
            available: self.models.keys().cloned().collect(),
        })
    }

    /// Take the pair for `label` out of the set.
    pub fn take(mut self, label: &str) -> Result<ChfModels<P>> {
        match self.models.remove(label) {
            Some(models) => Ok(models),
            None => Err(Error::UnknownLabel {
                label: label.to_string(),
                available: self.models.into_keys().collect(),
            }),
        }
    }

    pub fn evaluate(&self, label: &str, conditions: &PhysicalConditions) -> Result<ChfRates> {
        self.get(label)?.evaluate(conditions)
    }

    /// Evaluate every pair at the same conditions, in label order.
    pub fn evaluate_all(&self, conditions: &PhysicalConditions) -> Result<Vec<LabeledRates>> {
        self.models
            .iter()
            .map(|(label, models)| -> Result<LabeledRates> {
                Ok(LabeledRates {
                    label: label.clone(),
                    rates: models.evaluate(conditions)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chf::test_support::{constant, LinearPredictor};

    fn pair(cooling: f32, heating: f32) -> ChfModels<LinearPredictor> {
        ChfModels::new(constant(cooling), constant(heating)).unwrap()
    }

    #[test]
    fn evaluates_all_labels_in_order() {
        let mut set = ModelSet::new();
        set.insert("Z_1".to_string(), pair(-22.0, -23.0)).unwrap();
        set.insert("Z_0".to_string(), pair(-21.0, -24.0)).unwrap();
        assert_eq!(set.labels(), vec!["Z_0", "Z_1"]);

        let all = set.evaluate_all(&PhysicalConditions::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].label, "Z_0");
        assert!((all[0].rates.cooling.log10() + 21.0).abs() < 1e-6);
        assert!((all[1].rates.heating.log10() + 23.0).abs() < 1e-6);
    }

    #[test]
    fn unknown_label_lists_available() {
        let mut set = ModelSet::new();
        set.insert("Z_0".to_string(), pair(0.0, 0.0)).unwrap();
        match set.evaluate("Z_9", &PhysicalConditions::default()) {
            Err(Error::UnknownLabel { label, available }) => {
                assert_eq!(label, "Z_9");
                assert_eq!(available, vec!["Z_0".to_string()]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn take_removes_the_pair() {
        let mut set = ModelSet::new();
        set.insert("Z_0".to_string(), pair(-21.0, -24.0)).unwrap();
        let models = set.take("Z_0").unwrap();
        let rates = models.evaluate(&PhysicalConditions::default()).unwrap();
        assert!((rates.heating.log10() + 24.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_duplicate_labels() {
        let mut set = ModelSet::new();
        set.insert("Z_0".to_string(), pair(0.0, 0.0)).unwrap();
        assert!(matches!(
            set.insert("Z_0".to_string(), pair(1.0, 1.0)),
            Err(Error::DuplicateLabel { .. })
        ));
    }

    #[test]
    fn rate_dir_follows_training_layout() {
        let dir = rate_dir(Path::new("/models/all_data"), RateKind::Heating, "Z_0");
        assert_eq!(dir, PathBuf::from("/models/all_data/HF_Z_0"));
    }

    #[test]
    fn manifest_scaling_is_optional() {
        let json = r#"{"models": [{"label": "Z_0", "cooling": "a.txt", "heating": "b.txt"}]}"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.models.len(), 1);
        assert!(manifest.models[0].scaling.is_none());
        assert_eq!(manifest.models[0].feature_scaling(), FeatureScaling::default());
        assert_eq!(
            manifest.models[0].model_path(RateKind::Heating),
            Path::new("b.txt")
        );
    }

    #[test]
    fn manifest_entry_lookup_lists_labels() {
        let json = r#"{"models": [{"label": "Z_0", "cooling": "a.txt", "heating": "b.txt"}]}"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert!(manifest.entry("Z_0").is_ok());
        match manifest.entry("Z_1") {
            Err(Error::UnknownLabel { available, .. }) => assert_eq!(available, vec!["Z_0"]),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
