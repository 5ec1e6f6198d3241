//! Model location resolution.
//!
//! Model files are located in this order:
//! 1. A manifest, which covers both rates.
//! 2. Explicit options (CLI flags).
//! 3. `MLCHF_CF_MODEL` / `MLCHF_HF_MODEL` for individual model files.
//! 4. `MLCHF_MODEL_DIR` for a training-layout directory (`CF_<label>/`,
//!    `HF_<label>/`).
//!
//! The label comes from the explicit option, then `MLCHF_MODEL_LABEL`, then
//! [`DEFAULT_LABEL`] where a single pair is needed.

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::chf::{ChfModels, RateKind, RateModel};
use crate::error::{Error, Result};
use crate::model_set::{find_model_file, rate_dir, Manifest, ModelSet};

pub const CF_MODEL_ENV: &str = "MLCHF_CF_MODEL";
pub const HF_MODEL_ENV: &str = "MLCHF_HF_MODEL";
pub const MODEL_DIR_ENV: &str = "MLCHF_MODEL_DIR";
pub const MODEL_LABEL_ENV: &str = "MLCHF_MODEL_LABEL";

/// Label used when none is configured.
pub const DEFAULT_LABEL: &str = "Z_0";

/// File name written by the training scripts.
pub const DEFAULT_MODEL_FILENAME: &str = "trained_model.txt";

const MISSING_HINT: &str = "pass --cooling-model/--heating-model, --model-dir or --manifest, \
or set MLCHF_CF_MODEL/MLCHF_HF_MODEL or MLCHF_MODEL_DIR";

/// Explicitly supplied model locations. Unset fields fall back to the
/// environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelOptions {
    pub cooling: Option<PathBuf>,
    pub heating: Option<PathBuf>,
    pub model_dir: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub label: Option<String>,
}

/// Where the model pairs come from once options and environment are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// One cooling/heating pair registered under `label`.
    Pair {
        label: String,
        cooling: PathBuf,
        heating: PathBuf,
    },
    /// Training-layout directory.
    Directory(PathBuf),
    /// JSON manifest.
    Manifest(PathBuf),
}

impl ModelSource {
    /// Load every pair the source describes.
    pub fn load(&self) -> Result<ModelSet> {
        match self {
            ModelSource::Pair {
                label,
                cooling,
                heating,
            } => {
                let mut set = ModelSet::new();
                set.insert(label.clone(), ChfModels::load(cooling, heating)?)?;
                Ok(set)
            }
            ModelSource::Directory(root) => ModelSet::from_dir(root),
            ModelSource::Manifest(path) => ModelSet::from_manifest(path),
        }
    }

    /// Load only the pair for `label`. A [`ModelSource::Pair`] is returned
    /// as is, whatever its label.
    pub fn load_pair(&self, label: &str) -> Result<ChfModels> {
        match self {
            ModelSource::Pair {
                cooling, heating, ..
            } => ChfModels::load(cooling, heating),
            ModelSource::Directory(root) => ChfModels::load(
                &model_file_in(root, RateKind::Cooling, label),
                &model_file_in(root, RateKind::Heating, label),
            ),
            ModelSource::Manifest(path) => Manifest::from_path(path)?.entry(label)?.load(),
        }
    }

    /// Model files the source refers to, cooling before heating.
    ///
    /// A directory contributes the pair for `label` (or [`DEFAULT_LABEL`]);
    /// a manifest contributes the entry for `label`, or every entry when no
    /// label is given.
    pub fn model_files(&self, label: Option<&str>) -> Result<Vec<PathBuf>> {
        match self {
            ModelSource::Pair {
                cooling, heating, ..
            } => Ok(vec![cooling.clone(), heating.clone()]),
            ModelSource::Directory(root) => {
                let label = label.unwrap_or(DEFAULT_LABEL);
                Ok(vec![
                    model_file_in(root, RateKind::Cooling, label),
                    model_file_in(root, RateKind::Heating, label),
                ])
            }
            ModelSource::Manifest(path) => {
                let manifest = Manifest::from_path(path)?;
                let entries = match label {
                    Some(label) => vec![manifest.entry(label)?],
                    None => manifest.models.iter().collect(),
                };
                Ok(entries
                    .into_iter()
                    .flat_map(|entry| [entry.cooling.clone(), entry.heating.clone()])
                    .collect())
            }
        }
    }
}

/// Where a single-rate model comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateSource {
    /// A model file, evaluated with the default feature scaling.
    File(PathBuf),
    /// One half of a manifest entry, evaluated with the entry's scaling.
    Manifest { path: PathBuf, label: String },
}

impl RateSource {
    pub fn load(&self, kind: RateKind) -> Result<RateModel> {
        match self {
            RateSource::File(path) => RateModel::load(kind, path),
            RateSource::Manifest { path, label } => {
                Manifest::from_path(path)?.entry(label)?.load_rate(kind)
            }
        }
    }
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateSource::File(path) => write!(f, "{}", path.display()),
            RateSource::Manifest { path, label } => {
                write!(f, "{} (label {label})", path.display())
            }
        }
    }
}

fn env_lookup(name: &str) -> Option<OsString> {
    env::var_os(name).filter(|value| !value.is_empty())
}

/// Model file for `kind` inside `root` under `label`, preferring whichever
/// of the known file names exists.
pub fn model_file_in(root: &Path, kind: RateKind, label: &str) -> PathBuf {
    let dir = rate_dir(root, kind, label);
    find_model_file(&dir).unwrap_or_else(|| dir.join(DEFAULT_MODEL_FILENAME))
}

impl ModelOptions {
    /// Label from the options or `MLCHF_MODEL_LABEL`.
    pub fn label(&self) -> Option<String> {
        self.label_with(env_lookup)
    }

    pub fn label_with<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        self.label.clone().or_else(|| {
            lookup(MODEL_LABEL_ENV).map(|value| value.to_string_lossy().into_owned())
        })
    }

    /// Resolve the model pair source using the process environment.
    pub fn resolve_source(&self) -> Result<ModelSource> {
        self.resolve_source_with(env_lookup)
    }

    /// Resolve the model pair source, reading the environment through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingConfiguration`] when nothing points at a model,
    /// or when only one half of a cooling/heating pair is given.
    pub fn resolve_source_with<F>(&self, lookup: F) -> Result<ModelSource>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        if let Some(manifest) = &self.manifest {
            return Ok(ModelSource::Manifest(manifest.clone()));
        }
        if self.cooling.is_some() || self.heating.is_some() {
            return self.pair_source(&lookup);
        }
        if let Some(dir) = &self.model_dir {
            return Ok(ModelSource::Directory(dir.clone()));
        }
        if lookup(CF_MODEL_ENV).is_some() || lookup(HF_MODEL_ENV).is_some() {
            return self.pair_source(&lookup);
        }
        if let Some(dir) = lookup(MODEL_DIR_ENV) {
            debug!(dir = ?dir, "using model directory from {MODEL_DIR_ENV}");
            return Ok(ModelSource::Directory(PathBuf::from(dir)));
        }
        Err(Error::MissingConfiguration {
            what: "model location",
            hint: MISSING_HINT,
        })
    }

    fn pair_source<F>(&self, lookup: &F) -> Result<ModelSource>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let cooling = self.rate_path_with(RateKind::Cooling, lookup)?;
        let heating = self.rate_path_with(RateKind::Heating, lookup)?;
        Ok(ModelSource::Pair {
            label: self
                .label_with(lookup)
                .unwrap_or_else(|| DEFAULT_LABEL.to_string()),
            cooling,
            heating,
        })
    }

    /// Resolve the model for a single rate using the process environment.
    pub fn resolve_rate(&self, kind: RateKind) -> Result<RateSource> {
        self.resolve_rate_with(kind, env_lookup)
    }

    /// Resolve the model for `kind`: the manifest entry for the label, the
    /// explicit path, the rate's environment variable, then
    /// `<dir>/<CF|HF>_<label>/` from the explicit or environment model
    /// directory.
    pub fn resolve_rate_with<F>(&self, kind: RateKind, lookup: F) -> Result<RateSource>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        if let Some(manifest) = &self.manifest {
            let label = self
                .label_with(&lookup)
                .unwrap_or_else(|| DEFAULT_LABEL.to_string());
            return Ok(RateSource::Manifest {
                path: manifest.clone(),
                label,
            });
        }
        self.rate_path_with(kind, &lookup).map(RateSource::File)
    }

    fn rate_path_with<F>(&self, kind: RateKind, lookup: &F) -> Result<PathBuf>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let (explicit, env_name, what) = match kind {
            RateKind::Cooling => (&self.cooling, CF_MODEL_ENV, "cooling model"),
            RateKind::Heating => (&self.heating, HF_MODEL_ENV, "heating model"),
        };
        if let Some(path) = explicit {
            return Ok(path.clone());
        }
        if let Some(path) = lookup(env_name) {
            return Ok(PathBuf::from(path));
        }
        let dir = self
            .model_dir
            .clone()
            .or_else(|| lookup(MODEL_DIR_ENV).map(PathBuf::from));
        if let Some(dir) = dir {
            let label = self
                .label_with(lookup)
                .unwrap_or_else(|| DEFAULT_LABEL.to_string());
            return Ok(model_file_in(&dir, kind, &label));
        }
        Err(Error::MissingConfiguration {
            what,
            hint: MISSING_HINT,
        })
    }
}
