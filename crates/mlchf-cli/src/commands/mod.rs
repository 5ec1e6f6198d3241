// Module exports for CLI subcommands
//
// Each module handles a specific CLI subcommand. main.rs dispatches to these
// handlers and keeps the entry point focused on parsing and coordination.

pub mod inspect;
pub mod predict;
pub mod sweep;

use clap::Args;
use std::path::PathBuf;

use mlchf_lib::{ModelOptions, PhysicalConditions};

/// Model location flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ModelArgs {
    /// Cooling function model file (falls back to MLCHF_CF_MODEL).
    #[arg(long, global = true)]
    pub cooling_model: Option<PathBuf>,
    /// Heating function model file (falls back to MLCHF_HF_MODEL).
    #[arg(long, global = true)]
    pub heating_model: Option<PathBuf>,
    /// Directory laid out as CF_<label>/ and HF_<label>/ (falls back to MLCHF_MODEL_DIR).
    #[arg(long, global = true)]
    pub model_dir: Option<PathBuf>,
    /// JSON manifest listing labelled model pairs.
    #[arg(long, global = true, conflicts_with = "model_dir")]
    pub manifest: Option<PathBuf>,
    /// Model label such as Z_0 (falls back to MLCHF_MODEL_LABEL).
    #[arg(long, global = true)]
    pub label: Option<String>,
}

impl From<&ModelArgs> for ModelOptions {
    fn from(args: &ModelArgs) -> Self {
        ModelOptions {
            cooling: args.cooling_model.clone(),
            heating: args.heating_model.clone(),
            model_dir: args.model_dir.clone(),
            manifest: args.manifest.clone(),
            label: args.label.clone(),
        }
    }
}

/// Overrides for the non-temperature physical inputs.
#[derive(Args, Debug, Clone, Default)]
pub struct ConditionArgs {
    /// Hydrogen number density n_H (cm^-3).
    #[arg(long = "n-h")]
    pub hydrogen_density: Option<f64>,
    /// Lyman-Werner photo-dissociation rate P_LW (s^-1).
    #[arg(long)]
    pub p_lw: Option<f64>,
    /// HI photo-ionization rate P_HI (s^-1).
    #[arg(long)]
    pub p_hi: Option<f64>,
    /// HeI photo-ionization rate P_HeI (s^-1).
    #[arg(long)]
    pub p_hei: Option<f64>,
    /// CVI photo-ionization rate P_CVI (s^-1).
    #[arg(long)]
    pub p_cvi: Option<f64>,
}

impl ConditionArgs {
    /// Reference conditions with any supplied overrides applied.
    pub fn conditions(&self) -> PhysicalConditions {
        let defaults = PhysicalConditions::default();
        PhysicalConditions {
            temperature: defaults.temperature,
            hydrogen_density: self.hydrogen_density.unwrap_or(defaults.hydrogen_density),
            p_lw: self.p_lw.unwrap_or(defaults.p_lw),
            p_hi: self.p_hi.unwrap_or(defaults.p_hi),
            p_hei: self.p_hei.unwrap_or(defaults.p_hei),
            p_cvi: self.p_cvi.unwrap_or(defaults.p_cvi),
        }
    }
}
