//! Sweep command handler: evaluate the rates over a range of `log10 T`.

use std::io;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::info;

use mlchf_cli::output::{render_json, render_sweep_text, OutputFormat};
use mlchf_lib::{
    run_single_sweep, run_sweep, ModelOptions, RateKind, TemperatureSweep, DEFAULT_LABEL,
};

use super::{ConditionArgs, ModelArgs};

/// Rate selector for single-model sweeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RateArg {
    Cooling,
    Heating,
}

impl From<RateArg> for RateKind {
    fn from(value: RateArg) -> Self {
        match value {
            RateArg::Cooling => RateKind::Cooling,
            RateArg::Heating => RateKind::Heating,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    /// Evaluate a single model instead of the cooling/heating pair.
    #[arg(long, value_enum)]
    pub rate: Option<RateArg>,
    /// First log10 T of the sweep.
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub start: f64,
    /// Exclusive upper bound on log10 T.
    #[arg(long, default_value_t = 9.0, allow_negative_numbers = true)]
    pub end: f64,
    /// Increment in log10 T.
    #[arg(long, default_value_t = 0.1)]
    pub step: f64,
    #[command(flatten)]
    pub conditions: ConditionArgs,
}

/// Handle the sweep subcommand.
pub fn handle_sweep(models: &ModelArgs, args: &SweepArgs, format: OutputFormat) -> Result<()> {
    let sweep =
        TemperatureSweep::new(args.start, args.end, args.step).context("invalid sweep range")?;
    let base = args.conditions.conditions();
    let options = ModelOptions::from(models);

    let rows = match args.rate {
        Some(rate) => {
            let kind = RateKind::from(rate);
            let source = options
                .resolve_rate(kind)
                .with_context(|| format!("failed to locate the {kind} model"))?;
            let model = source
                .load(kind)
                .with_context(|| format!("failed to load {kind} model from {source}"))?;
            info!(rate = %kind, %source, "loaded model");
            run_single_sweep(&model, &base, &sweep).context("error evaluating the model")?
        }
        None => {
            let label = options
                .label()
                .unwrap_or_else(|| DEFAULT_LABEL.to_string());
            let source = options
                .resolve_source()
                .context("failed to locate the cooling/heating models")?;
            let pair = source
                .load_pair(&label)
                .with_context(|| format!("failed to load model pair {label}"))?;
            info!(%label, "loaded model pair");
            run_sweep(&pair, &base, &sweep).context("error evaluating the models")?
        }
    };

    let mut out = io::stdout().lock();
    match format {
        OutputFormat::Text => render_sweep_text(&rows, &mut out)?,
        OutputFormat::Json => render_json(&rows, &mut out)?,
    }
    Ok(())
}
