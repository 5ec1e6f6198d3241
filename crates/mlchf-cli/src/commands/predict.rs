//! Predict command handler: evaluate the rates at a single point.

use std::io;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::info;

use mlchf_cli::output::{render_json, render_rates_text, OutputFormat};
use mlchf_lib::{LabeledRates, ModelOptions, PhysicalConditions};

use super::{ConditionArgs, ModelArgs};

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// Gas temperature (K).
    #[arg(long, default_value_t = 1.0e4, conflicts_with = "log_t")]
    pub temperature: f64,
    /// Gas temperature as log10 T.
    #[arg(long, allow_negative_numbers = true)]
    pub log_t: Option<f64>,
    #[command(flatten)]
    pub conditions: ConditionArgs,
}

impl PredictArgs {
    fn physical_conditions(&self) -> PhysicalConditions {
        let temperature = match self.log_t {
            Some(alt) => 10f64.powf(alt),
            None => self.temperature,
        };
        self.conditions.conditions().with_temperature(temperature)
    }
}

#[derive(Debug, Serialize)]
struct PredictReport {
    conditions: PhysicalConditions,
    results: Vec<LabeledRates>,
}

/// Handle the predict subcommand.
///
/// With a label (flag or `MLCHF_MODEL_LABEL`) only that pair is evaluated;
/// otherwise every pair the model source provides is.
pub fn handle_predict(models: &ModelArgs, args: &PredictArgs, format: OutputFormat) -> Result<()> {
    let conditions = args.physical_conditions();
    let options = ModelOptions::from(models);
    let source = options
        .resolve_source()
        .context("failed to locate the cooling/heating models")?;

    let results = match options.label() {
        Some(label) => {
            let pair = source
                .load_pair(&label)
                .with_context(|| format!("failed to load model pair {label}"))?;
            let rates = pair
                .evaluate(&conditions)
                .context("error evaluating the models")?;
            vec![LabeledRates { label, rates }]
        }
        None => {
            let set = source.load().context("failed to load models")?;
            info!(labels = set.len(), "loaded model set");
            set.evaluate_all(&conditions)
                .context("error evaluating the models")?
        }
    };

    let mut out = io::stdout().lock();
    match format {
        OutputFormat::Text => render_rates_text(conditions.temperature, &results, &mut out)?,
        OutputFormat::Json => render_json(
            &PredictReport {
                conditions,
                results,
            },
            &mut out,
        )?,
    }
    Ok(())
}
