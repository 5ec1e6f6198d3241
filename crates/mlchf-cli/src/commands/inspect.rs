//! Inspect command handler: print model metadata.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use mlchf_cli::output::{render_json, render_summary_text, OutputFormat};
use mlchf_lib::{load_booster, ModelOptions, ModelSummary};

use super::ModelArgs;

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Model files to inspect. Defaults to the configured cooling and heating
    /// models (every manifest entry when a manifest is given without a label).
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct InspectReport {
    path: PathBuf,
    #[serde(flatten)]
    summary: ModelSummary,
}

/// Handle the inspect subcommand.
pub fn handle_inspect(models: &ModelArgs, args: &InspectArgs, format: OutputFormat) -> Result<()> {
    let paths = if args.paths.is_empty() {
        let options = ModelOptions::from(models);
        let source = options
            .resolve_source()
            .context("failed to locate the cooling/heating models")?;
        source
            .model_files(options.label().as_deref())
            .context("failed to list the configured model files")?
    } else {
        args.paths.clone()
    };

    let reports = paths
        .into_iter()
        .map(|path| -> Result<InspectReport> {
            let booster = load_booster(&path)
                .with_context(|| format!("failed to load model from {}", path.display()))?;
            Ok(InspectReport {
                summary: booster.summary(),
                path,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut out = io::stdout().lock();
    match format {
        OutputFormat::Text => {
            for report in &reports {
                render_summary_text(&report.path, &report.summary, &mut out)?;
            }
        }
        OutputFormat::Json => render_json(&reports, &mut out)?,
    }
    Ok(())
}
