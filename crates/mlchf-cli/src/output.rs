//! Output formatting for sweep tables, point predictions and model metadata.
//!
//! Text rows are `printf("%3.1f %10.6E %10.6E\n", ...)` compatible. JSON output
//! is pretty-printed with `serde_json`.

use std::io::{self, Write};
use std::path::Path;

use clap::ValueEnum;
use serde::Serialize;

use mlchf_lib::{LabeledRates, ModelSummary, SweepRow};

/// Output format selected with `--format`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Whitespace-separated columns.
    #[default]
    Text,
    /// Pretty-printed JSON document.
    Json,
}

/// Format `value` like C's `%10.6E`: six mantissa digits, a signed exponent
/// of at least two digits, right-aligned in ten columns.
///
/// ```
/// assert_eq!(mlchf_cli::output::format_sci(1.0e5), "1.000000E+05");
/// assert_eq!(mlchf_cli::output::format_sci(5.623413e-24), "5.623413E-24");
/// ```
pub fn format_sci(value: f64) -> String {
    let body = if value.is_nan() {
        "NAN".to_string()
    } else if value == f64::INFINITY {
        "INF".to_string()
    } else if value == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        let rust = format!("{value:.6E}");
        match rust.split_once('E') {
            Some((mantissa, exponent)) => {
                let exponent: i32 = exponent.parse().unwrap_or(0);
                let sign = if exponent < 0 { '-' } else { '+' };
                format!("{mantissa}E{sign}{:02}", exponent.abs())
            }
            None => rust,
        }
    };
    format!("{body:>10}")
}

/// One sweep row per line: `alt cooling heating`, omitting rates that were
/// not evaluated.
pub fn render_sweep_text<W: Write>(rows: &[SweepRow], out: &mut W) -> io::Result<()> {
    for row in rows {
        write!(out, "{:3.1}", row.alt)?;
        for rate in [row.cooling, row.heating].into_iter().flatten() {
            write!(out, " {}", format_sci(rate))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// One line per label: `label temperature cooling heating`.
pub fn render_rates_text<W: Write>(
    temperature: f64,
    results: &[LabeledRates],
    out: &mut W,
) -> io::Result<()> {
    for result in results {
        writeln!(
            out,
            "{} {:.6} {} {}",
            result.label,
            temperature,
            format_sci(result.rates.cooling),
            format_sci(result.rates.heating)
        )?;
    }
    Ok(())
}

/// Human-readable model metadata block.
pub fn render_summary_text<W: Write>(
    path: &Path,
    summary: &ModelSummary,
    out: &mut W,
) -> io::Result<()> {
    writeln!(out, "{}", path.display())?;
    writeln!(out, "  format:      {}", summary.format)?;
    writeln!(out, "  booster:     {}", summary.booster)?;
    writeln!(out, "  objective:   {}", summary.objective)?;
    writeln!(out, "  base score:  {}", summary.base_score)?;
    writeln!(out, "  trees:       {}", summary.num_trees)?;
    writeln!(out, "  iterations:  {}", summary.num_iterations)?;
    writeln!(out, "  groups:      {}", summary.num_groups)?;
    writeln!(out, "  features:    {}", summary.num_features)?;
    writeln!(out, "  max depth:   {}", summary.max_depth)?;
    writeln!(out, "  leaves:      {}", summary.total_leaves)?;
    if let Some([major, minor, patch]) = summary.version {
        writeln!(out, "  version:     {major}.{minor}.{patch}")?;
    }
    Ok(())
}

/// Render any serializable value as pretty JSON followed by a newline.
///
/// # Errors
///
/// Returns an error if JSON serialization or writing fails.
pub fn render_json<T: Serialize + ?Sized, W: Write>(value: &T, out: &mut W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).map_err(io::Error::other)?;
    out.write_all(b"\n")
}
