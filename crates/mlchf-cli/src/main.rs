use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use mlchf_cli::output::OutputFormat;

mod commands;

use commands::inspect::{handle_inspect, InspectArgs};
use commands::predict::{handle_predict, PredictArgs};
use commands::sweep::{handle_sweep, SweepArgs};
use commands::ModelArgs;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Cooling and heating function predictions from XGBoost models"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    #[command(flatten)]
    models: ModelArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tabulate the rates over a log10 T sweep at fixed density and radiation field.
    Sweep(SweepArgs),
    /// Evaluate the rates at a single set of conditions.
    Predict(PredictArgs),
    /// Print model metadata.
    Inspect(InspectArgs),
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Command::Sweep(args) => handle_sweep(&cli.models, args, cli.format),
        Command::Predict(args) => handle_predict(&cli.models, args, cli.format),
        Command::Inspect(args) => handle_inspect(&cli.models, args, cli.format),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
