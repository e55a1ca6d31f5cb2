//! CLI entry point for tsgrid.
//!
//! Provides subcommands for regularizing a raw series onto its time-step grid,
//! aggregating a regular series to a coarser step, and describing a file.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use tsgrid::{
    DEFAULT_INSERTED_FLAG, DEFAULT_MISSING_FLAG, Method, TimeStep, aggregate,
    output::{summary_json, write_file},
    parser::read_file,
    regularize,
};

#[derive(Parser)]
#[command(name = "tsgrid")]
#[command(about = "Regularize and aggregate time series", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snap a series onto the grid of its time step
    Regularize {
        /// Time series file to read
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// File to write the regularized series to
        #[arg(short, long)]
        output: PathBuf,

        /// Time step to use instead of the one in the file (e.g. "10min", "10,0")
        #[arg(short, long)]
        step: Option<TimeStep>,

        /// Flag for records that were not in the source at that timestamp
        #[arg(long, default_value = DEFAULT_INSERTED_FLAG)]
        inserted_flag: String,
    },
    /// Aggregate a regular series to a larger time step
    Aggregate {
        /// Time series file to read
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// File to write the aggregated series to
        #[arg(short, long)]
        output: PathBuf,

        /// Target time step (e.g. "H", "D", "30min")
        #[arg(short, long)]
        target_step: TimeStep,

        /// Reduction: sum, mean, max or min
        #[arg(short, long)]
        method: Method,

        /// Minimum number of source values needed for a result
        #[arg(short = 'c', long, default_value_t = 1)]
        min_count: usize,

        /// Flag for results computed with some source values missing
        #[arg(long, default_value = DEFAULT_MISSING_FLAG)]
        missing_flag: String,
    },
    /// Print a JSON summary of a time series file
    Describe {
        /// Time series file to read
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/tsgrid.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("tsgrid.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Regularize {
            input,
            output,
            step,
            inserted_flag,
        } => {
            let source = read_file(&input)?;
            let result = regularize(&source, step, &inserted_flag)?;
            write_file(&output, &result)?;
            info!(
                input = %input.display(),
                output = %output.display(),
                source_records = source.len(),
                records = result.len(),
                "Regularized"
            );
        }
        Commands::Aggregate {
            input,
            output,
            target_step,
            method,
            min_count,
            missing_flag,
        } => {
            let source = read_file(&input)?;
            let result = aggregate(&source, target_step, method, min_count, &missing_flag)?;
            write_file(&output, &result)?;
            info!(
                input = %input.display(),
                output = %output.display(),
                source_records = source.len(),
                records = result.len(),
                "Aggregated"
            );
        }
        Commands::Describe { input } => {
            let series = read_file(&input)?;
            println!("{}", summary_json(&series)?);
        }
    }

    Ok(())
}
