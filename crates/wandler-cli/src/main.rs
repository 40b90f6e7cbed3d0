// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Wandler: local image and PDF conversion.
//
// Entry point. Initialises logging, loads configuration and statistics, and
// dispatches the chosen subcommand.

mod output;
mod services;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use wandler_core::{
    ConversionOperation, JsonFileStore, PipelineConfig, Result, StatisticsStore,
};
use wandler_pipeline::{Converter, SizeEstimator};

use services::batch::ConversionService;
use services::data_dir;

#[derive(Parser)]
#[command(name = "wandler")]
#[command(about = "Convert images between JPG, PNG, WebP, HEIC and PDF, locally")]
#[command(version)]
struct Cli {
    /// Directory for usage statistics (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every conversion, grouped by source format
    Operations,
    /// Show the approximate output size for each file
    Estimate {
        /// Operation tag, e.g. JPG_TO_PNG
        #[arg(long)]
        op: String,
        files: Vec<PathBuf>,
    },
    /// Convert files and write the results
    Convert {
        /// Operation tag, e.g. PNG_TO_WEBP
        #[arg(long)]
        op: ConversionOperation,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// JSON pipeline configuration
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show usage statistics
    Stats {
        /// Zero the counters
        #[arg(long)]
        reset: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(kind = err.kind(), "{err}");
            for line in output::format_error(&err) {
                eprintln!("{}", line.trim_start());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Operations => {
            for line in output::format_operations() {
                println!("{line}");
            }
        }
        Command::Estimate { op, files } => {
            let estimator = SizeEstimator::new();
            for path in files {
                let input_len = std::fs::metadata(&path)?.len();
                let estimate = estimator.estimate_tag(input_len, &op);
                println!("{}", output::format_estimate(&path, input_len, estimate));
            }
        }
        Command::Convert {
            op,
            out,
            config,
            files,
        } => {
            let config = load_config(config.as_deref())?;
            let store = open_store(&cli.data_dir)?;
            let service = ConversionService::new(Converter::new(config), store);

            tracing::info!(op = %op, files = files.len(), "Wandler converting");
            let outcomes = service.convert_files(files, op, &out).await?;

            for outcome in &outcomes {
                for line in output::format_outcome(outcome) {
                    println!("{line}");
                }
            }
            if outcomes.iter().any(|outcome| outcome.error.is_some()) {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Stats { reset } => {
            let store = open_store(&cli.data_dir)?;
            if reset {
                store.reset()?;
                tracing::info!("Statistics reset");
            }
            for line in output::format_statistics(&store.load()?) {
                println!("{line}");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path),
        None => Ok(PipelineConfig::default()),
    }
}

fn open_store(override_dir: &Option<PathBuf>) -> Result<Arc<dyn StatisticsStore>> {
    let dir = data_dir::data_dir(override_dir.as_deref())?;
    Ok(Arc::new(JsonFileStore::new(data_dir::statistics_path(&dir))))
}
