use anyhow::Result;
use clap::{Parser, Subcommand};
use dca_engine::{
    commands::{backtest, export_snapshot, list_strategies},
    config::RunnerSettings,
};
use log::info;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dca-engine")]
#[command(about = "Backtest and compare dollar-cost averaging strategies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every strategy of a plan over one price series and compare them
    Backtest {
        /// JSON backtest plan (symbol, date range, strategies)
        #[arg(long, value_name = "PATH")]
        plan: PathBuf,
        /// Price series file (.json or bincode snapshot)
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: PathBuf,
        /// Directory for per-strategy results and summary.json
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
        /// Run strategies one after another on the current thread
        #[arg(long)]
        sequential: bool,
    },
    /// Convert a JSON price series into a binary snapshot
    ExportSnapshot {
        /// Source JSON price series
        #[arg(short, long, value_name = "PATH")]
        input: PathBuf,
        /// Destination file for the snapshot
        #[arg(short, long = "output", value_name = "PATH")]
        output: PathBuf,
    },
    /// List supported strategy types
    Strategies,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match cli.command {
        Commands::Backtest {
            plan,
            data_file,
            output,
            sequential,
        } => {
            let settings: HashMap<String, String> = env::vars().collect();
            let runner_settings = RunnerSettings::from_settings_map(&settings)?;
            info!("Starting backtest. Historical results do not predict future returns.");
            backtest::run(&backtest::BacktestOptions {
                plan_path: plan,
                data_file,
                output_dir: output,
                sequential,
                worker_threads: runner_settings.worker_threads,
                show_progress: true,
            })?;
        }
        Commands::ExportSnapshot { input, output } => {
            export_snapshot::run(&input, &output)?;
        }
        Commands::Strategies => list_strategies::run(),
    }

    Ok(())
}
