use crate::backtester::BatchRunner;
use crate::config::BacktestPlan;
use crate::engine::BacktestEngine;
use crate::performance::{build_summary, ComparisonTable};
use crate::price_series::PriceSeries;
use crate::report::{render_summary_table, write_results};
use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

pub struct BacktestOptions {
    pub plan_path: PathBuf,
    pub data_file: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub sequential: bool,
    pub worker_threads: Option<usize>,
    pub show_progress: bool,
}

pub fn run(options: &BacktestOptions) -> Result<ComparisonTable> {
    let plan = BacktestPlan::load_from_file(&options.plan_path)?;
    // Every strategy is validated before any price data is touched.
    let strategies = plan
        .build_strategies()
        .with_context(|| format!("Invalid plan {}", options.plan_path.display()))?;
    info!(
        "Loaded plan for {} with {} strategies ({} .. {})",
        plan.symbol,
        strategies.len(),
        plan.start_date,
        plan.end_date
    );

    let full_series = PriceSeries::load_from_file(&options.data_file).with_context(|| {
        format!("Failed to load price data from {}", options.data_file.display())
    })?;
    if full_series.symbol() != plan.symbol {
        return Err(anyhow!(
            "Price data is for {} but the plan targets {}",
            full_series.symbol(),
            plan.symbol
        ));
    }
    if full_series.adjustment() != plan.adjustment {
        warn!(
            "Plan expects {} adjusted prices but {} holds {} adjusted prices",
            plan.adjustment.as_str(),
            options.data_file.display(),
            full_series.adjustment().as_str()
        );
    }

    let series = full_series
        .window(plan.start_date, plan.end_date)
        .with_context(|| {
            format!(
                "No usable prices for {} between {} and {}",
                plan.symbol, plan.start_date, plan.end_date
            )
        })?;

    let engine = BacktestEngine::new(plan.costs)?;
    let outcomes = BatchRunner::new(engine)
        .with_worker_threads(options.worker_threads)
        .sequential(options.sequential)
        .with_progress(options.show_progress)
        .run(Arc::new(series), &strategies);

    let table = build_summary(&outcomes, plan.alignment);
    println!("{}", render_summary_table(&table));

    if let Some(dir) = &options.output_dir {
        let written = write_results(dir, &outcomes, &table)
            .with_context(|| format!("Failed to write results to {}", dir.display()))?;
        info!("Results written to {} ({} files)", dir.display(), written.len());
    }

    Ok(table)
}
