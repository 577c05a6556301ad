use crate::engine::BacktestEngine;
use crate::error::BacktestError;
use crate::models::ResultSeries;
use crate::price_series::PriceSeries;
use crate::strategy::Strategy;
use crossbeam_channel::{bounded, Receiver, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::result::Result as StdResult;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Result of one strategy within a batch. A failure here never stops the
/// other strategies.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub name: String,
    pub strategy_type: &'static str,
    pub result: StdResult<ResultSeries, BacktestError>,
}

impl StrategyOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

struct BatchTask {
    index: usize,
    strategy: Strategy,
}

struct BatchTaskResult {
    index: usize,
    outcome: StrategyOutcome,
    duration_secs: f64,
}

/// Runs every strategy of a batch over one shared, read-only series.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    engine: BacktestEngine,
    worker_threads: Option<usize>,
    parallel: bool,
    show_progress: bool,
}

impl BatchRunner {
    pub fn new(engine: BacktestEngine) -> Self {
        Self {
            engine,
            worker_threads: None,
            parallel: true,
            show_progress: false,
        }
    }

    /// Upper bound on worker threads; defaults to the number of CPUs.
    pub fn with_worker_threads(mut self, worker_threads: Option<usize>) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    pub fn sequential(mut self, sequential: bool) -> Self {
        self.parallel = !sequential;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// One outcome per strategy, in the order the strategies were given.
    pub fn run(&self, series: Arc<PriceSeries>, strategies: &[Strategy]) -> Vec<StrategyOutcome> {
        let total = strategies.len();
        if total == 0 {
            return Vec::new();
        }
        info!(
            "Running {} strategies on {} ({} days)",
            total,
            series.symbol(),
            series.len()
        );

        let progress = self.progress_bar(total);
        let outcomes = if self.parallel && total > 1 {
            self.run_parallel(series, strategies, &progress)
        } else {
            strategies
                .iter()
                .map(|strategy| {
                    let outcome = run_one(&self.engine, &series, strategy);
                    log_outcome(&outcome, None);
                    progress.inc(1);
                    outcome
                })
                .collect()
        };

        let failed = outcomes.iter().filter(|outcome| !outcome.is_success()).count();
        if failed > 0 {
            warn!("Batch finished with {} of {} strategies failed", failed, total);
            progress.finish_with_message("Backtesting completed with errors");
        } else {
            progress.finish_with_message("Backtesting completed");
        }
        outcomes
    }

    fn run_parallel(
        &self,
        series: Arc<PriceSeries>,
        strategies: &[Strategy],
        progress: &ProgressBar,
    ) -> Vec<StrategyOutcome> {
        let total = strategies.len();
        let cpus = self.worker_threads.unwrap_or_else(num_cpus::get);
        let num_workers = std::cmp::min(total, std::cmp::max(1, cpus));
        info!("Using {} worker threads", num_workers);

        let (task_tx, task_rx): (Sender<BatchTask>, Receiver<BatchTask>) = bounded(total);
        let (result_tx, result_rx): (Sender<BatchTaskResult>, Receiver<BatchTaskResult>) =
            bounded(total);

        let mut handles = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let series = Arc::clone(&series);
            let engine = self.engine.clone();

            let handle = thread::spawn(move || {
                while let Ok(task) = rx.recv() {
                    let start = Instant::now();
                    let outcome = run_one(&engine, &series, &task.strategy);
                    let message = BatchTaskResult {
                        index: task.index,
                        outcome,
                        duration_secs: start.elapsed().as_secs_f64(),
                    };
                    if result_tx.send(message).is_err() {
                        break;
                    }
                }
            });
            handles.push(handle);
        }
        drop(result_tx);

        for (index, strategy) in strategies.iter().enumerate() {
            let task = BatchTask {
                index,
                strategy: strategy.clone(),
            };
            if task_tx.send(task).is_err() {
                warn!("All workers exited before every strategy was queued");
                break;
            }
        }
        drop(task_tx);

        let mut slots: Vec<Option<StrategyOutcome>> = vec![None; total];
        let mut completed = 0usize;
        while completed < total {
            match result_rx.recv() {
                Ok(message) => {
                    completed += 1;
                    progress.set_position(completed as u64);
                    log_outcome(&message.outcome, Some(message.duration_secs));
                    slots[message.index] = Some(message.outcome);
                }
                Err(_) => {
                    warn!("Result channel closed unexpectedly. Some results may be lost.");
                    break;
                }
            }
        }

        for handle in handles {
            if handle.join().is_err() {
                warn!("A backtest worker thread panicked");
            }
        }

        slots
            .into_iter()
            .zip(strategies)
            .map(|(slot, strategy)| {
                slot.unwrap_or_else(|| StrategyOutcome {
                    name: strategy.name().to_string(),
                    strategy_type: strategy.type_id(),
                    result: Err(BacktestError::Worker(format!(
                        "no result was reported for {}",
                        strategy.name()
                    ))),
                })
            })
            .collect()
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

fn run_one(engine: &BacktestEngine, series: &PriceSeries, strategy: &Strategy) -> StrategyOutcome {
    StrategyOutcome {
        name: strategy.name().to_string(),
        strategy_type: strategy.type_id(),
        result: engine.run(series, strategy),
    }
}

fn log_outcome(outcome: &StrategyOutcome, duration_secs: Option<f64>) {
    let elapsed = duration_secs
        .map(|secs| format!(" in {:.2}s", secs))
        .unwrap_or_default();
    match &outcome.result {
        Ok(series) => {
            let return_rate = series
                .final_record()
                .map(|record| record.return_rate)
                .unwrap_or(0.0);
            info!(
                "Completed {}{} (return {:.2}%)",
                outcome.name,
                elapsed,
                return_rate * 100.0
            );
        }
        Err(err) => warn!(
            "Backtest failed for strategy {} ({}) with {} error: {}",
            outcome.name,
            outcome.strategy_type,
            err.kind(),
            err
        ),
    }
}
