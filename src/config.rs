use crate::error::{BacktestError, BacktestResult};
use crate::models::PriceAdjustment;
use crate::param_utils::require_non_negative;
use crate::performance::AlignmentPolicy;
use crate::strategy::{create_strategy, Strategy};
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One strategy entry of a plan, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDefinition {
    #[serde(rename = "type")]
    pub strategy_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "freq")]
    pub cadence: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, f64>,
    /// `[level, multiplier]` pairs; meaning depends on the strategy type.
    #[serde(default)]
    pub thresholds: Option<Vec<[f64; 2]>>,
    #[serde(default, alias = "benchmark_type")]
    pub benchmark: Option<String>,
    #[serde(default)]
    pub intervals: Vec<IntervalDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalDefinition {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub amount: f64,
    #[serde(default, alias = "freq")]
    pub cadence: Option<String>,
}

/// Per-trade cash deduction. The whole buy amount still counts as invested.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TradingCosts {
    #[serde(default)]
    pub fee_rate: f64,
    #[serde(default)]
    pub minimum_fee: f64,
}

impl TradingCosts {
    pub fn validate(&self) -> BacktestResult<()> {
        require_non_negative("fee_rate", self.fee_rate)?;
        require_non_negative("minimum_fee", self.minimum_fee)?;
        if self.fee_rate >= 1.0 {
            return Err(BacktestError::configuration(format!(
                "fee_rate must be below 1 (value: {})",
                self.fee_rate
            )));
        }
        Ok(())
    }

    /// Fee charged on a buy of `amount`; never more than the amount itself.
    pub fn fee_for(&self, amount: f64) -> f64 {
        if amount <= 0.0 {
            return 0.0;
        }
        (amount * self.fee_rate).max(self.minimum_fee).min(amount)
    }
}

/// Everything needed to compare strategies on one instrument.
///
/// Passed explicitly to the batch runner; nothing here is global.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestPlan {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub adjustment: PriceAdjustment,
    #[serde(default)]
    pub costs: TradingCosts,
    #[serde(default)]
    pub alignment: AlignmentPolicy,
    pub strategies: Vec<StrategyDefinition>,
}

impl BacktestPlan {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open backtest plan at {}", path.display()))?;
        let plan: BacktestPlan = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Invalid backtest plan in {}", path.display()))?;
        Ok(plan)
    }

    pub fn validate(&self) -> BacktestResult<()> {
        if self.symbol.trim().is_empty() {
            return Err(BacktestError::configuration("symbol must not be empty"));
        }
        if self.end_date < self.start_date {
            return Err(BacktestError::configuration(format!(
                "end_date {} is before start_date {}",
                self.end_date, self.start_date
            )));
        }
        if self.strategies.is_empty() {
            return Err(BacktestError::configuration(
                "plan must list at least one strategy",
            ));
        }
        self.costs.validate()
    }

    /// Validate the plan and construct every strategy. Any bad entry fails
    /// the whole plan before a single day is simulated.
    pub fn build_strategies(&self) -> BacktestResult<Vec<Strategy>> {
        self.validate()?;
        let strategies = self
            .strategies
            .iter()
            .enumerate()
            .map(|(index, definition)| {
                create_strategy(definition).map_err(|err| match err {
                    BacktestError::Configuration(message) => BacktestError::Configuration(
                        format!("strategy #{} ({}): {}", index + 1, definition.strategy_type, message),
                    ),
                    other => other,
                })
            })
            .collect::<BacktestResult<Vec<_>>>()?;

        let mut seen = HashSet::new();
        for strategy in &strategies {
            if !seen.insert(strategy.name()) {
                return Err(BacktestError::configuration(format!(
                    "duplicate strategy name {}; set an explicit name",
                    strategy.name()
                )));
            }
        }
        Ok(strategies)
    }
}

/// Process-level knobs read from the environment.
#[derive(Debug, Clone, Default)]
pub struct RunnerSettings {
    pub worker_threads: Option<usize>,
}

impl RunnerSettings {
    pub fn from_settings_map(settings: &HashMap<String, String>) -> Result<Self> {
        let worker_threads = optional_setting_usize(settings, "DCA_WORKERS", 1)?;
        Ok(Self { worker_threads })
    }
}

fn optional_setting_usize(
    settings: &HashMap<String, String>,
    key: &str,
    min: usize,
) -> Result<Option<usize>> {
    let Some(raw) = settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
    else {
        return Ok(None);
    };
    let value = raw
        .parse::<usize>()
        .map_err(|_| anyhow!("Setting {} must be an integer (value: {})", key, raw))?;
    if value < min {
        return Err(anyhow!(
            "Setting {} must be >= {} (value: {})",
            key,
            min,
            raw
        ));
    }
    Ok(Some(value))
}
