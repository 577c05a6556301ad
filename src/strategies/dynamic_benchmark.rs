use crate::error::{BacktestError, BacktestResult};
use crate::indicators::{RollingMax, RollingMean};
use crate::models::Cadence;
use crate::param_utils::{require_positive, require_window, window_param};
use crate::strategy::{BuyPolicy, MarketDay};
use crate::strategy_utils::{
    build_drop_tiers, clip_to_cap, drop_ratio, tier_multiplier, CadenceTracker, DropTier,
};
use std::collections::HashMap;

pub const DEFAULT_MA_WINDOW: usize = 250;
pub const DEFAULT_MAX_WINDOW: usize = 60;
/// Tiers used when a plan gives none.
pub const DEFAULT_THRESHOLDS: [[f64; 2]; 3] = [[0.05, 1.5], [0.10, 2.0], [0.20, 3.0]];

/// Reference price recomputed every day from trailing history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchmarkReference {
    /// Simple moving average; undefined until `window` days are seen.
    MovingAverage { window: usize },
    /// Highest close over the last `window` days (shorter history allowed).
    TrailingMax { window: usize },
}

impl BenchmarkReference {
    /// Parses `ma250` / `max60` style identifiers. `ma_window` / `max_window`
    /// parameters override the numeric suffix.
    pub fn parse(raw: &str, params: &HashMap<String, f64>) -> BacktestResult<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        let (prefix, suffix, key, default) = if let Some(rest) = normalized.strip_prefix("max") {
            ("max", rest, "max_window", DEFAULT_MAX_WINDOW)
        } else if let Some(rest) = normalized.strip_prefix("ma") {
            ("ma", rest, "ma_window", DEFAULT_MA_WINDOW)
        } else {
            return Err(BacktestError::configuration(format!(
                "benchmark must be ma<N> or max<N> (value: {})",
                raw
            )));
        };

        let suffix_window = if suffix.is_empty() {
            default
        } else {
            suffix.parse::<usize>().map_err(|_| {
                BacktestError::configuration(format!("invalid benchmark window in {}", raw))
            })?
        };
        let window = window_param(params, key, suffix_window)?;

        Ok(match prefix {
            "max" => Self::TrailingMax { window },
            _ => Self::MovingAverage { window },
        })
    }

    pub fn label(&self) -> String {
        match self {
            BenchmarkReference::MovingAverage { window } => format!("ma{}", window),
            BenchmarkReference::TrailingMax { window } => format!("max{}", window),
        }
    }
}

#[derive(Debug, Clone)]
enum ReferenceTracker {
    Mean(RollingMean),
    Max(RollingMax),
}

impl ReferenceTracker {
    fn push(&mut self, price: f64) {
        match self {
            ReferenceTracker::Mean(mean) => mean.push(price),
            ReferenceTracker::Max(max) => max.push(price),
        }
    }

    fn value(&self) -> Option<f64> {
        match self {
            ReferenceTracker::Mean(mean) => mean.value(),
            ReferenceTracker::Max(max) => max.value(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DynamicBenchmarkState {
    cadence: CadenceTracker,
    reference: ReferenceTracker,
}

/// Tiered drop scaling measured against a moving reference price.
#[derive(Debug, Clone)]
pub struct DynamicBenchmarkDropStrategy {
    base_amount: f64,
    cadence: Cadence,
    reference: BenchmarkReference,
    tiers: Vec<DropTier>,
    max_daily_amount: Option<f64>,
}

impl DynamicBenchmarkDropStrategy {
    pub fn new(
        base_amount: f64,
        cadence: Cadence,
        reference: BenchmarkReference,
        thresholds: &[[f64; 2]],
        max_daily_amount: Option<f64>,
    ) -> BacktestResult<Self> {
        match reference {
            BenchmarkReference::MovingAverage { window }
            | BenchmarkReference::TrailingMax { window } => {
                require_window("benchmark window", window)?;
            }
        }
        if let Some(cap) = max_daily_amount {
            require_positive("max_daily_amount", cap)?;
        }
        Ok(Self {
            base_amount: require_positive("base_amount", base_amount)?,
            cadence,
            reference,
            tiers: build_drop_tiers(thresholds)?,
            max_daily_amount,
        })
    }
}

impl BuyPolicy for DynamicBenchmarkDropStrategy {
    type State = DynamicBenchmarkState;

    fn type_id(&self) -> &'static str {
        "dynamic_benchmark"
    }

    fn initial_state(&self) -> Self::State {
        let reference = match self.reference {
            BenchmarkReference::MovingAverage { window } => {
                ReferenceTracker::Mean(RollingMean::new(window))
            }
            BenchmarkReference::TrailingMax { window } => {
                ReferenceTracker::Max(RollingMax::new(window))
            }
        };
        DynamicBenchmarkState {
            cadence: CadenceTracker::default(),
            reference,
        }
    }

    fn decide(&self, day: &MarketDay<'_>, state: &mut Self::State) -> BacktestResult<f64> {
        state.reference.push(day.price);
        if !state.cadence.advance(self.cadence, day.date) {
            return Ok(0.0);
        }

        let multiplier = match state.reference.value() {
            Some(reference) => tier_multiplier(&self.tiers, drop_ratio(reference, day.price)),
            None => 1.0,
        };
        Ok(clip_to_cap(
            self.base_amount * multiplier,
            self.max_daily_amount,
        ))
    }
}
