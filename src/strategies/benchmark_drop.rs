use crate::error::BacktestResult;
use crate::models::Cadence;
use crate::param_utils::require_positive;
use crate::strategy::{BuyPolicy, MarketDay};
use crate::strategy_utils::{
    build_drop_tiers, clip_to_cap, drop_ratio, tier_multiplier, CadenceTracker, DropTier,
};

pub const DEFAULT_THRESHOLDS: [[f64; 2]; 2] = [[0.10, 2.0], [0.20, 3.0]];

/// How the drop below the benchmark turns into a multiplier.
#[derive(Debug, Clone, PartialEq)]
pub enum DropScaling {
    /// Step-wise: deepest reached tier wins.
    Tiered(Vec<DropTier>),
    /// `1 + drop_ratio * scale_factor`.
    Linear { scale_factor: f64 },
}

impl DropScaling {
    pub fn tiered(raw: &[[f64; 2]]) -> BacktestResult<Self> {
        Ok(Self::Tiered(build_drop_tiers(raw)?))
    }

    pub fn linear(scale_factor: f64) -> BacktestResult<Self> {
        Ok(Self::Linear {
            scale_factor: require_positive("scale_factor", scale_factor)?,
        })
    }

    pub fn multiplier(&self, drop_ratio: f64) -> f64 {
        match self {
            DropScaling::Tiered(tiers) => tier_multiplier(tiers, drop_ratio),
            DropScaling::Linear { scale_factor } => 1.0 + drop_ratio * scale_factor,
        }
    }

    pub fn label(&self) -> String {
        match self {
            DropScaling::Tiered(tiers) => format!("tiers{}", tiers.len()),
            DropScaling::Linear { scale_factor } => format!("x{}", scale_factor),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BenchmarkDropState {
    cadence: CadenceTracker,
    benchmark: Option<f64>,
}

/// Scales the base amount by how far price has fallen below the first
/// day's close, which stays fixed for the whole run.
#[derive(Debug, Clone)]
pub struct BenchmarkDropStrategy {
    base_amount: f64,
    cadence: Cadence,
    scaling: DropScaling,
    max_daily_amount: Option<f64>,
}

impl BenchmarkDropStrategy {
    pub fn new(
        base_amount: f64,
        cadence: Cadence,
        scaling: DropScaling,
        max_daily_amount: Option<f64>,
    ) -> BacktestResult<Self> {
        if let Some(cap) = max_daily_amount {
            require_positive("max_daily_amount", cap)?;
        }
        Ok(Self {
            base_amount: require_positive("base_amount", base_amount)?,
            cadence,
            scaling,
            max_daily_amount,
        })
    }
}

impl BuyPolicy for BenchmarkDropStrategy {
    type State = BenchmarkDropState;

    fn type_id(&self) -> &'static str {
        "benchmark_drop"
    }

    fn initial_state(&self) -> Self::State {
        BenchmarkDropState::default()
    }

    fn decide(&self, day: &MarketDay<'_>, state: &mut Self::State) -> BacktestResult<f64> {
        let benchmark = *state
            .benchmark
            .get_or_insert_with(|| day.history.first().map_or(day.price, |first| first.close));
        if !state.cadence.advance(self.cadence, day.date) {
            return Ok(0.0);
        }

        let multiplier = self.scaling.multiplier(drop_ratio(benchmark, day.price));
        Ok(clip_to_cap(
            self.base_amount * multiplier,
            self.max_daily_amount,
        ))
    }
}
