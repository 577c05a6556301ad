use crate::error::{BacktestError, BacktestResult};
use crate::indicators::RollingMean;
use crate::models::Cadence;
use crate::param_utils::{require_positive, require_window};
use crate::strategy::{BuyPolicy, MarketDay};
use crate::strategy_utils::{clip_to_cap, drop_ratio, CadenceTracker};

pub const DEFAULT_K_FACTOR: f64 = 30.0;
pub const DEFAULT_MAX_MULTIPLIER: f64 = 5.0;
pub const DEFAULT_MA_WINDOW: usize = 250;

#[derive(Debug, Clone)]
pub struct QuadraticMaState {
    cadence: CadenceTracker,
    mean: RollingMean,
}

/// Multiplier `1 + k * d^2` where `d` is the fractional gap below the
/// moving average, bounded by `max_multiplier`.
#[derive(Debug, Clone)]
pub struct QuadraticMaStrategy {
    base_amount: f64,
    cadence: Cadence,
    k_factor: f64,
    max_multiplier: f64,
    ma_window: usize,
    max_daily_amount: Option<f64>,
}

impl QuadraticMaStrategy {
    pub fn new(
        base_amount: f64,
        cadence: Cadence,
        k_factor: f64,
        max_multiplier: f64,
        ma_window: usize,
        max_daily_amount: Option<f64>,
    ) -> BacktestResult<Self> {
        let max_multiplier = require_positive("max_multiplier", max_multiplier)?;
        if max_multiplier < 1.0 {
            return Err(BacktestError::configuration(format!(
                "max_multiplier must be >= 1 (value: {})",
                max_multiplier
            )));
        }
        if let Some(cap) = max_daily_amount {
            require_positive("max_daily_amount", cap)?;
        }
        Ok(Self {
            base_amount: require_positive("base_amount", base_amount)?,
            cadence,
            k_factor: require_positive("k_factor", k_factor)?,
            max_multiplier,
            ma_window: require_window("ma_window", ma_window)?,
            max_daily_amount,
        })
    }

    pub fn multiplier_for(&self, moving_average: f64, price: f64) -> f64 {
        let gap = drop_ratio(moving_average, price);
        (1.0 + self.k_factor * gap * gap).min(self.max_multiplier)
    }
}

impl BuyPolicy for QuadraticMaStrategy {
    type State = QuadraticMaState;

    fn type_id(&self) -> &'static str {
        "quadratic_ma"
    }

    fn initial_state(&self) -> Self::State {
        QuadraticMaState {
            cadence: CadenceTracker::default(),
            mean: RollingMean::new(self.ma_window),
        }
    }

    fn decide(&self, day: &MarketDay<'_>, state: &mut Self::State) -> BacktestResult<f64> {
        state.mean.push(day.price);
        if !state.cadence.advance(self.cadence, day.date) {
            return Ok(0.0);
        }

        let multiplier = state
            .mean
            .value()
            .map(|ma| self.multiplier_for(ma, day.price))
            .unwrap_or(1.0);
        Ok(clip_to_cap(
            self.base_amount * multiplier,
            self.max_daily_amount,
        ))
    }
}
