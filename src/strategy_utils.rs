use crate::error::{BacktestError, BacktestResult};
use crate::models::Cadence;
use crate::param_utils::require_positive;
use chrono::NaiveDate;

/// Tolerance applied when a ratio is compared against a configured level.
pub const THRESHOLD_EPSILON: f64 = 1e-9;

/// Remembers the previous trading day so cadence checks see only the past.
#[derive(Debug, Clone, Default)]
pub struct CadenceTracker {
    previous: Option<NaiveDate>,
}

impl CadenceTracker {
    /// Advance to `today` and report whether it opens a new cadence period.
    /// Must be called exactly once per simulated day.
    pub fn advance(&mut self, cadence: Cadence, today: NaiveDate) -> bool {
        let fires = cadence.is_new_period(self.previous, today);
        self.previous = Some(today);
        fires
    }
}

/// Drop level (fraction below a reference price) and the multiplier it unlocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropTier {
    pub level: f64,
    pub multiplier: f64,
}

/// Validate and sort tiers from the deepest drop to the shallowest.
pub fn build_drop_tiers(raw: &[[f64; 2]]) -> BacktestResult<Vec<DropTier>> {
    if raw.is_empty() {
        return Err(BacktestError::configuration(
            "at least one drop threshold is required",
        ));
    }
    let mut tiers = raw
        .iter()
        .map(|&[level, multiplier]| {
            let level = require_positive("threshold level", level)?;
            if level >= 1.0 {
                return Err(BacktestError::configuration(format!(
                    "drop threshold must be below 1.0 (value: {})",
                    level
                )));
            }
            Ok(DropTier {
                level,
                multiplier: require_positive("threshold multiplier", multiplier)?,
            })
        })
        .collect::<BacktestResult<Vec<_>>>()?;
    tiers.sort_by(|a, b| b.level.total_cmp(&a.level));
    Ok(tiers)
}

/// Multiplier of the deepest tier whose level the drop has reached; 1.0 otherwise.
pub fn tier_multiplier(tiers: &[DropTier], drop_ratio: f64) -> f64 {
    tiers
        .iter()
        .find(|tier| drop_ratio + THRESHOLD_EPSILON >= tier.level)
        .map(|tier| tier.multiplier)
        .unwrap_or(1.0)
}

/// Fraction by which `price` sits below `reference`; 0 when at or above it.
pub fn drop_ratio(reference: f64, price: f64) -> f64 {
    if reference <= 0.0 || price >= reference {
        return 0.0;
    }
    (reference - price) / reference
}

/// Clip an amount to the optional per-day maximum.
pub fn clip_to_cap(amount: f64, max_daily_amount: Option<f64>) -> f64 {
    match max_daily_amount {
        Some(cap) => amount.min(cap),
        None => amount,
    }
}
