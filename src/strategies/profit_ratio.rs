use crate::error::{BacktestError, BacktestResult};
use crate::models::Cadence;
use crate::param_utils::require_positive;
use crate::strategy::{BuyPolicy, MarketDay};
use crate::strategy_utils::{clip_to_cap, CadenceTracker};

pub const DEFAULT_BANDS: [[f64; 2]; 2] = [[0.01, 10.0], [0.05, 2.0]];

/// Chip-ratio ceiling and the multiplier applied below it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioBand {
    pub limit: f64,
    pub multiplier: f64,
}

/// Contrarian sizing: the fewer holders in profit, the larger the buy.
#[derive(Debug, Clone)]
pub struct ProfitRatioStrategy {
    base_amount: f64,
    cadence: Cadence,
    bands: Vec<RatioBand>,
    max_daily_amount: Option<f64>,
}

impl ProfitRatioStrategy {
    pub fn new(
        base_amount: f64,
        cadence: Cadence,
        thresholds: &[[f64; 2]],
        max_daily_amount: Option<f64>,
    ) -> BacktestResult<Self> {
        if thresholds.is_empty() {
            return Err(BacktestError::configuration(
                "profit_ratio needs at least one threshold band",
            ));
        }
        let mut bands = thresholds
            .iter()
            .map(|&[limit, multiplier]| {
                let limit = require_positive("profit ratio limit", limit)?;
                if limit > 1.0 {
                    return Err(BacktestError::configuration(format!(
                        "profit ratio limit must be <= 1 (value: {})",
                        limit
                    )));
                }
                Ok(RatioBand {
                    limit,
                    multiplier: require_positive("profit ratio multiplier", multiplier)?,
                })
            })
            .collect::<BacktestResult<Vec<_>>>()?;
        // Most extreme (lowest) limit is matched first.
        bands.sort_by(|a, b| a.limit.total_cmp(&b.limit));

        if let Some(cap) = max_daily_amount {
            require_positive("max_daily_amount", cap)?;
        }
        Ok(Self {
            base_amount: require_positive("base_amount", base_amount)?,
            cadence,
            bands,
            max_daily_amount,
        })
    }

    pub fn multiplier_for(&self, ratio: f64) -> f64 {
        self.bands
            .iter()
            .find(|band| ratio < band.limit)
            .map(|band| band.multiplier)
            .unwrap_or(1.0)
    }
}

impl BuyPolicy for ProfitRatioStrategy {
    type State = CadenceTracker;

    fn type_id(&self) -> &'static str {
        "profit_ratio"
    }

    fn initial_state(&self) -> Self::State {
        CadenceTracker::default()
    }

    fn decide(&self, day: &MarketDay<'_>, state: &mut Self::State) -> BacktestResult<f64> {
        if !state.advance(self.cadence, day.date) {
            return Ok(0.0);
        }
        let ratio = day.chip_ratio.ok_or_else(|| {
            BacktestError::insufficient_data(format!(
                "no chip profit ratio on {} (day {})",
                day.date, day.index
            ))
        })?;
        Ok(clip_to_cap(
            self.base_amount * self.multiplier_for(ratio),
            self.max_daily_amount,
        ))
    }
}
