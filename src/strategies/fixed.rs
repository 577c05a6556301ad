use crate::error::BacktestResult;
use crate::models::Cadence;
use crate::param_utils::require_positive;
use crate::strategy::{BuyPolicy, MarketDay};
use crate::strategy_utils::CadenceTracker;

/// Invest the same amount on every cadence day.
#[derive(Debug, Clone)]
pub struct FixedInvestment {
    amount: f64,
    cadence: Cadence,
}

impl FixedInvestment {
    pub fn new(amount: f64, cadence: Cadence) -> BacktestResult<Self> {
        Ok(Self {
            amount: require_positive("amount", amount)?,
            cadence,
        })
    }
}

impl BuyPolicy for FixedInvestment {
    type State = CadenceTracker;

    fn type_id(&self) -> &'static str {
        "fixed"
    }

    fn initial_state(&self) -> Self::State {
        CadenceTracker::default()
    }

    fn decide(&self, day: &MarketDay<'_>, state: &mut Self::State) -> BacktestResult<f64> {
        if state.advance(self.cadence, day.date) {
            Ok(self.amount)
        } else {
            Ok(0.0)
        }
    }
}
