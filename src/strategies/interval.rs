use crate::error::{BacktestError, BacktestResult};
use crate::models::Cadence;
use crate::param_utils::require_positive;
use crate::strategy::{BuyPolicy, MarketDay};
use crate::strategy_utils::CadenceTracker;
use chrono::NaiveDate;

/// Inclusive date window with its own amount and cadence.
#[derive(Debug, Clone, PartialEq)]
pub struct InvestmentWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub amount: f64,
    pub cadence: Cadence,
}

impl InvestmentWindow {
    fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Fixed investment whose amount and cadence change by date window.
/// Days outside every window buy nothing; the first matching window wins.
#[derive(Debug, Clone)]
pub struct IntervalFixedInvestment {
    windows: Vec<InvestmentWindow>,
}

impl IntervalFixedInvestment {
    pub fn new(windows: Vec<InvestmentWindow>) -> BacktestResult<Self> {
        if windows.is_empty() {
            return Err(BacktestError::configuration(
                "interval strategy needs at least one window",
            ));
        }
        for window in &windows {
            if window.end < window.start {
                return Err(BacktestError::configuration(format!(
                    "interval window ends ({}) before it starts ({})",
                    window.end, window.start
                )));
            }
            require_positive("interval amount", window.amount)?;
        }
        Ok(Self { windows })
    }
}

impl BuyPolicy for IntervalFixedInvestment {
    type State = CadenceTracker;

    fn type_id(&self) -> &'static str {
        "interval"
    }

    fn initial_state(&self) -> Self::State {
        CadenceTracker::default()
    }

    fn decide(&self, day: &MarketDay<'_>, state: &mut Self::State) -> BacktestResult<f64> {
        let window = self.windows.iter().find(|window| window.contains(day.date));
        let cadence = window.map(|w| w.cadence).unwrap_or_default();
        let fires = state.advance(cadence, day.date);
        Ok(match window {
            Some(window) if fires => window.amount,
            _ => 0.0,
        })
    }
}
