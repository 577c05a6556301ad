use crate::config::StrategyDefinition;
use crate::error::{BacktestError, BacktestResult};
use crate::models::{Cadence, PricePoint};
use crate::param_utils::{
    first_param, get_param_f64, optional_positive_param, require_positive_param, window_param,
};
use chrono::NaiveDate;

/// Everything a strategy may look at on one simulated day.
///
/// `history` ends with today; later prices are never reachable from here.
#[derive(Debug, Clone, Copy)]
pub struct MarketDay<'a> {
    pub index: usize,
    pub date: NaiveDate,
    pub price: f64,
    pub chip_ratio: Option<f64>,
    pub history: &'a [PricePoint],
}

impl<'a> MarketDay<'a> {
    /// View of the last point of `history` as "today".
    pub fn from_history(history: &'a [PricePoint]) -> Option<Self> {
        let today = history.last()?;
        Some(Self {
            index: history.len() - 1,
            date: today.date,
            price: today.close,
            chip_ratio: today.chip_ratio,
            history,
        })
    }
}

/// Decision capability shared by every strategy variant.
///
/// `decide` must be called once per simulated day in chronological order; it
/// advances `state` as a side effect.
pub trait BuyPolicy {
    type State;

    fn type_id(&self) -> &'static str;
    fn initial_state(&self) -> Self::State;
    fn decide(&self, day: &MarketDay<'_>, state: &mut Self::State) -> BacktestResult<f64>;
}

#[path = "strategies/fixed.rs"]
pub mod fixed;

pub use fixed::FixedInvestment;

#[path = "strategies/interval.rs"]
pub mod interval;

pub use interval::{IntervalFixedInvestment, InvestmentWindow};

#[path = "strategies/benchmark_drop.rs"]
pub mod benchmark_drop;

pub use benchmark_drop::{BenchmarkDropStrategy, DropScaling};

#[path = "strategies/dynamic_benchmark.rs"]
pub mod dynamic_benchmark;

pub use dynamic_benchmark::{BenchmarkReference, DynamicBenchmarkDropStrategy};

#[path = "strategies/quadratic_ma.rs"]
pub mod quadratic_ma;

pub use quadratic_ma::QuadraticMaStrategy;

#[path = "strategies/profit_ratio.rs"]
pub mod profit_ratio;

pub use profit_ratio::ProfitRatioStrategy;

pub const STRATEGY_TYPES: [&str; 6] = [
    "fixed",
    "interval",
    "benchmark_drop",
    "dynamic_benchmark",
    "quadratic_ma",
    "profit_ratio",
];

#[derive(Debug, Clone)]
pub enum StrategyKind {
    Fixed(FixedInvestment),
    IntervalFixed(IntervalFixedInvestment),
    BenchmarkDrop(BenchmarkDropStrategy),
    DynamicBenchmarkDrop(DynamicBenchmarkDropStrategy),
    QuadraticMa(QuadraticMaStrategy),
    ProfitRatio(ProfitRatioStrategy),
}

/// Rolling memory of one run. Created by `Strategy::initial_state` and
/// dropped when the run ends.
#[derive(Debug, Clone)]
pub enum StrategyState {
    Fixed(<FixedInvestment as BuyPolicy>::State),
    IntervalFixed(<IntervalFixedInvestment as BuyPolicy>::State),
    BenchmarkDrop(<BenchmarkDropStrategy as BuyPolicy>::State),
    DynamicBenchmarkDrop(<DynamicBenchmarkDropStrategy as BuyPolicy>::State),
    QuadraticMa(<QuadraticMaStrategy as BuyPolicy>::State),
    ProfitRatio(<ProfitRatioStrategy as BuyPolicy>::State),
}

/// A named, fully validated strategy configuration.
#[derive(Debug, Clone)]
pub struct Strategy {
    name: String,
    kind: StrategyKind,
}

impl Strategy {
    pub fn new(name: impl Into<String>, kind: StrategyKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> &'static str {
        match &self.kind {
            StrategyKind::Fixed(s) => s.type_id(),
            StrategyKind::IntervalFixed(s) => s.type_id(),
            StrategyKind::BenchmarkDrop(s) => s.type_id(),
            StrategyKind::DynamicBenchmarkDrop(s) => s.type_id(),
            StrategyKind::QuadraticMa(s) => s.type_id(),
            StrategyKind::ProfitRatio(s) => s.type_id(),
        }
    }

    pub fn initial_state(&self) -> StrategyState {
        match &self.kind {
            StrategyKind::Fixed(s) => StrategyState::Fixed(s.initial_state()),
            StrategyKind::IntervalFixed(s) => StrategyState::IntervalFixed(s.initial_state()),
            StrategyKind::BenchmarkDrop(s) => StrategyState::BenchmarkDrop(s.initial_state()),
            StrategyKind::DynamicBenchmarkDrop(s) => {
                StrategyState::DynamicBenchmarkDrop(s.initial_state())
            }
            StrategyKind::QuadraticMa(s) => StrategyState::QuadraticMa(s.initial_state()),
            StrategyKind::ProfitRatio(s) => StrategyState::ProfitRatio(s.initial_state()),
        }
    }

    /// Buy amount (currency, >= 0) for `day`, advancing `state`.
    pub fn decide_buy_amount(
        &self,
        day: &MarketDay<'_>,
        state: &mut StrategyState,
    ) -> BacktestResult<f64> {
        let amount = match (&self.kind, state) {
            (StrategyKind::Fixed(s), StrategyState::Fixed(st)) => s.decide(day, st),
            (StrategyKind::IntervalFixed(s), StrategyState::IntervalFixed(st)) => s.decide(day, st),
            (StrategyKind::BenchmarkDrop(s), StrategyState::BenchmarkDrop(st)) => s.decide(day, st),
            (StrategyKind::DynamicBenchmarkDrop(s), StrategyState::DynamicBenchmarkDrop(st)) => {
                s.decide(day, st)
            }
            (StrategyKind::QuadraticMa(s), StrategyState::QuadraticMa(st)) => s.decide(day, st),
            (StrategyKind::ProfitRatio(s), StrategyState::ProfitRatio(st)) => s.decide(day, st),
            _ => {
                return Err(BacktestError::configuration(format!(
                    "state passed to {} was created for a different strategy type",
                    self.name
                )))
            }
        }?;

        if !amount.is_finite() || amount < 0.0 {
            return Err(BacktestError::data_integrity(format!(
                "{} produced invalid buy amount {} on {}",
                self.name, amount, day.date
            )));
        }
        Ok(amount)
    }
}

/// Build a validated strategy from its configuration entry.
pub fn create_strategy(definition: &StrategyDefinition) -> BacktestResult<Strategy> {
    let params = &definition.parameters;
    let cadence = match definition.cadence.as_deref() {
        Some(raw) => Cadence::parse(raw)?,
        None => Cadence::Daily,
    };
    let max_daily_amount = optional_positive_param(params, &["max_daily_amount"])?;

    let (kind, default_name) = match definition.strategy_type.trim().to_ascii_lowercase().as_str()
    {
        "fixed" => {
            let amount = require_positive_param(params, &["amount", "base_amount"])?;
            (
                StrategyKind::Fixed(FixedInvestment::new(amount, cadence)?),
                format!("Fixed_{}_{}", cadence.code(), amount),
            )
        }
        "interval" => {
            let windows = definition
                .intervals
                .iter()
                .map(|window| {
                    Ok(InvestmentWindow {
                        start: window.start,
                        end: window.end,
                        amount: window.amount,
                        cadence: match window.cadence.as_deref() {
                            Some(raw) => Cadence::parse(raw)?,
                            None => Cadence::Monthly,
                        },
                    })
                })
                .collect::<BacktestResult<Vec<_>>>()?;
            (
                StrategyKind::IntervalFixed(IntervalFixedInvestment::new(windows)?),
                "Interval_Custom".to_string(),
            )
        }
        "benchmark_drop" => {
            let base_amount = require_positive_param(params, &["base_amount", "amount"])?;
            let scaling = match (first_param(params, &["scale_factor"]), &definition.thresholds) {
                (Some(_), Some(_)) => {
                    return Err(BacktestError::configuration(
                        "benchmark_drop takes either thresholds or scale_factor, not both",
                    ))
                }
                (Some(scale_factor), None) => DropScaling::linear(scale_factor)?,
                (None, Some(thresholds)) => DropScaling::tiered(thresholds)?,
                (None, None) => DropScaling::tiered(&benchmark_drop::DEFAULT_THRESHOLDS)?,
            };
            let label = scaling.label();
            (
                StrategyKind::BenchmarkDrop(BenchmarkDropStrategy::new(
                    base_amount,
                    cadence,
                    scaling,
                    max_daily_amount,
                )?),
                format!("BenchmarkDrop_{}_{}", cadence.code(), label),
            )
        }
        "dynamic_benchmark" => {
            let base_amount = require_positive_param(params, &["base_amount", "amount"])?;
            let reference = BenchmarkReference::parse(
                definition.benchmark.as_deref().unwrap_or("ma250"),
                params,
            )?;
            let thresholds = definition
                .thresholds
                .as_deref()
                .unwrap_or(&dynamic_benchmark::DEFAULT_THRESHOLDS);
            let label = reference.label();
            (
                StrategyKind::DynamicBenchmarkDrop(DynamicBenchmarkDropStrategy::new(
                    base_amount,
                    cadence,
                    reference,
                    thresholds,
                    max_daily_amount,
                )?),
                format!("DynamicBenchmark_{}", label),
            )
        }
        "quadratic_ma" => {
            let base_amount = require_positive_param(params, &["base_amount", "amount"])?;
            let k_factor = get_param_f64(params, "k_factor", quadratic_ma::DEFAULT_K_FACTOR);
            let strategy = QuadraticMaStrategy::new(
                base_amount,
                cadence,
                k_factor,
                get_param_f64(
                    params,
                    "max_multiplier",
                    quadratic_ma::DEFAULT_MAX_MULTIPLIER,
                ),
                window_param(params, "ma_window", quadratic_ma::DEFAULT_MA_WINDOW)?,
                max_daily_amount,
            )?;
            (
                StrategyKind::QuadraticMa(strategy),
                format!("QuadraticMA_K{}", k_factor),
            )
        }
        "profit_ratio" => {
            let base_amount = require_positive_param(params, &["base_amount", "amount"])?;
            let thresholds = definition
                .thresholds
                .as_deref()
                .unwrap_or(&profit_ratio::DEFAULT_BANDS);
            (
                StrategyKind::ProfitRatio(ProfitRatioStrategy::new(
                    base_amount,
                    cadence,
                    thresholds,
                    max_daily_amount,
                )?),
                "Profit_Ratio_Dynamic".to_string(),
            )
        }
        other => {
            return Err(BacktestError::configuration(format!(
                "unknown strategy type: {} (expected one of {})",
                other,
                STRATEGY_TYPES.join(", ")
            )))
        }
    };

    let name = definition
        .name
        .as_ref()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or(default_name);
    Ok(Strategy::new(name, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntervalDefinition;
    use std::collections::HashMap;

    fn definition(strategy_type: &str, params: &[(&str, f64)]) -> StrategyDefinition {
        StrategyDefinition {
            strategy_type: strategy_type.to_string(),
            name: None,
            cadence: None,
            parameters: params
                .iter()
                .map(|(key, value)| (key.to_string(), *value))
                .collect::<HashMap<_, _>>(),
            thresholds: None,
            benchmark: None,
            intervals: Vec::new(),
        }
    }

    fn history(prices: &[f64]) -> Vec<PricePoint> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint::new(start + chrono::Duration::days(i as i64), close))
            .collect()
    }

    #[test]
    fn builds_fixed_strategy_with_default_name() {
        let mut def = definition("fixed", &[("amount", 200.0)]);
        def.cadence = Some("W".to_string());
        let strategy = create_strategy(&def).unwrap();
        assert_eq!(strategy.type_id(), "fixed");
        assert_eq!(strategy.name(), "Fixed_W_200");
    }

    #[test]
    fn explicit_name_overrides_default() {
        let mut def = definition("quadratic_ma", &[("base_amount", 100.0)]);
        def.name = Some("  ma boost ".to_string());
        assert_eq!(create_strategy(&def).unwrap().name(), "ma boost");
    }

    #[test]
    fn missing_unit_amount_is_a_configuration_error() {
        for strategy_type in ["fixed", "benchmark_drop", "quadratic_ma", "profit_ratio"] {
            let err = create_strategy(&definition(strategy_type, &[])).unwrap_err();
            assert!(
                matches!(err, BacktestError::Configuration(_)),
                "{} accepted a missing amount",
                strategy_type
            );
        }
    }

    #[test]
    fn non_positive_parameters_are_rejected() {
        let err = create_strategy(&definition(
            "quadratic_ma",
            &[("base_amount", 100.0), ("ma_window", 0.0)],
        ))
        .unwrap_err();
        assert!(matches!(err, BacktestError::Configuration(_)));

        let err = create_strategy(&definition(
            "fixed",
            &[("amount", 100.0), ("max_daily_amount", -1.0)],
        ))
        .unwrap_err();
        assert!(matches!(err, BacktestError::Configuration(_)));
    }

    #[test]
    fn oversized_or_fractional_windows_are_configuration_errors() {
        for ma_window in [1e20, 1e12, 19.6, f64::NAN] {
            let err = create_strategy(&definition(
                "quadratic_ma",
                &[("base_amount", 100.0), ("ma_window", ma_window)],
            ))
            .unwrap_err();
            assert!(
                matches!(err, BacktestError::Configuration(_)),
                "ma_window {} was accepted",
                ma_window
            );
        }

        let mut def = definition(
            "dynamic_benchmark",
            &[("base_amount", 100.0), ("max_window", 1e20)],
        );
        def.benchmark = Some("max60".to_string());
        assert!(matches!(
            create_strategy(&def),
            Err(BacktestError::Configuration(_))
        ));

        def.parameters.remove("max_window");
        def.benchmark = Some("max99999999".to_string());
        assert!(matches!(
            create_strategy(&def),
            Err(BacktestError::Configuration(_))
        ));
    }

    #[test]
    fn dynamic_benchmark_defaults_to_tiered_thresholds() {
        let mut def = definition("dynamic_benchmark", &[("base_amount", 100.0)]);
        def.benchmark = Some("max60".to_string());
        let strategy = create_strategy(&def).unwrap();
        assert_eq!(strategy.name(), "DynamicBenchmark_max60");

        let points = history(&[10.0, 10.0, 8.9]);
        let mut state = strategy.initial_state();
        let mut amounts = Vec::new();
        for end in 1..=points.len() {
            let day = MarketDay::from_history(&points[..end]).unwrap();
            amounts.push(strategy.decide_buy_amount(&day, &mut state).unwrap());
        }
        // 11% below the trailing max reaches the 10% tier of the defaults.
        assert_eq!(amounts, vec![100.0, 100.0, 200.0]);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = create_strategy(&definition("martingale", &[("amount", 1.0)])).unwrap_err();
        assert!(matches!(err, BacktestError::Configuration(_)));
    }

    #[test]
    fn benchmark_drop_rejects_both_scaling_modes() {
        let mut def = definition(
            "benchmark_drop",
            &[("base_amount", 100.0), ("scale_factor", 1.0)],
        );
        def.thresholds = Some(vec![[0.1, 2.0]]);
        assert!(matches!(
            create_strategy(&def),
            Err(BacktestError::Configuration(_))
        ));
    }

    #[test]
    fn builds_interval_strategy_from_windows() {
        let mut def = definition("interval", &[]);
        def.intervals = vec![IntervalDefinition {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            amount: 100.0,
            cadence: Some("M".to_string()),
        }];
        let strategy = create_strategy(&def).unwrap();
        assert_eq!(strategy.type_id(), "interval");
        assert_eq!(strategy.name(), "Interval_Custom");
    }

    #[test]
    fn mismatched_state_is_rejected() {
        let fixed = create_strategy(&definition("fixed", &[("amount", 100.0)])).unwrap();
        let quadratic =
            create_strategy(&definition("quadratic_ma", &[("base_amount", 100.0)])).unwrap();
        let points = history(&[10.0]);
        let day = MarketDay::from_history(&points).unwrap();
        let mut foreign_state = quadratic.initial_state();
        assert!(fixed.decide_buy_amount(&day, &mut foreign_state).is_err());
    }

    #[test]
    fn market_day_reflects_last_history_point() {
        let points = history(&[10.0, 11.0, 12.0]);
        let day = MarketDay::from_history(&points[..2]).unwrap();
        assert_eq!(day.index, 1);
        assert_eq!(day.price, 11.0);
        assert_eq!(day.history.len(), 2);
        assert!(MarketDay::from_history(&[]).is_none());
    }
}
