use crate::config::TradingCosts;
use crate::error::{BacktestError, BacktestResult};
use crate::models::{PricePoint, ResultRecord, ResultSeries};
use crate::price_series::PriceSeries;
use crate::strategy::{MarketDay, Strategy};
use log::{debug, info};

/// Running totals of one backtest run. Shares only ever grow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioState {
    total_invested: f64,
    shares_held: f64,
}

impl PortfolioState {
    pub fn total_invested(&self) -> f64 {
        self.total_invested
    }

    pub fn shares_held(&self) -> f64 {
        self.shares_held
    }

    /// Book a buy; the whole `amount` counts as invested, `fee` only reduces
    /// the shares received. Returns the shares bought.
    pub fn buy(&mut self, amount: f64, fee: f64, price: f64) -> f64 {
        if amount <= 0.0 {
            return 0.0;
        }
        let shares = (amount - fee).max(0.0) / price;
        self.total_invested += amount;
        self.shares_held += shares;
        shares
    }

    /// Zero while nothing is held.
    pub fn average_cost(&self) -> f64 {
        if self.shares_held > 0.0 {
            self.total_invested / self.shares_held
        } else {
            0.0
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares_held * price
    }

    /// Exactly zero while nothing has been invested.
    pub fn return_rate(&self, price: f64) -> f64 {
        if self.total_invested > 0.0 {
            self.market_value(price) / self.total_invested - 1.0
        } else {
            0.0
        }
    }
}

/// Single-pass, deterministic simulation of one strategy over one series.
#[derive(Debug, Clone, Default)]
pub struct BacktestEngine {
    costs: TradingCosts,
}

impl BacktestEngine {
    pub fn new(costs: TradingCosts) -> BacktestResult<Self> {
        costs.validate()?;
        Ok(Self { costs })
    }

    pub fn run(&self, series: &PriceSeries, strategy: &Strategy) -> BacktestResult<ResultSeries> {
        self.run_points(series.symbol(), series.points(), strategy)
    }

    /// Run over raw points. Prices are re-checked day by day so that a
    /// corrupted point fails the whole run instead of skewing average cost.
    pub fn run_points(
        &self,
        symbol: &str,
        points: &[PricePoint],
        strategy: &Strategy,
    ) -> BacktestResult<ResultSeries> {
        if points.is_empty() {
            return Err(BacktestError::data_integrity(format!(
                "no prices to backtest {} on {}",
                strategy.name(),
                symbol
            )));
        }

        let mut state = strategy.initial_state();
        let mut portfolio = PortfolioState::default();
        let mut records = Vec::with_capacity(points.len());
        let mut missing_data_days = 0usize;

        for (index, point) in points.iter().enumerate() {
            if !point.close.is_finite() || point.close <= 0.0 {
                return Err(BacktestError::data_integrity(format!(
                    "{} has non-positive price {} on {}",
                    symbol, point.close, point.date
                )));
            }
            if index > 0 && points[index - 1].date >= point.date {
                return Err(BacktestError::data_integrity(format!(
                    "{} dates are not strictly increasing at {}",
                    symbol, point.date
                )));
            }

            let day = MarketDay {
                index,
                date: point.date,
                price: point.close,
                chip_ratio: point.chip_ratio,
                history: &points[..=index],
            };
            let mut missing_data = false;
            let buy_amount = match strategy.decide_buy_amount(&day, &mut state) {
                Ok(amount) => amount,
                Err(BacktestError::InsufficientData(message)) => {
                    debug!(
                        "{}: no buy on {} ({})",
                        strategy.name(),
                        point.date,
                        message
                    );
                    missing_data_days += 1;
                    missing_data = true;
                    0.0
                }
                Err(err) => return Err(err),
            };

            let fee = self.costs.fee_for(buy_amount);
            let shares_bought = portfolio.buy(buy_amount, fee, point.close);
            let market_value = portfolio.market_value(point.close);
            records.push(ResultRecord {
                date: point.date,
                price: point.close,
                buy_amount,
                fee,
                shares_bought,
                total_invested: portfolio.total_invested(),
                shares_held: portfolio.shares_held(),
                average_cost: portfolio.average_cost(),
                market_value,
                profit: market_value - portfolio.total_invested(),
                return_rate: portfolio.return_rate(point.close),
                chip_ratio: point.chip_ratio,
                missing_data,
            });
        }

        if let Some(last) = records.last() {
            info!(
                "{} on {}: invested {:.2}, value {:.2}, return {:.2}% over {} days",
                strategy.name(),
                symbol,
                last.total_invested,
                last.market_value,
                last.return_rate * 100.0,
                records.len()
            );
        }

        Ok(ResultSeries {
            strategy_name: strategy.name().to_string(),
            symbol: symbol.to_string(),
            missing_data_days,
            records,
        })
    }
}
