use crate::error::{BacktestError, BacktestResult};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One trading day of an instrument: adjusted close plus the optional
/// share of accumulated volume currently in profit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
    #[serde(default)]
    pub chip_ratio: Option<f64>,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            chip_ratio: None,
        }
    }

    pub fn with_chip_ratio(mut self, ratio: f64) -> Self {
        self.chip_ratio = Some(ratio);
        self
    }
}

/// Corporate-action adjustment the data provider applied to the closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceAdjustment {
    #[default]
    Front,
    Back,
    None,
}

impl PriceAdjustment {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceAdjustment::Front => "front",
            PriceAdjustment::Back => "back",
            PriceAdjustment::None => "none",
        }
    }
}

/// Schedule on which a strategy may place a non-zero order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Cadence {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Cadence {
    pub fn parse(raw: &str) -> BacktestResult<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "D" | "DAILY" => Ok(Self::Daily),
            "W" | "WEEKLY" => Ok(Self::Weekly),
            "M" | "MONTHLY" => Ok(Self::Monthly),
            other => Err(BacktestError::configuration(format!(
                "cadence must be D, W or M (value: {})",
                other
            ))),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Cadence::Daily => "D",
            Cadence::Weekly => "W",
            Cadence::Monthly => "M",
        }
    }

    /// Whether `current` opens a new cadence period relative to the previous
    /// trading day. The first day of a run always does.
    pub fn is_new_period(&self, previous: Option<NaiveDate>, current: NaiveDate) -> bool {
        let Some(previous) = previous else {
            return true;
        };
        match self {
            Cadence::Daily => true,
            Cadence::Weekly => previous.iso_week() != current.iso_week(),
            Cadence::Monthly => {
                previous.month() != current.month() || previous.year() != current.year()
            }
        }
    }
}

/// Per-day output of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub date: NaiveDate,
    pub price: f64,
    pub buy_amount: f64,
    pub fee: f64,
    pub shares_bought: f64,
    pub total_invested: f64,
    pub shares_held: f64,
    pub average_cost: f64,
    pub market_value: f64,
    pub profit: f64,
    pub return_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chip_ratio: Option<f64>,
    /// Set when the strategy lacked an input it needed and bought nothing.
    #[serde(default)]
    pub missing_data: bool,
}

/// Ordered per-day records of one strategy over one price series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSeries {
    pub strategy_name: String,
    pub symbol: String,
    pub missing_data_days: usize,
    pub records: Vec<ResultRecord>,
}

impl ResultSeries {
    pub fn final_record(&self) -> Option<&ResultRecord> {
        self.records.last()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date)),
            _ => None,
        }
    }

    /// Index of the last record dated on or before `date`.
    pub fn index_on_or_before(&self, date: NaiveDate) -> Option<usize> {
        let count = self.records.partition_point(|record| record.date <= date);
        count.checked_sub(1)
    }

    /// Largest peak-to-trough fall of market value, as a fraction.
    pub fn max_drawdown(&self) -> f64 {
        crate::performance::calculate_max_drawdown(&self.records)
    }

    /// Days with a non-zero buy among records `0..=end_index`.
    pub fn buy_days_through(&self, end_index: usize) -> usize {
        self.records
            .iter()
            .take(end_index + 1)
            .filter(|record| record.buy_amount > 0.0)
            .count()
    }

    /// Missing-data days among records `0..=end_index`.
    pub fn missing_data_days_through(&self, end_index: usize) -> usize {
        self.records
            .iter()
            .take(end_index + 1)
            .filter(|record| record.missing_data)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_cadence_codes_case_insensitively() {
        assert_eq!(Cadence::parse("d").unwrap(), Cadence::Daily);
        assert_eq!(Cadence::parse(" W ").unwrap(), Cadence::Weekly);
        assert_eq!(Cadence::parse("monthly").unwrap(), Cadence::Monthly);
        assert!(matches!(
            Cadence::parse("Q"),
            Err(BacktestError::Configuration(_))
        ));
    }

    #[test]
    fn weekly_cadence_fires_on_first_day_of_iso_week() {
        let friday = date(2024, 1, 5);
        let monday = date(2024, 1, 8);
        let tuesday = date(2024, 1, 9);
        assert!(Cadence::Weekly.is_new_period(None, friday));
        assert!(Cadence::Weekly.is_new_period(Some(friday), monday));
        assert!(!Cadence::Weekly.is_new_period(Some(monday), tuesday));
    }

    #[test]
    fn weekly_cadence_treats_year_boundary_inside_iso_week_as_same_week() {
        // 2024-12-31 and 2025-01-02 both belong to ISO week 1 of 2025.
        assert!(!Cadence::Weekly.is_new_period(Some(date(2024, 12, 31)), date(2025, 1, 2)));
    }

    #[test]
    fn monthly_cadence_fires_on_month_change_only() {
        assert!(!Cadence::Monthly.is_new_period(Some(date(2024, 1, 2)), date(2024, 1, 31)));
        assert!(Cadence::Monthly.is_new_period(Some(date(2024, 1, 31)), date(2024, 2, 1)));
        assert!(Cadence::Monthly.is_new_period(Some(date(2023, 2, 28)), date(2024, 2, 1)));
    }

    fn record(d: NaiveDate, buy_amount: f64, missing_data: bool) -> ResultRecord {
        ResultRecord {
            date: d,
            price: 1.0,
            buy_amount,
            fee: 0.0,
            shares_bought: 0.0,
            total_invested: 0.0,
            shares_held: 0.0,
            average_cost: 0.0,
            market_value: 0.0,
            profit: 0.0,
            return_rate: 0.0,
            chip_ratio: None,
            missing_data,
        }
    }

    #[test]
    fn locates_record_on_or_before_date() {
        let series = ResultSeries {
            strategy_name: "s".to_string(),
            symbol: "X".to_string(),
            missing_data_days: 0,
            records: vec![
                record(date(2024, 1, 2), 0.0, false),
                record(date(2024, 1, 4), 0.0, false),
            ],
        };
        assert_eq!(series.index_on_or_before(date(2024, 1, 1)), None);
        assert_eq!(series.index_on_or_before(date(2024, 1, 3)), Some(0));
        assert_eq!(series.index_on_or_before(date(2024, 1, 9)), Some(1));
    }

    #[test]
    fn counts_buy_and_missing_days_up_to_index() {
        let series = ResultSeries {
            strategy_name: "s".to_string(),
            symbol: "X".to_string(),
            missing_data_days: 2,
            records: vec![
                record(date(2024, 1, 2), 100.0, false),
                record(date(2024, 1, 3), 0.0, true),
                record(date(2024, 1, 4), 100.0, false),
                record(date(2024, 1, 5), 0.0, true),
            ],
        };
        assert_eq!(series.buy_days_through(0), 1);
        assert_eq!(series.missing_data_days_through(2), 1);
        assert_eq!(series.buy_days_through(3), 2);
        assert_eq!(series.missing_data_days_through(3), 2);
        assert_eq!(series.missing_data_days_through(10), 2);
    }
}
