use crate::backtester::StrategyOutcome;
use crate::models::{ResultRecord, ResultSeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const DAYS_PER_YEAR: f64 = 365.25;
const MIN_CAGR_YEARS: f64 = 0.01;

/// How runs that end on different dates are lined up in the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentPolicy {
    /// Read every run as of the latest date all successful runs reached.
    #[default]
    SharedTrailingDate,
    /// Report each run at its own last record.
    OwnFinalDay,
}

impl AlignmentPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlignmentPolicy::SharedTrailingDate => "shared_trailing_date",
            AlignmentPolicy::OwnFinalDay => "own_final_day",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub strategy_name: String,
    pub strategy_type: String,
    pub as_of: Option<NaiveDate>,
    pub total_invested: f64,
    pub final_value: f64,
    pub profit: f64,
    pub average_cost: f64,
    pub return_rate: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub buy_days: usize,
    pub missing_data_days: usize,
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SummaryRow {
    fn failed(outcome: &StrategyOutcome, kind: &str, message: String) -> Self {
        Self {
            strategy_name: outcome.name.clone(),
            strategy_type: outcome.strategy_type.to_string(),
            as_of: None,
            total_invested: 0.0,
            final_value: 0.0,
            profit: 0.0,
            average_cost: 0.0,
            return_rate: 0.0,
            annualized_return: 0.0,
            max_drawdown: 0.0,
            buy_days: 0,
            missing_data_days: 0,
            failed: true,
            error_kind: Some(kind.to_string()),
            error: Some(message),
        }
    }
}

/// Side-by-side comparison of every strategy in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub alignment: AlignmentPolicy,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub rows: Vec<SummaryRow>,
}

impl ComparisonTable {
    pub fn successful_rows(&self) -> impl Iterator<Item = &SummaryRow> {
        self.rows.iter().filter(|row| !row.failed)
    }

    pub fn failed_rows(&self) -> impl Iterator<Item = &SummaryRow> {
        self.rows.iter().filter(|row| row.failed)
    }
}

/// Build the comparison table. Failed runs are kept as flagged rows after
/// every successful one; successful rows are sorted by return rate, best first.
pub fn build_summary(outcomes: &[StrategyOutcome], alignment: AlignmentPolicy) -> ComparisonTable {
    let completed: Vec<&ResultSeries> = outcomes
        .iter()
        .filter_map(|outcome| outcome.result.as_ref().ok())
        .filter(|series| !series.records.is_empty())
        .collect();

    let shared_end = match alignment {
        AlignmentPolicy::SharedTrailingDate => completed
            .iter()
            .filter_map(|series| series.final_record().map(|record| record.date))
            .min(),
        AlignmentPolicy::OwnFinalDay => None,
    };

    let mut rows = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for outcome in outcomes {
        let series = match &outcome.result {
            Ok(series) => series,
            Err(err) => {
                failures.push(SummaryRow::failed(outcome, err.kind(), err.to_string()));
                continue;
            }
        };
        let end_index = match shared_end {
            Some(date) => series.index_on_or_before(date),
            None => series.records.len().checked_sub(1),
        };
        match end_index {
            Some(index) => rows.push(summarize_run(outcome, series, index)),
            None => failures.push(SummaryRow::failed(
                outcome,
                "data_integrity",
                match shared_end {
                    Some(date) => format!("no records on or before {}", date),
                    None => "no records".to_string(),
                },
            )),
        }
    }

    rows.sort_by(|a, b| {
        b.return_rate
            .partial_cmp(&a.return_rate)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.strategy_name.cmp(&b.strategy_name))
    });
    rows.extend(failures);

    let start_date = completed
        .iter()
        .filter_map(|series| series.records.first().map(|record| record.date))
        .min();
    let end_date = shared_end.or_else(|| {
        completed
            .iter()
            .filter_map(|series| series.final_record().map(|record| record.date))
            .max()
    });

    ComparisonTable {
        alignment,
        start_date,
        end_date,
        rows,
    }
}

fn summarize_run(outcome: &StrategyOutcome, series: &ResultSeries, end_index: usize) -> SummaryRow {
    let records = &series.records[..=end_index];
    let first = &records[0];
    let last = &records[end_index];
    let days = (last.date - first.date).num_days();

    SummaryRow {
        strategy_name: outcome.name.clone(),
        strategy_type: outcome.strategy_type.to_string(),
        as_of: Some(last.date),
        total_invested: last.total_invested,
        final_value: last.market_value,
        profit: last.profit,
        average_cost: last.average_cost,
        return_rate: last.return_rate,
        annualized_return: calculate_cagr(last.total_invested, last.market_value, days),
        max_drawdown: calculate_max_drawdown(records),
        buy_days: series.buy_days_through(end_index),
        missing_data_days: series.missing_data_days_through(end_index),
        failed: false,
        error_kind: None,
        error: None,
    }
}

/// Annualized growth of `final_value` over `total_invested` across `days`
/// calendar days, as a fraction. Zero when it cannot be computed or the span
/// is too short to annualize.
pub fn calculate_cagr(total_invested: f64, final_value: f64, days: i64) -> f64 {
    if total_invested <= 0.0 || final_value <= 0.0 || days <= 0 {
        return 0.0;
    }
    if !total_invested.is_finite() || !final_value.is_finite() {
        return 0.0;
    }
    let years = days as f64 / DAYS_PER_YEAR;
    if years < MIN_CAGR_YEARS {
        return 0.0;
    }
    let cagr = (final_value / total_invested).powf(1.0 / years) - 1.0;
    if cagr.is_finite() {
        cagr
    } else {
        0.0
    }
}

/// Largest fall of market value from its running peak, as a fraction of the peak.
pub fn calculate_max_drawdown(records: &[ResultRecord]) -> f64 {
    let mut peak = 0.0_f64;
    let mut max_drawdown = 0.0_f64;
    for record in records {
        let value = record.market_value;
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            max_drawdown = max_drawdown.max((peak - value) / peak);
        }
    }
    max_drawdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BacktestError;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn record(day: u32, invested: f64, value: f64) -> ResultRecord {
        ResultRecord {
            date: date(day),
            price: 10.0,
            buy_amount: 100.0,
            fee: 0.0,
            shares_bought: 10.0,
            total_invested: invested,
            shares_held: invested / 10.0,
            average_cost: 10.0,
            market_value: value,
            profit: value - invested,
            return_rate: if invested > 0.0 { value / invested - 1.0 } else { 0.0 },
            chip_ratio: None,
            missing_data: false,
        }
    }

    fn missing(day: u32, invested: f64, value: f64) -> ResultRecord {
        ResultRecord {
            buy_amount: 0.0,
            shares_bought: 0.0,
            missing_data: true,
            ..record(day, invested, value)
        }
    }

    fn outcome(name: &str, records: Vec<ResultRecord>) -> StrategyOutcome {
        StrategyOutcome {
            name: name.to_string(),
            strategy_type: "fixed",
            result: Ok(ResultSeries {
                strategy_name: name.to_string(),
                symbol: "TEST".to_string(),
                missing_data_days: 0,
                records,
            }),
        }
    }

    #[test]
    fn cagr_matches_one_and_two_year_growth() {
        assert!((calculate_cagr(1000.0, 1100.0, 365) - 0.10).abs() < 0.005);
        assert!((calculate_cagr(1000.0, 1210.0, 730) - 0.10).abs() < 0.01);
    }

    #[test]
    fn cagr_is_zero_when_undefined() {
        assert_eq!(calculate_cagr(0.0, 100.0, 365), 0.0);
        assert_eq!(calculate_cagr(100.0, 0.0, 365), 0.0);
        assert_eq!(calculate_cagr(100.0, 110.0, 0), 0.0);
        assert_eq!(calculate_cagr(-100.0, 110.0, 365), 0.0);
        assert_eq!(calculate_cagr(1000.0, 1100.0, 1), 0.0);
    }

    #[test]
    fn max_drawdown_tracks_running_peak() {
        let records = vec![
            record(1, 100.0, 100.0),
            record(2, 200.0, 250.0),
            record(3, 300.0, 200.0),
            record(4, 400.0, 400.0),
            record(5, 500.0, 350.0),
        ];
        assert!((calculate_max_drawdown(&records) - 0.2).abs() < 1e-12);
        assert_eq!(calculate_max_drawdown(&[]), 0.0);
    }

    #[test]
    fn rows_are_sorted_by_return_with_failures_last() {
        let outcomes = vec![
            StrategyOutcome {
                name: "broken".to_string(),
                strategy_type: "quadratic_ma",
                result: Err(BacktestError::data_integrity("bad price")),
            },
            outcome("a", vec![record(1, 1000.0, 1100.0)]),
            outcome("b", vec![record(1, 2000.0, 2400.0)]),
        ];
        let table = build_summary(&outcomes, AlignmentPolicy::OwnFinalDay);
        let names: Vec<_> = table.rows.iter().map(|r| r.strategy_name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "broken"]);
        assert!(table.rows[2].failed);
        assert_eq!(table.rows[2].error_kind.as_deref(), Some("data_integrity"));
        assert_eq!(table.rows[0].error_kind, None);
        assert!(table.rows[2]
            .error
            .as_deref()
            .unwrap()
            .contains("bad price"));
        assert_eq!(table.successful_rows().count(), 2);
        assert_eq!(table.failed_rows().count(), 1);
    }

    #[test]
    fn empty_batch_yields_empty_table() {
        let table = build_summary(&[], AlignmentPolicy::SharedTrailingDate);
        assert!(table.rows.is_empty());
        assert_eq!(table.start_date, None);
        assert_eq!(table.end_date, None);
    }

    #[test]
    fn shared_trailing_date_truncates_longer_runs() {
        let short = outcome("short", vec![record(1, 100.0, 100.0), record(2, 200.0, 210.0)]);
        let long = outcome(
            "long",
            vec![
                record(1, 100.0, 100.0),
                record(2, 200.0, 190.0),
                record(3, 300.0, 600.0),
            ],
        );
        let outcomes = vec![short, long];

        let shared = build_summary(&outcomes, AlignmentPolicy::SharedTrailingDate);
        assert_eq!(shared.end_date, Some(date(2)));
        let long_row = shared
            .rows
            .iter()
            .find(|row| row.strategy_name == "long")
            .unwrap();
        assert_eq!(long_row.as_of, Some(date(2)));
        assert_eq!(long_row.final_value, 190.0);
        assert_eq!(shared.rows[0].strategy_name, "short");

        let own = build_summary(&outcomes, AlignmentPolicy::OwnFinalDay);
        assert_eq!(own.end_date, Some(date(3)));
        assert_eq!(own.rows[0].strategy_name, "long");
        assert_eq!(own.rows[0].final_value, 600.0);
        assert_eq!(own.rows[0].buy_days, 3);
    }

    #[test]
    fn missing_days_after_shared_date_are_not_counted() {
        let short = outcome("short", vec![record(1, 100.0, 100.0), record(2, 200.0, 210.0)]);
        let mut long = outcome(
            "long",
            vec![
                record(1, 100.0, 100.0),
                missing(2, 100.0, 95.0),
                missing(3, 100.0, 90.0),
                missing(4, 100.0, 120.0),
            ],
        );
        if let Ok(series) = &mut long.result {
            series.missing_data_days = 3;
        }
        let outcomes = vec![short, long];

        let shared = build_summary(&outcomes, AlignmentPolicy::SharedTrailingDate);
        let long_row = shared
            .rows
            .iter()
            .find(|row| row.strategy_name == "long")
            .unwrap();
        assert_eq!(long_row.as_of, Some(date(2)));
        assert_eq!(long_row.missing_data_days, 1);
        assert_eq!(long_row.buy_days, 1);

        let own = build_summary(&outcomes, AlignmentPolicy::OwnFinalDay);
        let long_row = own
            .rows
            .iter()
            .find(|row| row.strategy_name == "long")
            .unwrap();
        assert_eq!(long_row.missing_data_days, 3);
    }

    #[test]
    fn alignment_policy_serializes_in_snake_case() {
        let json = serde_json::to_string(&AlignmentPolicy::OwnFinalDay).unwrap();
        assert_eq!(json, "\"own_final_day\"");
        assert_eq!(
            AlignmentPolicy::SharedTrailingDate.as_str(),
            "shared_trailing_date"
        );
    }
}
