use crate::backtester::StrategyOutcome;
use crate::error::BacktestResult;
use crate::performance::ComparisonTable;
use log::info;
use serde_json::json;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const RULE_WIDTH: usize = 118;

/// Fixed-width console rendering of the comparison table.
pub fn render_summary_table(table: &ComparisonTable) -> String {
    let mut out = String::new();
    let rule = "=".repeat(RULE_WIDTH);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "STRATEGY COMPARISON");
    let range = match (table.start_date, table.end_date) {
        (Some(start), Some(end)) => format!("{} .. {}", start, end),
        _ => "n/a".to_string(),
    };
    let _ = writeln!(
        out,
        "Period: {} (alignment: {})",
        range,
        table.alignment.as_str()
    );
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "{:<32} {:>14} {:>14} {:>12} {:>10} {:>10} {:>11} {:>9}",
        "Strategy", "Invested", "Final Value", "Avg Cost", "Return %", "CAGR %", "Max DD %", "Buy Days"
    );
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));

    for row in table.successful_rows() {
        let _ = writeln!(
            out,
            "{:<32} {:>14.2} {:>14.2} {:>12.4} {:>10.2} {:>10.2} {:>11.2} {:>9}",
            truncate(&row.strategy_name, 32),
            row.total_invested,
            row.final_value,
            row.average_cost,
            row.return_rate * 100.0,
            row.annualized_return * 100.0,
            row.max_drawdown * 100.0,
            row.buy_days
        );
    }
    for row in table.failed_rows() {
        let _ = writeln!(
            out,
            "{:<32} FAILED: {}",
            truncate(&row.strategy_name, 32),
            row.error.as_deref().unwrap_or("unknown error")
        );
    }
    let _ = writeln!(out, "{}", rule);
    out
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let mut shortened: String = value.chars().take(width.saturating_sub(1)).collect();
        shortened.push('~');
        shortened
    }
}

/// Replace characters that are awkward in file names.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Write one JSON file per successful strategy plus `summary.json`.
/// Returns the paths written.
pub fn write_results(
    dir: &Path,
    outcomes: &[StrategyOutcome],
    table: &ComparisonTable,
) -> BacktestResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    for (index, outcome) in outcomes.iter().enumerate() {
        let Ok(series) = &outcome.result else {
            continue;
        };
        let path = dir.join(format!("{:02}_{}.json", index + 1, file_stem(&outcome.name)));
        let payload = json!({
            "strategy": outcome.name,
            "type": outcome.strategy_type,
            "symbol": series.symbol,
            "missing_data_days": series.missing_data_days,
            "max_drawdown": series.max_drawdown(),
            "records": series.records,
        });
        write_json(&path, &payload)?;
        written.push(path);
    }

    let summary_path = dir.join("summary.json");
    write_json(&summary_path, table)?;
    written.push(summary_path);

    info!("Wrote {} result files to {}", written.len(), dir.display());
    Ok(written)
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> BacktestResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
