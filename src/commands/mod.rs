pub mod backtest;
pub mod export_snapshot;
pub mod list_strategies;
