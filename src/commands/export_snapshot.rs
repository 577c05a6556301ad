use crate::price_series::PriceSeries;
use anyhow::{Context, Result};
use log::info;
use std::path::Path;

pub fn run(input_path: &Path, output_path: &Path) -> Result<()> {
    info!(
        "Generating price snapshot at {} from {}",
        output_path.display(),
        input_path.display()
    );

    let series = PriceSeries::load_from_file(input_path)
        .with_context(|| format!("Failed to load price data from {}", input_path.display()))?;
    series
        .save_to_file(output_path)
        .with_context(|| format!("Failed to write snapshot to {}", output_path.display()))?;

    info!(
        "Price snapshot for {} ({} days) successfully written to {}",
        series.symbol(),
        series.len(),
        output_path.display()
    );
    Ok(())
}
