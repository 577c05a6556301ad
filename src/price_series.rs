use crate::error::{BacktestError, BacktestResult};
use crate::models::{PriceAdjustment, PricePoint};
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

const PRICE_SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct PriceSnapshot {
    version: u32,
    symbol: String,
    adjustment: PriceAdjustment,
    points: Vec<PricePoint>,
}

/// JSON layout accepted by `load_from_file` for `.json` inputs.
#[derive(Serialize, Deserialize)]
struct PriceSeriesFile {
    symbol: String,
    #[serde(default)]
    adjustment: PriceAdjustment,
    points: Vec<PricePoint>,
}

/// Chronologically sorted, validated closes of one instrument.
///
/// Immutable once built; runs borrow it read-only, so one series can back any
/// number of concurrent strategy runs.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    adjustment: PriceAdjustment,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(
        symbol: impl Into<String>,
        adjustment: PriceAdjustment,
        points: Vec<PricePoint>,
    ) -> BacktestResult<Self> {
        let symbol = symbol.into();
        validate_points(&symbol, &points)?;
        Ok(Self {
            symbol,
            adjustment,
            points,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn adjustment(&self) -> PriceAdjustment {
        self.adjustment
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn has_chip_ratio(&self) -> bool {
        self.points.iter().any(|p| p.chip_ratio.is_some())
    }

    /// Inclusive `[start, end]` sub-range as a new series.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> BacktestResult<Self> {
        if end < start {
            return Err(BacktestError::configuration(format!(
                "end date {} is before start date {}",
                end, start
            )));
        }
        let from = self.points.partition_point(|p| p.date < start);
        let to = self.points.partition_point(|p| p.date <= end);
        if from >= to {
            return Err(BacktestError::data_integrity(format!(
                "{} has no prices between {} and {}",
                self.symbol, start, end
            )));
        }
        Ok(Self {
            symbol: self.symbol.clone(),
            adjustment: self.adjustment,
            points: self.points[from..to].to_vec(),
        })
    }

    /// Loads a `.json` price file or a bincode snapshot written by `save_to_file`.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> BacktestResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| {
            BacktestError::Io(format!(
                "failed to open price data at {}: {}",
                path.display(),
                err
            ))
        })?;
        let reader = BufReader::new(file);

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let series = if is_json {
            let raw: PriceSeriesFile = serde_json::from_reader(reader)?;
            Self::new(raw.symbol, raw.adjustment, raw.points)?
        } else {
            let snapshot: PriceSnapshot = bincode::deserialize_from(reader)?;
            if snapshot.version != PRICE_SNAPSHOT_VERSION {
                return Err(BacktestError::Decode(format!(
                    "price snapshot version mismatch (found {}, expected {})",
                    snapshot.version, PRICE_SNAPSHOT_VERSION
                )));
            }
            Self::new(snapshot.symbol, snapshot.adjustment, snapshot.points)?
        };

        info!(
            "Loaded {} prices for {} from {}",
            series.len(),
            series.symbol,
            path.display()
        );
        Ok(series)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> BacktestResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(path).map_err(|err| {
            BacktestError::Io(format!(
                "unable to create price snapshot at {}: {}",
                path.display(),
                err
            ))
        })?;
        let mut writer = BufWriter::new(file);
        let snapshot = PriceSnapshot {
            version: PRICE_SNAPSHOT_VERSION,
            symbol: self.symbol.clone(),
            adjustment: self.adjustment,
            points: self.points.clone(),
        };
        bincode::serialize_into(&mut writer, &snapshot)?;
        writer.flush()?;
        Ok(())
    }
}

fn validate_points(symbol: &str, points: &[PricePoint]) -> BacktestResult<()> {
    if points.is_empty() {
        return Err(BacktestError::data_integrity(format!(
            "price series for {} is empty",
            symbol
        )));
    }

    for (index, point) in points.iter().enumerate() {
        if !point.close.is_finite() || point.close <= 0.0 {
            return Err(BacktestError::data_integrity(format!(
                "{} has non-positive close {} on {}",
                symbol, point.close, point.date
            )));
        }
        if let Some(ratio) = point.chip_ratio {
            if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
                return Err(BacktestError::data_integrity(format!(
                    "{} has chip ratio {} outside [0, 1] on {}",
                    symbol, ratio, point.date
                )));
            }
        }
        if index > 0 && points[index - 1].date >= point.date {
            return Err(BacktestError::data_integrity(format!(
                "{} dates are not strictly increasing at {}",
                symbol, point.date
            )));
        }
    }

    Ok(())
}
