use crate::error::{BacktestError, BacktestResult};
use std::collections::HashMap;

/// Extract a parameter as f64 with a default value
pub fn get_param_f64(params: &HashMap<String, f64>, key: &str, default: f64) -> f64 {
    params.get(key).copied().unwrap_or(default)
}

/// Longest rolling window a strategy may ask for, in trading days.
pub const MAX_WINDOW: usize = 5_000;

/// Read a window length in trading days, `default` when absent.
/// Fractional, non-finite and out-of-range values are rejected, not rounded.
pub fn window_param(
    params: &HashMap<String, f64>,
    key: &str,
    default: usize,
) -> BacktestResult<usize> {
    let Some(raw) = params.get(key).copied() else {
        return require_window(key, default);
    };
    if !raw.is_finite() || raw.fract() != 0.0 {
        return Err(BacktestError::configuration(format!(
            "{} must be a whole number of days (value: {})",
            key, raw
        )));
    }
    if raw < 1.0 || raw > MAX_WINDOW as f64 {
        return Err(BacktestError::configuration(format!(
            "{} must be between 1 and {} (value: {})",
            key, MAX_WINDOW, raw
        )));
    }
    Ok(raw as usize)
}

/// Look up the first key present among `keys`
pub fn first_param(params: &HashMap<String, f64>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| params.get(*key).copied())
}

/// Require a finite, strictly positive value
pub fn require_positive(name: &str, value: f64) -> BacktestResult<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(BacktestError::configuration(format!(
            "{} must be a positive number (value: {})",
            name, value
        )));
    }
    Ok(value)
}

/// Require a finite value >= 0
pub fn require_non_negative(name: &str, value: f64) -> BacktestResult<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(BacktestError::configuration(format!(
            "{} must be >= 0 (value: {})",
            name, value
        )));
    }
    Ok(value)
}

/// Require a window length between one day and `MAX_WINDOW`
pub fn require_window(name: &str, value: usize) -> BacktestResult<usize> {
    if value == 0 || value > MAX_WINDOW {
        return Err(BacktestError::configuration(format!(
            "{} must be between 1 and {} (value: {})",
            name, MAX_WINDOW, value
        )));
    }
    Ok(value)
}

/// Read a required positive parameter under any of `keys`
pub fn require_positive_param(params: &HashMap<String, f64>, keys: &[&str]) -> BacktestResult<f64> {
    let name = keys.first().copied().unwrap_or("parameter");
    let value = first_param(params, keys)
        .ok_or_else(|| BacktestError::configuration(format!("missing required parameter {}", name)))?;
    require_positive(name, value)
}

/// Read an optional positive parameter; present-but-invalid is an error
pub fn optional_positive_param(
    params: &HashMap<String, f64>,
    keys: &[&str],
) -> BacktestResult<Option<f64>> {
    let name = keys.first().copied().unwrap_or("parameter");
    first_param(params, keys)
        .map(|value| require_positive(name, value))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), *value))
            .collect()
    }

    #[test]
    fn reads_defaults_when_missing() {
        let map = params(&[]);
        assert_eq!(get_param_f64(&map, "k_factor", 30.0), 30.0);
        assert_eq!(window_param(&map, "ma_window", 250).unwrap(), 250);
    }

    #[test]
    fn window_accepts_whole_days_in_range() {
        let map = params(&[("ma_window", 20.0), ("max_window", MAX_WINDOW as f64)]);
        assert_eq!(window_param(&map, "ma_window", 250).unwrap(), 20);
        assert_eq!(window_param(&map, "max_window", 60).unwrap(), MAX_WINDOW);
    }

    #[test]
    fn window_rejects_fractional_non_finite_and_huge_values() {
        for raw in [19.6, f64::NAN, f64::INFINITY, 0.0, -3.0, 1e12, 1e20] {
            let map = params(&[("ma_window", raw)]);
            assert!(
                matches!(
                    window_param(&map, "ma_window", 250),
                    Err(BacktestError::Configuration(_))
                ),
                "accepted ma_window {}",
                raw
            );
        }
        assert!(require_window("ma_window", MAX_WINDOW + 1).is_err());
        assert!(require_window("ma_window", 0).is_err());
    }

    #[test]
    fn required_positive_accepts_aliases() {
        let map = params(&[("base_amount", 150.0)]);
        assert_eq!(
            require_positive_param(&map, &["amount", "base_amount"]).unwrap(),
            150.0
        );
    }

    #[test]
    fn required_positive_rejects_missing_and_non_positive() {
        assert!(matches!(
            require_positive_param(&params(&[]), &["amount"]),
            Err(BacktestError::Configuration(_))
        ));
        assert!(matches!(
            require_positive_param(&params(&[("amount", 0.0)]), &["amount"]),
            Err(BacktestError::Configuration(_))
        ));
        assert!(matches!(
            require_positive_param(&params(&[("amount", f64::NAN)]), &["amount"]),
            Err(BacktestError::Configuration(_))
        ));
    }

    #[test]
    fn optional_positive_is_none_when_absent() {
        assert_eq!(
            optional_positive_param(&params(&[]), &["max_daily_amount"]).unwrap(),
            None
        );
        assert!(optional_positive_param(&params(&[("max_daily_amount", -5.0)]), &["max_daily_amount"])
            .is_err());
    }
}
