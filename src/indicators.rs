use std::collections::VecDeque;

/// Simple moving average over the last `period` observations, updated one
/// price at a time with a running window sum.
#[derive(Debug, Clone)]
pub struct RollingMean {
    period: usize,
    window: VecDeque<f64>,
    window_sum: f64,
}

impl RollingMean {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            window: VecDeque::new(),
            window_sum: 0.0,
        }
    }

    pub fn push(&mut self, price: f64) {
        self.window.push_back(price);
        self.window_sum += price;
        if self.window.len() > self.period {
            if let Some(dropped) = self.window.pop_front() {
                self.window_sum -= dropped;
            }
        }
    }

    /// `None` until a full window has been observed.
    pub fn value(&self) -> Option<f64> {
        if self.period == 0 || self.window.len() < self.period {
            return None;
        }
        Some(self.window_sum / self.period as f64)
    }
}

/// Maximum over the last `period` observations (monotonic deque).
///
/// Unlike the moving average this reports a value from the first day on,
/// using whatever shorter history is available.
#[derive(Debug, Clone)]
pub struct RollingMax {
    period: usize,
    seen: usize,
    candidates: VecDeque<(usize, f64)>,
}

impl RollingMax {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            seen: 0,
            candidates: VecDeque::new(),
        }
    }

    pub fn push(&mut self, price: f64) {
        let index = self.seen;
        self.seen += 1;
        while matches!(self.candidates.back(), Some(&(_, last)) if last <= price) {
            self.candidates.pop_back();
        }
        self.candidates.push_back((index, price));
        while matches!(self.candidates.front(), Some(&(first, _)) if first + self.period <= index)
        {
            self.candidates.pop_front();
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.candidates.front().map(|&(_, price)| price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_mean(prices: &[f64], end: usize, period: usize) -> Option<f64> {
        if end + 1 < period {
            return None;
        }
        let window = &prices[end + 1 - period..=end];
        Some(window.iter().sum::<f64>() / period as f64)
    }

    fn naive_max(prices: &[f64], end: usize, period: usize) -> f64 {
        let start = (end + 1).saturating_sub(period);
        prices[start..=end]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    fn sample_prices() -> Vec<f64> {
        (0..40)
            .map(|i| 10.0 + ((i * 7) % 11) as f64 - (i % 3) as f64 * 0.5)
            .collect()
    }

    #[test]
    fn rolling_mean_matches_window_average() {
        let prices = sample_prices();
        let mut mean = RollingMean::new(5);
        for (i, &price) in prices.iter().enumerate() {
            mean.push(price);
            match (mean.value(), naive_mean(&prices, i, 5)) {
                (Some(actual), Some(expected)) => assert!((actual - expected).abs() < 1e-9),
                (None, None) => {}
                other => panic!("mismatch at {}: {:?}", i, other),
            }
        }
    }

    #[test]
    fn rolling_mean_is_empty_before_full_window() {
        let mut mean = RollingMean::new(3);
        mean.push(1.0);
        mean.push(2.0);
        assert_eq!(mean.value(), None);
        mean.push(3.0);
        assert_eq!(mean.value(), Some(2.0));
    }

    #[test]
    fn rolling_max_matches_trailing_window_maximum() {
        let prices = sample_prices();
        let mut max = RollingMax::new(4);
        for (i, &price) in prices.iter().enumerate() {
            max.push(price);
            assert_eq!(max.value(), Some(naive_max(&prices, i, 4)), "index {}", i);
        }
    }

    #[test]
    fn rolling_max_uses_partial_history() {
        let mut max = RollingMax::new(60);
        assert_eq!(max.value(), None);
        max.push(5.0);
        max.push(3.0);
        assert_eq!(max.value(), Some(5.0));
    }
}
