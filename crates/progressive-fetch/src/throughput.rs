//! Adaptive slice sizing.
//!
//! Throughput is tracked as an exponential moving average of points per
//! millisecond. The next slice is sized so that, at the current estimate,
//! it takes the target wall-clock time.

use std::time::Duration;

use crate::config::FetchConfig;

#[derive(Debug, Clone)]
pub struct ThroughputEstimator {
    smoothing: f64,
    target_ms: f64,
    initial: u64,
    min: u64,
    max: u64,
    points_per_ms: Option<f64>,
}

impl ThroughputEstimator {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            smoothing: config.smoothing,
            target_ms: config.target_slice_ms as f64,
            initial: config.initial_slice_points,
            min: config.min_slice_points,
            max: config.max_slice_points,
            points_per_ms: None,
        }
    }

    /// Current estimate, if any slice has completed.
    pub fn points_per_ms(&self) -> Option<f64> {
        self.points_per_ms
    }

    /// Fold in one completed slice.
    pub fn record(&mut self, points: u64, elapsed: Duration) {
        // Sub-millisecond slices (cache hits) would report absurd rates
        let ms = (elapsed.as_secs_f64() * 1000.0).max(1.0);
        let sample = points as f64 / ms;

        self.points_per_ms = Some(match self.points_per_ms {
            Some(previous) => self.smoothing * sample + (1.0 - self.smoothing) * previous,
            None => sample,
        });
    }

    /// Points to request in the next slice, within the configured bounds.
    pub fn next_slice_points(&self) -> u64 {
        match self.points_per_ms {
            Some(rate) => {
                let points = (rate * self.target_ms).round();
                (points.max(0.0) as u64).clamp(self.min, self.max)
            }
            None => self.initial.clamp(self.min, self.max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> ThroughputEstimator {
        ThroughputEstimator::new(&FetchConfig {
            target_slice_ms: 100,
            initial_slice_points: 1_000,
            min_slice_points: 100,
            max_slice_points: 100_000,
            smoothing: 0.3,
            ..FetchConfig::default()
        })
    }

    #[test]
    fn test_initial_size_before_samples() {
        assert_eq!(estimator().next_slice_points(), 1_000);
    }

    #[test]
    fn test_first_sample_sets_rate() {
        let mut e = estimator();
        e.record(5_000, Duration::from_millis(100));
        assert_eq!(e.points_per_ms(), Some(50.0));
        assert_eq!(e.next_slice_points(), 5_000);
    }

    #[test]
    fn test_smoothing_weights_new_sample() {
        let mut e = estimator();
        e.record(5_000, Duration::from_millis(100)); // 50 pts/ms
        e.record(15_000, Duration::from_millis(100)); // 150 pts/ms
        let rate = e.points_per_ms().unwrap();
        assert!((rate - (0.3 * 150.0 + 0.7 * 50.0)).abs() < 1e-9);
        assert_eq!(e.next_slice_points(), 8_000);
    }

    #[test]
    fn test_clamped_to_bounds() {
        let mut e = estimator();
        e.record(10, Duration::from_secs(10));
        assert_eq!(e.next_slice_points(), 100);

        let mut e = estimator();
        e.record(10_000_000, Duration::from_millis(1));
        assert_eq!(e.next_slice_points(), 100_000);
    }
}
