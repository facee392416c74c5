//! Rolling-window outlier removal for raw sensor series.
//!
//! For every sample the mean and sample standard deviation (n - 1) of the
//! trailing window `(t - window, t]` are computed over the *raw* input, and
//! the sample is dropped when it deviates from that mean by strictly more
//! than `threshold` standard deviations. Windows holding a single point have
//! no standard deviation, so their sample is always kept.

use std::collections::VecDeque;

use chrono::Duration;

use crate::types::Sample;

/// Default deviation multiplier.
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Default trailing window length in minutes (4 hours).
pub const DEFAULT_WINDOW_MINUTES: i64 = 240;

// ---------------------------------------------------------------------------
// TimeSeriesCleaner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSeriesCleaner {
    threshold: f64,
    window: Duration,
}

impl Default for TimeSeriesCleaner {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, Duration::minutes(DEFAULT_WINDOW_MINUTES))
    }
}

impl TimeSeriesCleaner {
    pub fn new(threshold: f64, window: Duration) -> Self {
        Self { threshold, window }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Return the samples that survive outlier removal, in input order.
    ///
    /// Non-finite values are discarded up front, as are samples whose
    /// timestamp does not strictly increase over the previous accepted one,
    /// so the output is always strictly ordered.
    pub fn clean(&self, samples: &[Sample]) -> Vec<Sample> {
        let series = normalize(samples);
        let Some(first) = series.first() else {
            return Vec::new();
        };

        // Values are shifted by the first one before accumulating so the
        // running sum of squares does not lose precision on large readings.
        let shift = first.value;
        let mut window = RollingStats::default();
        let mut members: VecDeque<&Sample> = VecDeque::new();
        let mut kept = Vec::with_capacity(series.len());

        for sample in &series {
            let lower_bound = sample.timestamp - self.window;
            while let Some(oldest) = members.front() {
                if oldest.timestamp > lower_bound {
                    break;
                }
                window.remove(oldest.value - shift);
                members.pop_front();
            }
            members.push_back(sample);
            window.push(sample.value - shift);

            let keep = match window.mean_and_std() {
                Some((mean, std)) => (sample.value - shift - mean).abs() <= self.threshold * std,
                None => true,
            };
            if keep {
                kept.push(*sample);
            }
        }

        kept
    }
}

/// Drop non-finite values and out-of-order timestamps.
fn normalize(samples: &[Sample]) -> Vec<Sample> {
    let mut out: Vec<Sample> = Vec::with_capacity(samples.len());
    for sample in samples.iter().filter(|s| s.value.is_finite()) {
        if let Some(last) = out.last() {
            if sample.timestamp <= last.timestamp {
                continue;
            }
        }
        out.push(*sample);
    }
    out
}

#[derive(Debug, Default)]
struct RollingStats {
    count: usize,
    sum: f64,
    sum_sq: f64,
}

impl RollingStats {
    fn push(&mut self, x: f64) {
        self.count += 1;
        self.sum += x;
        self.sum_sq += x * x;
    }

    fn remove(&mut self, x: f64) {
        self.count -= 1;
        self.sum -= x;
        self.sum_sq -= x * x;
    }

    /// Mean and sample standard deviation; `None` below two points.
    fn mean_and_std(&self) -> Option<(f64, f64)> {
        if self.count < 2 {
            return None;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        let variance = ((self.sum_sq - self.sum * mean) / (n - 1.0)).max(0.0);
        Some((mean, variance.sqrt()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
