//! Zero-mean, unit-variance scaling with an exact inverse.

/// Standard deviations below this are treated as zero.
const MIN_SCALE: f64 = 1e-10;

/// Standardization parameters captured from the fit data.
///
/// The same instance that scaled the training values must be used to
/// restore predictions, so the inverse is exact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardScaler {
    mean: f64,
    scale: f64,
}

impl StandardScaler {
    /// Fit on `values` using the population standard deviation.
    ///
    /// Returns `None` for an empty slice. A constant series gets scale 1.0
    /// so it maps to all zeros.
    pub fn fit(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        let scale = if std_dev < MIN_SCALE { 1.0 } else { std_dev };
        Some(Self { mean, scale })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }

    pub fn inverse(&self, value: f64) -> f64 {
        value * self.scale + self.mean
    }

    pub fn transform_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| self.transform(*v)).collect()
    }
}
