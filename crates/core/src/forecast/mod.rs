//! Short-horizon light forecasting.
//!
//! [`Forecaster`] runs the whole per-sensor pipeline: outlier removal,
//! standardization, seasonal model fit, prediction over the horizon with
//! symmetric confidence bounds, and the inverse transform back to sensor
//! units. It is CPU-bound and synchronous; callers decide where it runs.

mod linalg;
pub mod model;
pub mod scaler;

use chrono::{Duration, DurationRound};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::cleaning::TimeSeriesCleaner;
use crate::holidays::HolidaySet;
use crate::types::{ForecastPoint, Sample, Timestamp};

pub use model::{SeasonalModel, SeasonalTerms};
pub use scaler::StandardScaler;

pub const DEFAULT_STEP_MINUTES: i64 = 15;
pub const DEFAULT_HORIZON_MINUTES: i64 = 360;
pub const DEFAULT_INTERVAL_WIDTH: f64 = 0.75;
pub const DEFAULT_RIDGE_PENALTY: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("Insufficient data: required {required} points, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Model fit failed: {0}")]
    ModelFit(String),

    #[error("Invalid forecast configuration: {0}")]
    InvalidConfig(String),
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for one forecaster instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastConfig {
    /// Spacing between forecast timestamps.
    pub step: Duration,
    /// How far past the generation time to forecast (inclusive).
    pub horizon: Duration,
    /// Coverage of the prediction interval, in `(0, 1)`.
    pub interval_width: f64,
    pub outlier_threshold: f64,
    pub outlier_window: Duration,
    pub terms: SeasonalTerms,
    pub ridge_penalty: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            step: Duration::minutes(DEFAULT_STEP_MINUTES),
            horizon: Duration::minutes(DEFAULT_HORIZON_MINUTES),
            interval_width: DEFAULT_INTERVAL_WIDTH,
            outlier_threshold: crate::cleaning::DEFAULT_THRESHOLD,
            outlier_window: Duration::minutes(crate::cleaning::DEFAULT_WINDOW_MINUTES),
            terms: SeasonalTerms::default(),
            ridge_penalty: DEFAULT_RIDGE_PENALTY,
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.step <= Duration::zero() {
            return Err(ForecastError::InvalidConfig("step must be positive".into()));
        }
        if self.horizon < Duration::zero() {
            return Err(ForecastError::InvalidConfig(
                "horizon must not be negative".into(),
            ));
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "interval width {} is outside (0, 1)",
                self.interval_width
            )));
        }
        if self.outlier_window <= Duration::zero() {
            return Err(ForecastError::InvalidConfig(
                "outlier window must be positive".into(),
            ));
        }
        if !(self.ridge_penalty > 0.0) {
            return Err(ForecastError::InvalidConfig(
                "ridge penalty must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Forecaster
// ---------------------------------------------------------------------------

/// Produces a forecast for one sensor's history.
///
/// Implemented by [`Forecaster`]; the seam lets schedulers be exercised with
/// scripted outcomes.
pub trait SeriesForecaster: Send + Sync {
    fn forecast(
        &self,
        history: &[Sample],
        holidays: &HolidaySet,
        now: Timestamp,
    ) -> Result<Vec<ForecastPoint>, ForecastError>;
}

#[derive(Debug, Clone)]
pub struct Forecaster {
    config: ForecastConfig,
    cleaner: TimeSeriesCleaner,
    z: f64,
}

impl Forecaster {
    pub fn new(config: ForecastConfig) -> Result<Self, ForecastError> {
        config.validate()?;
        let cleaner = TimeSeriesCleaner::new(config.outlier_threshold, config.outlier_window);
        let z = interval_z(config.interval_width)?;
        Ok(Self { config, cleaner, z })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Timestamps the forecast covers: `now` truncated to the minute through
    /// `+horizon` inclusive, every `step`.
    pub fn horizon_timestamps(&self, now: Timestamp) -> Vec<Timestamp> {
        let start = truncate_to_minute(now);
        let end = start + self.config.horizon;
        let mut out = Vec::new();
        let mut ts = start;
        while ts <= end {
            out.push(ts);
            ts += self.config.step;
        }
        out
    }
}

impl SeriesForecaster for Forecaster {
    fn forecast(
        &self,
        history: &[Sample],
        holidays: &HolidaySet,
        now: Timestamp,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        let required = self.config.terms.min_fit_points();
        let cleaned = self.cleaner.clean(history);
        if cleaned.len() < required {
            return Err(ForecastError::InsufficientData {
                required,
                actual: cleaned.len(),
            });
        }

        let values: Vec<f64> = cleaned.iter().map(|s| s.value).collect();
        let timestamps: Vec<Timestamp> = cleaned.iter().map(|s| s.timestamp).collect();
        let scaler = StandardScaler::fit(&values).ok_or(ForecastError::InsufficientData {
            required,
            actual: 0,
        })?;

        let model = SeasonalModel::fit(
            &timestamps,
            &scaler.transform_all(&values),
            holidays,
            self.config.terms,
            self.config.ridge_penalty,
        )?;

        let half_width = self.z * model.residual_std();
        let start = truncate_to_minute(now);
        let points: Vec<ForecastPoint> = self
            .horizon_timestamps(now)
            .into_iter()
            .filter(|ts| *ts >= start)
            .map(|ts| {
                let yhat = model.predict(ts, holidays);
                ForecastPoint {
                    timestamp: ts,
                    yhat: scaler.inverse(yhat),
                    yhat_lower: scaler.inverse(yhat - half_width),
                    yhat_upper: scaler.inverse(yhat + half_width),
                }
            })
            .collect();

        if points
            .iter()
            .any(|p| !(p.yhat.is_finite() && p.yhat_lower.is_finite() && p.yhat_upper.is_finite()))
        {
            return Err(ForecastError::ModelFit(
                "prediction produced non-finite values".to_string(),
            ));
        }

        Ok(points)
    }
}

/// Two-sided standard-normal quantile for an interval of the given width.
fn interval_z(width: f64) -> Result<f64, ForecastError> {
    let normal =
        Normal::new(0.0, 1.0).map_err(|e| ForecastError::InvalidConfig(e.to_string()))?;
    Ok(normal.inverse_cdf((1.0 + width) / 2.0))
}

fn truncate_to_minute(ts: Timestamp) -> Timestamp {
    ts.duration_trunc(Duration::minutes(1)).unwrap_or(ts)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
