//! Additive seasonal regression: trend + daily and weekly Fourier terms +
//! a holiday indicator, fitted by ridge-regularized least squares.

use std::f64::consts::TAU;

use chrono::Local;

use super::linalg::solve_spd;
use super::ForecastError;
use crate::holidays::HolidaySet;
use crate::types::Timestamp;

const SECONDS_PER_DAY: f64 = 86_400.0;
const DAILY_PERIOD_DAYS: f64 = 1.0;
const WEEKLY_PERIOD_DAYS: f64 = 7.0;

/// Which seasonal components the model includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonalTerms {
    pub daily_order: usize,
    pub weekly_order: usize,
}

impl Default for SeasonalTerms {
    fn default() -> Self {
        Self {
            daily_order: 4,
            weekly_order: 3,
        }
    }
}

impl SeasonalTerms {
    /// Intercept + trend + sin/cos pairs + holiday indicator.
    pub fn feature_count(&self) -> usize {
        2 + 2 * self.daily_order + 2 * self.weekly_order + 1
    }

    /// Fewest samples that leave at least one residual degree of freedom.
    /// Shorter series are fitted exactly and report a zero-width interval.
    pub fn min_fit_points(&self) -> usize {
        self.feature_count() + 1
    }
}

/// A fitted model; predictions are in the same units as the fit targets.
#[derive(Debug, Clone)]
pub struct SeasonalModel {
    terms: SeasonalTerms,
    origin_days: f64,
    span_days: f64,
    coefficients: Vec<f64>,
    residual_std: f64,
}

impl SeasonalModel {
    /// Fit against `(timestamps[i], targets[i])`.
    ///
    /// `ridge` penalizes every coefficient except the intercept.
    pub fn fit(
        timestamps: &[Timestamp],
        targets: &[f64],
        holidays: &HolidaySet,
        terms: SeasonalTerms,
        ridge: f64,
    ) -> Result<Self, ForecastError> {
        if timestamps.len() != targets.len() {
            return Err(ForecastError::ModelFit(format!(
                "{} timestamps for {} targets",
                timestamps.len(),
                targets.len()
            )));
        }
        let required = terms.min_fit_points();
        let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) else {
            return Err(ForecastError::InsufficientData {
                required,
                actual: 0,
            });
        };
        if targets.len() < required {
            return Err(ForecastError::InsufficientData {
                required,
                actual: targets.len(),
            });
        }

        let origin_days = local_days(*first);
        let span_days = (local_days(*last) - origin_days).max(f64::EPSILON);
        let mut model = Self {
            terms,
            origin_days,
            span_days,
            coefficients: Vec::new(),
            residual_std: 0.0,
        };

        let p = terms.feature_count();
        let mut xtx = vec![0.0; p * p];
        let mut xty = vec![0.0; p];
        let rows: Vec<Vec<f64>> = timestamps
            .iter()
            .map(|ts| model.features(*ts, holidays))
            .collect();

        for (row, y) in rows.iter().zip(targets) {
            for i in 0..p {
                xty[i] += row[i] * y;
                for j in 0..p {
                    xtx[i * p + j] += row[i] * row[j];
                }
            }
        }
        for i in 1..p {
            xtx[i * p + i] += ridge;
        }

        let coefficients = solve_spd(&xtx, &xty).ok_or_else(|| {
            ForecastError::ModelFit("normal equations are not positive definite".to_string())
        })?;
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ForecastError::ModelFit(
                "non-finite regression coefficient".to_string(),
            ));
        }
        model.coefficients = coefficients;

        let sse: f64 = rows
            .iter()
            .zip(targets)
            .map(|(row, y)| (y - model.dot(row)).powi(2))
            .sum();
        let dof = targets.len() - p;
        model.residual_std = (sse / dof as f64).sqrt();
        if !model.residual_std.is_finite() {
            return Err(ForecastError::ModelFit(
                "non-finite residual variance".to_string(),
            ));
        }

        Ok(model)
    }

    pub fn predict(&self, ts: Timestamp, holidays: &HolidaySet) -> f64 {
        self.dot(&self.features(ts, holidays))
    }

    /// Standard error of the in-sample residuals.
    pub fn residual_std(&self) -> f64 {
        self.residual_std
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    fn dot(&self, row: &[f64]) -> f64 {
        row.iter().zip(&self.coefficients).map(|(x, b)| x * b).sum()
    }

    fn features(&self, ts: Timestamp, holidays: &HolidaySet) -> Vec<f64> {
        let days = local_days(ts);
        let mut row = Vec::with_capacity(self.terms.feature_count());
        row.push(1.0);
        row.push((days - self.origin_days) / self.span_days);
        push_fourier(&mut row, days, DAILY_PERIOD_DAYS, self.terms.daily_order);
        push_fourier(&mut row, days, WEEKLY_PERIOD_DAYS, self.terms.weekly_order);

        let local_date = ts.with_timezone(&Local).date_naive();
        row.push(if holidays.contains(local_date) { 1.0 } else { 0.0 });
        row
    }
}

fn push_fourier(row: &mut Vec<f64>, days: f64, period: f64, order: usize) {
    for k in 1..=order {
        let angle = TAU * k as f64 * days / period;
        row.push(angle.sin());
        row.push(angle.cos());
    }
}

/// Wall-clock days since the epoch, so seasonality follows local time.
fn local_days(ts: Timestamp) -> f64 {
    let local = ts.with_timezone(&Local).naive_local().and_utc();
    local.timestamp() as f64 / SECONDS_PER_DAY
        + f64::from(local.timestamp_subsec_millis()) / (SECONDS_PER_DAY * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn hourly(n: i64) -> Vec<Timestamp> {
        let base = Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap();
        (0..n).map(|i| base + Duration::hours(i)).collect()
    }

    #[test]
    fn feature_count_matches_row_length() {
        let times = hourly(24);
        let targets: Vec<f64> = (0..24).map(f64::from).collect();
        let model = SeasonalModel::fit(
            &times,
            &targets,
            &HolidaySet::empty(),
            SeasonalTerms::default(),
            1e-3,
        )
        .unwrap();
        assert_eq!(model.coefficients().len(), SeasonalTerms::default().feature_count());
    }

    #[test]
    fn recovers_pure_daily_cycle() {
        let times = hourly(24 * 14);
        let targets: Vec<f64> = times
            .iter()
            .map(|t| (TAU * local_days(*t)).sin())
            .collect();
        let model = SeasonalModel::fit(
            &times,
            &targets,
            &HolidaySet::empty(),
            SeasonalTerms::default(),
            1e-6,
        )
        .unwrap();

        let future = *times.last().unwrap() + Duration::hours(5);
        let expected = (TAU * local_days(future)).sin();
        assert!((model.predict(future, &HolidaySet::empty()) - expected).abs() < 1e-3);
        assert!(model.residual_std() < 1e-3);
    }

    #[test]
    fn mismatched_lengths_fail_to_fit() {
        let times = hourly(3);
        let result = SeasonalModel::fit(
            &times,
            &[1.0, 2.0],
            &HolidaySet::empty(),
            SeasonalTerms::default(),
            1e-3,
        );
        assert!(matches!(result, Err(ForecastError::ModelFit(_))));
    }

    #[test]
    fn series_without_residual_freedom_is_rejected() {
        let terms = SeasonalTerms::default();
        let n = terms.feature_count();
        let times = hourly(n as i64);
        let targets: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let result = SeasonalModel::fit(&times, &targets, &HolidaySet::empty(), terms, 1e-6);
        assert!(matches!(
            result,
            Err(ForecastError::InsufficientData { required, actual })
                if required == n + 1 && actual == n
        ));
    }

    #[test]
    fn smaller_term_set_needs_fewer_points() {
        let terms = SeasonalTerms {
            daily_order: 1,
            weekly_order: 0,
        };
        assert_eq!(terms.min_fit_points(), 6);
        let times = hourly(6);
        let model = SeasonalModel::fit(
            &times,
            &[1.0, 2.0, 1.5, 3.0, 2.5, 2.0],
            &HolidaySet::empty(),
            terms,
            1e-6,
        )
        .unwrap();
        assert!(model.residual_std() > 0.0);
    }
}
