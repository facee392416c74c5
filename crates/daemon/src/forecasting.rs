//! Periodic per-sensor forecasting.
//!
//! A batch snapshots the registered sensor ids, fans out one task per sensor
//! and waits for all of them. Inside a task the history load and the store
//! write are async; the model fit itself runs on the blocking pool under an
//! optional timeout. One sensor's failure never affects another's.
//!
//! The scheduler runs in its own task, so a slow batch delays only the next
//! batch, never a reconciliation pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use ldr_core::event_names;
use ldr_core::forecast::{ForecastError, SeriesForecaster};
use ldr_core::holidays::HolidaySet;
use ldr_core::schedule::SlotGate;
use ldr_core::types::{HistoryWindow, SensorId, Timestamp};
use ldr_db::{ForecastStore, SampleStore};
use ldr_events::{EventBus, LdrEvent};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::holiday_cache::HolidayCache;
use crate::state::{sensor_ids, SharedRegistry};

/// How often the scheduler checks whether a forecast slot has arrived.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened to one sensor in a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorOutcome {
    /// A forecast was produced; `persisted` is false when the write failed.
    Produced { points: usize, persisted: bool },
    /// Too little clean history to fit.
    Skipped,
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub produced: Vec<SensorId>,
    pub skipped: Vec<SensorId>,
    pub failed: Vec<SensorId>,
}

impl BatchReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            produced: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ForecastScheduler
// ---------------------------------------------------------------------------

pub struct ForecastScheduler {
    registry: SharedRegistry,
    samples: Arc<dyn SampleStore>,
    forecasts: Arc<dyn ForecastStore>,
    forecaster: Arc<dyn SeriesForecaster>,
    holidays: Arc<HolidayCache>,
    events: Arc<EventBus>,
    fit_timeout: Option<Duration>,
    period_minutes: u32,
}

impl ForecastScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: SharedRegistry,
        samples: Arc<dyn SampleStore>,
        forecasts: Arc<dyn ForecastStore>,
        forecaster: Arc<dyn SeriesForecaster>,
        holidays: Arc<HolidayCache>,
        events: Arc<EventBus>,
        fit_timeout: Option<Duration>,
        period_minutes: u32,
    ) -> Self {
        Self {
            registry,
            samples,
            forecasts,
            forecaster,
            holidays,
            events,
            fit_timeout,
            period_minutes,
        }
    }

    /// Forecast every registered sensor once and wait for all of them.
    pub async fn run_batch(&self, now: Timestamp) -> BatchReport {
        let ids = sensor_ids(&self.registry).await;
        let holidays = self.holidays.current().await;
        let mut report = BatchReport::new(Uuid::now_v7());

        let mut tasks = JoinSet::new();
        for sensor_id in ids {
            let unit = SensorForecast {
                sensor_id,
                run_id: report.run_id,
                now,
                samples: Arc::clone(&self.samples),
                forecasts: Arc::clone(&self.forecasts),
                forecaster: Arc::clone(&self.forecaster),
                holidays: Arc::clone(&holidays),
                fit_timeout: self.fit_timeout,
            };
            tasks.spawn(async move {
                let outcome = unit.run().await;
                (unit.sensor_id, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (sensor_id, outcome) = match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(error = %e, "Forecast task aborted");
                    continue;
                }
            };
            match outcome {
                SensorOutcome::Produced { points, persisted } => {
                    if persisted {
                        self.events.publish(
                            LdrEvent::new(event_names::FORECAST_STORED)
                                .with_sensor(sensor_id.clone())
                                .with_payload(serde_json::json!({
                                    "run_id": report.run_id,
                                    "points": points,
                                })),
                        );
                    }
                    report.produced.push(sensor_id);
                }
                SensorOutcome::Skipped => report.skipped.push(sensor_id),
                SensorOutcome::Failed { reason } => {
                    self.events.publish(
                        LdrEvent::new(event_names::FORECAST_FAILED)
                            .with_sensor(sensor_id.clone())
                            .with_payload(serde_json::json!({
                                "run_id": report.run_id,
                                "reason": reason,
                            })),
                    );
                    report.failed.push(sensor_id);
                }
            }
        }

        tracing::info!(
            run_id = %report.run_id,
            produced = report.produced.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Forecast batch complete"
        );
        report
    }

    /// Run a batch at every forecast slot until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut gate = SlotGate::every_minutes(self.period_minutes);
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(period_minutes = self.period_minutes, "Forecast scheduler started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let now = Local::now();
                    if !gate.should_fire(now.naive_local()) {
                        continue;
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.run_batch(now.with_timezone(&Utc)) => {}
                    }
                }
            }
        }
        tracing::info!("Forecast scheduler stopping");
    }
}

// ---------------------------------------------------------------------------
// Per-sensor unit
// ---------------------------------------------------------------------------

struct SensorForecast {
    sensor_id: SensorId,
    run_id: Uuid,
    now: Timestamp,
    samples: Arc<dyn SampleStore>,
    forecasts: Arc<dyn ForecastStore>,
    forecaster: Arc<dyn SeriesForecaster>,
    holidays: Arc<HolidaySet>,
    fit_timeout: Option<Duration>,
}

impl SensorForecast {
    async fn run(&self) -> SensorOutcome {
        let sensor_id = self.sensor_id.as_str();
        let history = match self.samples.load_recent(HistoryWindow::All, sensor_id).await {
            Ok(history) => history,
            Err(e) => {
                tracing::error!(sensor_id, error = %e, "Failed to load sample history");
                return SensorOutcome::Failed {
                    reason: format!("history load failed: {e}"),
                };
            }
        };

        let forecaster = Arc::clone(&self.forecaster);
        let holidays = Arc::clone(&self.holidays);
        let now = self.now;
        let fit = tokio::task::spawn_blocking(move || forecaster.forecast(&history, &holidays, now));

        // On timeout the blocking thread runs to completion in the
        // background; its result is dropped.
        let joined = match self.fit_timeout {
            Some(limit) => match tokio::time::timeout(limit, fit).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::error!(sensor_id, timeout_secs = limit.as_secs(), "Model fit timed out");
                    return SensorOutcome::Failed {
                        reason: "model fit timed out".to_string(),
                    };
                }
            },
            None => fit.await,
        };

        let points = match joined {
            Ok(Ok(points)) => points,
            Ok(Err(ForecastError::InsufficientData { required, actual })) => {
                tracing::debug!(sensor_id, required, actual, "Not enough clean history, forecast skipped");
                return SensorOutcome::Skipped;
            }
            Ok(Err(e)) => {
                tracing::error!(sensor_id, error = %e, "Forecast failed");
                return SensorOutcome::Failed { reason: e.to_string() };
            }
            Err(e) => {
                tracing::error!(sensor_id, error = %e, "Forecast task panicked");
                return SensorOutcome::Failed {
                    reason: "forecast task panicked".to_string(),
                };
            }
        };

        let persisted = match self.forecasts.store_forecast(sensor_id, self.run_id, &points).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(sensor_id, error = %e, "Failed to store forecast");
                false
            }
        };

        SensorOutcome::Produced {
            points: points.len(),
            persisted,
        }
    }
}
