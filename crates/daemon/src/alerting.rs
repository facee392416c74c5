//! Light-leader alert cycle.
//!
//! Every alert slot (every four hours on the hour) each sensor's observed
//! mean over the last window and forecast mean over the next window are
//! recorded on its entity. A sensor missing either series keeps its previous
//! averages. The [`LightLeaderTracker`] then decides whether the leader
//! changed enough to alert.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use futures::future::join_all;
use ldr_core::alert::{LightLeaderAlert, LightLeaderTracker, LightReading, ALERT_WINDOW_HOURS};
use ldr_core::event_names;
use ldr_core::schedule::SlotGate;
use ldr_core::types::HistoryWindow;
use ldr_db::{ForecastStore, SampleStore};
use ldr_events::{EventBus, LdrEvent};
use tokio_util::sync::CancellationToken;

use crate::state::{sensor_ids, SharedRegistry};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct AlertMonitor {
    registry: SharedRegistry,
    samples: Arc<dyn SampleStore>,
    forecasts: Arc<dyn ForecastStore>,
    events: Arc<EventBus>,
    tracker: LightLeaderTracker,
}

impl AlertMonitor {
    pub fn new(
        registry: SharedRegistry,
        samples: Arc<dyn SampleStore>,
        forecasts: Arc<dyn ForecastStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            registry,
            samples,
            forecasts,
            events,
            tracker: LightLeaderTracker::default(),
        }
    }

    /// Recompute averages for every sensor and evaluate the leaders once.
    pub async fn run_cycle(&mut self) -> Option<LightLeaderAlert> {
        let window = HistoryWindow::hours(ALERT_WINDOW_HOURS);
        let ids = sensor_ids(&self.registry).await;
        let samples = &self.samples;
        let forecasts = &self.forecasts;

        let averages = join_all(ids.iter().map(|id| async move {
            let observed = samples.load_recent(window, id).await;
            let predicted = forecasts.load_upcoming(window, id).await;
            let observed = observed.map(|s| mean(s.iter().map(|p| p.value)));
            let predicted = predicted.map(|f| mean(f.iter().map(|p| p.yhat)));
            (id, observed, predicted)
        }))
        .await;

        {
            let mut registry = self.registry.write().await;
            for (id, observed, predicted) in averages {
                match (observed, predicted) {
                    (Ok(Some(observed)), Ok(Some(predicted))) => {
                        registry.record_light_averages(id, observed, predicted);
                    }
                    (Err(e), _) | (_, Err(e)) => {
                        tracing::error!(sensor_id = %id, error = %e, "Failed to load alert window");
                    }
                    _ => {
                        tracing::debug!(sensor_id = %id, "Not enough data for alert window, keeping previous averages");
                    }
                }
            }
        }

        let readings: Vec<LightReading> = self
            .registry
            .read()
            .await
            .list()
            .iter()
            .map(LightReading::from)
            .collect();

        let alert = self.tracker.evaluate(&readings)?;
        let message = alert.message();
        self.events.publish(
            LdrEvent::new(event_names::LIGHT_LEADER_CHANGED)
                .with_sensor(alert.observed_leader.sensor_id.clone())
                .with_payload(serde_json::json!({
                    "message": message,
                    "observed_leader": alert.observed_leader,
                    "predicted_leader": alert.predicted_leader,
                })),
        );
        Some(alert)
    }

    /// Run a cycle at every alert slot until cancelled.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut gate = SlotGate::every_hours(ALERT_WINDOW_HOURS as u32);
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(window_hours = ALERT_WINDOW_HOURS, "Alert monitor started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if gate.should_fire(Local::now().naive_local()) {
                        self.run_cycle().await;
                    }
                }
            }
        }
        tracing::info!("Alert monitor stopping");
    }
}

/// Arithmetic mean; `None` for an empty series.
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}
