//! Integration tests for the forecast scheduler's batch runs.
//!
//! Failures of one sensor (fit error, timeout, store error) must never stop
//! the other sensors in the same batch.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use common::{declaration, defaults, BrokenStore, StubForecaster};
use ldr_core::event_names;
use ldr_core::forecast::{ForecastError, SeriesForecaster};
use ldr_core::holidays::{HolidayCalendar, HolidaySet};
use ldr_core::types::{ForecastPoint, Sample, Timestamp};
use ldr_daemon::forecasting::ForecastScheduler;
use ldr_daemon::holiday_cache::HolidayCache;
use ldr_daemon::state::{self, SharedRegistry};
use ldr_db::{ForecastStore, MemoryStore, SampleStore};
use ldr_events::EventBus;

async fn registry_with(ids: &[&str]) -> SharedRegistry {
    let registry = state::shared_registry();
    let transport = Arc::new(defaults().transport());
    {
        let mut guard = registry.write().await;
        for id in ids {
            guard.upsert_from_declaration(&declaration(id), &transport);
        }
    }
    registry
}

async fn seed(store: &MemoryStore, sensor_id: &str, values: &[f64]) {
    let start = Utc::now() - ChronoDuration::minutes(values.len() as i64);
    for (i, v) in values.iter().enumerate() {
        let sample = Sample::new(start + ChronoDuration::minutes(i as i64), *v);
        store.record_sample(sensor_id, sample).await.unwrap();
    }
}

fn scheduler(
    registry: SharedRegistry,
    samples: Arc<dyn SampleStore>,
    forecasts: Arc<dyn ForecastStore>,
    forecaster: Arc<dyn SeriesForecaster>,
    events: Arc<EventBus>,
    fit_timeout: Option<Duration>,
) -> ForecastScheduler {
    ForecastScheduler::new(
        registry,
        samples,
        forecasts,
        forecaster,
        Arc::new(HolidayCache::new(HolidayCalendar::italian())),
        events,
        fit_timeout,
        15,
    )
}

fn sorted(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}

// ---------------------------------------------------------------------------
// Test: one sensor's fit failure does not affect the others
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fit_failure_is_contained_to_its_sensor() {
    let registry = registry_with(&["1", "2", "3"]).await;
    let store = Arc::new(MemoryStore::new());
    seed(&store, "1", &[100.0, 110.0, 120.0]).await;
    seed(&store, "2", &[200.0, 210.0, 220.0]).await;
    seed(&store, "3", &[300.0, 310.0, 320.0]).await;
    let events = Arc::new(EventBus::default());
    let mut rx = events.subscribe();

    let scheduler = scheduler(
        registry,
        store.clone(),
        store.clone(),
        Arc::new(StubForecaster::failing_on(200.0)),
        Arc::clone(&events),
        Some(Duration::from_secs(30)),
    );
    let report = scheduler.run_batch(Utc::now()).await;

    assert_eq!(sorted(report.produced), vec!["1".to_string(), "3".to_string()]);
    assert_eq!(report.failed, vec!["2".to_string()]);
    assert!(report.skipped.is_empty());

    assert_eq!(store.forecasts_for("1").await.len(), 5);
    assert!(store.forecasts_for("2").await.is_empty());
    assert_eq!(store.forecasts_for("3").await.len(), 5);

    let mut stored = 0;
    let mut failed = 0;
    while let Ok(event) = rx.try_recv() {
        match event.event_type.as_str() {
            event_names::FORECAST_STORED => stored += 1,
            event_names::FORECAST_FAILED => {
                assert_eq!(event.sensor_id.as_deref(), Some("2"));
                failed += 1;
            }
            _ => {}
        }
    }
    assert_eq!((stored, failed), (2, 1));
}

// ---------------------------------------------------------------------------
// Test: sensors without enough history are skipped
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sensor_without_history_is_skipped() {
    let registry = registry_with(&["1", "2"]).await;
    let store = Arc::new(MemoryStore::new());
    seed(&store, "1", &[10.0, 12.0, 14.0]).await;
    seed(&store, "2", &[10.0]).await;

    let scheduler = scheduler(
        registry,
        store.clone(),
        store.clone(),
        Arc::new(StubForecaster::new()),
        Arc::new(EventBus::default()),
        None,
    );
    let report = scheduler.run_batch(Utc::now()).await;

    assert_eq!(report.produced, vec!["1".to_string()]);
    assert_eq!(report.skipped, vec!["2".to_string()]);
    assert!(report.failed.is_empty());
}

// ---------------------------------------------------------------------------
// Test: a forecast store failure is logged and swallowed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn store_failure_is_swallowed() {
    let registry = registry_with(&["1"]).await;
    let samples = Arc::new(MemoryStore::new());
    seed(&samples, "1", &[10.0, 12.0, 14.0]).await;
    let events = Arc::new(EventBus::default());
    let mut rx = events.subscribe();

    let scheduler = scheduler(
        registry,
        samples,
        Arc::new(BrokenStore),
        Arc::new(StubForecaster::new()),
        Arc::clone(&events),
        None,
    );
    let report = scheduler.run_batch(Utc::now()).await;

    assert_eq!(report.produced, vec!["1".to_string()]);
    assert!(report.failed.is_empty());
    assert!(rx.try_recv().is_err(), "nothing was stored, so nothing is announced");
}

// ---------------------------------------------------------------------------
// Test: a history load failure marks the sensor failed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_load_failure_fails_the_sensor() {
    let registry = registry_with(&["1"]).await;
    let forecasts = Arc::new(MemoryStore::new());

    let scheduler = scheduler(
        registry,
        Arc::new(BrokenStore),
        forecasts.clone(),
        Arc::new(StubForecaster::new()),
        Arc::new(EventBus::default()),
        None,
    );
    let report = scheduler.run_batch(Utc::now()).await;

    assert_eq!(report.failed, vec!["1".to_string()]);
    assert!(forecasts.forecasts_for("1").await.is_empty());
}

// ---------------------------------------------------------------------------
// Test: a fit that overruns its timeout fails without blocking the batch
// ---------------------------------------------------------------------------

struct SlowForecaster;

impl SeriesForecaster for SlowForecaster {
    fn forecast(
        &self,
        _series: &[Sample],
        _holidays: &HolidaySet,
        _now: Timestamp,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        std::thread::sleep(Duration::from_millis(500));
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn slow_fit_times_out() {
    let registry = registry_with(&["1"]).await;
    let store = Arc::new(MemoryStore::new());
    seed(&store, "1", &[10.0, 12.0, 14.0]).await;

    let scheduler = scheduler(
        registry,
        store.clone(),
        store.clone(),
        Arc::new(SlowForecaster),
        Arc::new(EventBus::default()),
        Some(Duration::from_millis(20)),
    );
    let report = scheduler.run_batch(Utc::now()).await;

    assert_eq!(report.failed, vec!["1".to_string()]);
    assert!(report.produced.is_empty());
}

// ---------------------------------------------------------------------------
// Test: an empty registry produces an empty batch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_registry_runs_empty_batch() {
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler(
        state::shared_registry(),
        store.clone(),
        store,
        Arc::new(StubForecaster::new()),
        Arc::new(EventBus::default()),
        None,
    );
    let report = scheduler.run_batch(Utc::now()).await;

    assert!(report.produced.is_empty() && report.skipped.is_empty() && report.failed.is_empty());
}
