//! Integration tests for reading ingestion and the light-leader alert cycle.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::{declaration, defaults, BrokenStore};
use ldr_core::event_names;
use ldr_core::types::{ForecastPoint, Sample};
use ldr_daemon::alerting::AlertMonitor;
use ldr_daemon::ingest::{parse_reading, IngestError, Ingestor};
use ldr_daemon::state::{self, SharedRegistry};
use ldr_db::{ForecastStore, MemoryStore, SampleStore};
use ldr_events::EventBus;
use uuid::Uuid;

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

/// Two readings in the last window and two forecast points in the next one.
async fn seed_windows(store: &MemoryStore, sensor_id: &str, observed: f64, predicted: f64) {
    let now = Utc::now();
    for minutes in [90, 30] {
        store
            .record_sample(sensor_id, Sample::new(now - Duration::minutes(minutes), observed))
            .await
            .unwrap();
    }
    let points: Vec<ForecastPoint> = [30, 90]
        .into_iter()
        .map(|minutes| ForecastPoint {
            timestamp: now + Duration::minutes(minutes),
            yhat: predicted,
            yhat_lower: predicted - 5.0,
            yhat_upper: predicted + 5.0,
        })
        .collect();
    store
        .store_forecast(sensor_id, Uuid::now_v7(), &points)
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Test: ingestion
// ---------------------------------------------------------------------------

#[test]
fn parse_reading_accepts_numbers_only() {
    assert_eq!(parse_reading(" 512.5 ").unwrap(), 512.5);
    assert_matches!(parse_reading("bright"), Err(IngestError::NotNumeric(_)));
    assert_matches!(parse_reading("NaN"), Err(IngestError::NotNumeric(_)));
    assert_matches!(parse_reading(""), Err(IngestError::NotNumeric(_)));
}

#[tokio::test]
async fn reading_is_stored() {
    let store = Arc::new(MemoryStore::new());
    let ingestor = Ingestor::new(store.clone());

    assert_eq!(ingestor.record_reading("1", "640").await.unwrap(), 640.0);
    assert_matches!(
        ingestor.record_reading("1", "n/a").await,
        Err(IngestError::NotNumeric(_))
    );

    let stored = store.samples_for("1").await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].value, 640.0);
}

#[tokio::test]
async fn store_failure_does_not_reject_reading() {
    let ingestor = Ingestor::new(Arc::new(BrokenStore));
    assert_eq!(ingestor.record_reading("1", "12").await.unwrap(), 12.0);
}

// ---------------------------------------------------------------------------
// Test: alert cycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cycle_records_averages_and_alerts_on_new_leader() {
    let registry = registry_with(&["1", "2"]).await;
    let store = Arc::new(MemoryStore::new());
    seed_windows(&store, "1", 100.0, 100.0).await;
    seed_windows(&store, "2", 300.0, 50.0).await;
    let events = Arc::new(EventBus::default());
    let mut rx = events.subscribe();

    let mut monitor = AlertMonitor::new(
        Arc::clone(&registry),
        store.clone(),
        store.clone(),
        Arc::clone(&events),
    );
    let alert = monitor.run_cycle().await.expect("sensor 2 beats sensor 1 by more than the margin");

    assert_eq!(alert.observed_leader.sensor_id, "2");
    assert_eq!(alert.predicted_leader.sensor_id, "1");
    {
        let registry = registry.read().await;
        let second = registry.get("2").unwrap();
        assert_eq!(second.current_observed_average, 300.0);
        assert_eq!(second.predicted_average, 50.0);
    }

    let event = rx.recv().await.unwrap();
    assert_eq!(event.event_type, event_names::LIGHT_LEADER_CHANGED);
    assert_eq!(event.sensor_id.as_deref(), Some("2"));

    // Nothing moved, so the next cycle stays quiet.
    assert!(monitor.run_cycle().await.is_none());
}

#[tokio::test]
async fn sensor_without_data_keeps_previous_averages() {
    let registry = registry_with(&["1", "2"]).await;
    registry.write().await.record_light_averages("2", 42.0, 24.0);
    let store = Arc::new(MemoryStore::new());
    seed_windows(&store, "1", 10.0, 10.0).await;

    let mut monitor = AlertMonitor::new(
        Arc::clone(&registry),
        store.clone(),
        store.clone(),
        Arc::new(EventBus::default()),
    );
    monitor.run_cycle().await;

    let registry = registry.read().await;
    let second = registry.get("2").unwrap();
    assert_eq!(second.current_observed_average, 42.0);
    assert_eq!(second.predicted_average, 24.0);
    assert_eq!(registry.get("1").unwrap().current_observed_average, 10.0);
}
