//! In-process store used by tests and when no database is configured.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use ldr_core::types::{ForecastPoint, HistoryWindow, Sample, SensorId, Timestamp};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{at_least_two, since, until, ForecastStore, SampleStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    samples: RwLock<HashMap<SensorId, Vec<Sample>>>,
    forecasts: RwLock<HashMap<SensorId, BTreeMap<Timestamp, (Uuid, ForecastPoint)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored sample for a sensor, oldest first.
    pub async fn samples_for(&self, sensor_id: &str) -> Vec<Sample> {
        self.samples
            .read()
            .await
            .get(sensor_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every stored forecast point for a sensor, ordered by timestamp.
    pub async fn forecasts_for(&self, sensor_id: &str) -> Vec<ForecastPoint> {
        self.forecasts
            .read()
            .await
            .get(sensor_id)
            .map(|points| points.values().map(|(_, p)| *p).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SampleStore for MemoryStore {
    async fn load_recent(
        &self,
        window: HistoryWindow,
        sensor_id: &str,
    ) -> Result<Vec<Sample>, StoreError> {
        let lower = since(window, Utc::now());
        let samples = self.samples.read().await;
        let selected: Vec<Sample> = samples
            .get(sensor_id)
            .map(|all| {
                all.iter()
                    .filter(|s| lower.map_or(true, |l| s.timestamp >= l))
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        Ok(at_least_two(selected))
    }

    async fn record_sample(&self, sensor_id: &str, sample: Sample) -> Result<(), StoreError> {
        let mut samples = self.samples.write().await;
        let series = samples.entry(sensor_id.to_string()).or_default();
        // Keep the series ordered even if readings arrive late.
        let pos = series.partition_point(|s| s.timestamp <= sample.timestamp);
        series.insert(pos, sample);
        Ok(())
    }
}

#[async_trait]
impl ForecastStore for MemoryStore {
    async fn store_forecast(
        &self,
        sensor_id: &str,
        run_id: Uuid,
        points: &[ForecastPoint],
    ) -> Result<(), StoreError> {
        let mut forecasts = self.forecasts.write().await;
        let series = forecasts.entry(sensor_id.to_string()).or_default();
        for p in points {
            series.insert(p.timestamp, (run_id, *p));
        }
        Ok(())
    }

    async fn load_upcoming(
        &self,
        window: HistoryWindow,
        sensor_id: &str,
    ) -> Result<Vec<ForecastPoint>, StoreError> {
        let now = Utc::now();
        let upper = until(window, now);
        let forecasts = self.forecasts.read().await;
        let selected: Vec<ForecastPoint> = forecasts
            .get(sensor_id)
            .map(|points| {
                points
                    .range(now..)
                    .map(|(_, (_, p))| *p)
                    .take_while(|p| upper.map_or(true, |u| p.timestamp <= u))
                    .collect()
            })
            .unwrap_or_default();
        Ok(at_least_two(selected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn point(ts: Timestamp, yhat: f64) -> ForecastPoint {
        ForecastPoint {
            timestamp: ts,
            yhat,
            yhat_lower: yhat - 1.0,
            yhat_upper: yhat + 1.0,
        }
    }

    #[tokio::test]
    async fn single_sample_loads_as_empty() {
        let store = MemoryStore::new();
        store
            .record_sample("1", Sample::new(Utc::now(), 10.0))
            .await
            .unwrap();
        assert!(store.load_recent(HistoryWindow::All, "1").await.unwrap().is_empty());
        assert_eq!(store.samples_for("1").await.len(), 1);
    }

    #[tokio::test]
    async fn recent_window_excludes_old_samples() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for (hours_ago, value) in [(10, 1.0), (3, 2.0), (2, 3.0), (1, 4.0)] {
            store
                .record_sample("1", Sample::new(now - Duration::hours(hours_ago), value))
                .await
                .unwrap();
        }

        let recent = store.load_recent(HistoryWindow::hours(4), "1").await.unwrap();
        let values: Vec<f64> = recent.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);

        let all = store.load_recent(HistoryWindow::All, "1").await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn late_samples_are_kept_in_order() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.record_sample("1", Sample::new(now, 2.0)).await.unwrap();
        store
            .record_sample("1", Sample::new(now - Duration::minutes(5), 1.0))
            .await
            .unwrap();
        let values: Vec<f64> = store.samples_for("1").await.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn newer_forecast_replaces_same_timestamp() {
        let store = MemoryStore::new();
        let ts = Utc::now() + Duration::hours(1);
        store
            .store_forecast("1", Uuid::now_v7(), &[point(ts, 10.0)])
            .await
            .unwrap();
        store
            .store_forecast("1", Uuid::now_v7(), &[point(ts, 20.0)])
            .await
            .unwrap();

        let stored = store.forecasts_for("1").await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].yhat, 20.0);
    }

    #[tokio::test]
    async fn upcoming_window_skips_past_and_far_points() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let points: Vec<ForecastPoint> = [-2, 1, 2, 3, 6]
            .iter()
            .map(|h| point(now + Duration::hours(*h), *h as f64))
            .collect();
        store.store_forecast("1", Uuid::now_v7(), &points).await.unwrap();

        let upcoming = store.load_upcoming(HistoryWindow::hours(4), "1").await.unwrap();
        let values: Vec<f64> = upcoming.iter().map(|p| p.yhat).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }
}
