//! Store seams used by the daemon and their PostgreSQL implementation.
//!
//! Both traits hide the time arithmetic of a [`HistoryWindow`] so callers
//! only say how much history they want. Loads return an empty vector when
//! fewer than two points are available, which downstream code treats as
//! "nothing to work with".

use async_trait::async_trait;
use chrono::Utc;
use ldr_core::types::{ForecastPoint, HistoryWindow, Sample, Timestamp};
use uuid::Uuid;

use crate::error::StoreError;
use crate::repositories::{ForecastRepo, SampleRepo};
use crate::DbPool;

/// Fewest points a load returns; anything less comes back empty.
pub const MIN_LOAD_POINTS: usize = 2;

#[async_trait]
pub trait SampleStore: Send + Sync {
    /// Readings for `sensor_id` inside `window` (looking back from now),
    /// oldest first.
    async fn load_recent(
        &self,
        window: HistoryWindow,
        sensor_id: &str,
    ) -> Result<Vec<Sample>, StoreError>;

    async fn record_sample(&self, sensor_id: &str, sample: Sample) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ForecastStore: Send + Sync {
    /// Persist one run's forecast for a sensor.
    async fn store_forecast(
        &self,
        sensor_id: &str,
        run_id: Uuid,
        points: &[ForecastPoint],
    ) -> Result<(), StoreError>;

    /// Forecast points from now forward inside `window`, in order.
    async fn load_upcoming(
        &self,
        window: HistoryWindow,
        sensor_id: &str,
    ) -> Result<Vec<ForecastPoint>, StoreError>;
}

/// Apply the two-point minimum shared by every store.
pub(crate) fn at_least_two<T>(items: Vec<T>) -> Vec<T> {
    if items.len() < MIN_LOAD_POINTS {
        Vec::new()
    } else {
        items
    }
}

/// Lower bound of a look-back window, `None` for unbounded.
pub(crate) fn since(window: HistoryWindow, now: Timestamp) -> Option<Timestamp> {
    match window {
        HistoryWindow::All => None,
        HistoryWindow::Last(d) => Some(now - d),
    }
}

/// Upper bound of a look-ahead window, `None` for unbounded.
pub(crate) fn until(window: HistoryWindow, now: Timestamp) -> Option<Timestamp> {
    match window {
        HistoryWindow::All => None,
        HistoryWindow::Last(d) => Some(now + d),
    }
}

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

/// Both stores backed by one PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl SampleStore for PgStore {
    async fn load_recent(
        &self,
        window: HistoryWindow,
        sensor_id: &str,
    ) -> Result<Vec<Sample>, StoreError> {
        let rows = SampleRepo::list_for_sensor(&self.pool, sensor_id, since(window, Utc::now())).await?;
        Ok(at_least_two(rows.into_iter().map(Sample::from).collect()))
    }

    async fn record_sample(&self, sensor_id: &str, sample: Sample) -> Result<(), StoreError> {
        SampleRepo::insert(&self.pool, sensor_id, sample.value, sample.timestamp).await?;
        Ok(())
    }
}

#[async_trait]
impl ForecastStore for PgStore {
    async fn store_forecast(
        &self,
        sensor_id: &str,
        run_id: Uuid,
        points: &[ForecastPoint],
    ) -> Result<(), StoreError> {
        ForecastRepo::upsert_batch(&self.pool, sensor_id, run_id, points).await?;
        tracing::debug!(sensor_id, %run_id, points = points.len(), "Forecast written");
        Ok(())
    }

    async fn load_upcoming(
        &self,
        window: HistoryWindow,
        sensor_id: &str,
    ) -> Result<Vec<ForecastPoint>, StoreError> {
        let now = Utc::now();
        let rows = ForecastRepo::list_between(&self.pool, sensor_id, now, until(window, now)).await?;
        Ok(at_least_two(rows.into_iter().map(ForecastPoint::from).collect()))
    }
}
