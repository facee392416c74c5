//! Repository for the `ldr_samples` table (append-only time-series).

use ldr_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::sample::SampleRow;

/// Column list for `ldr_samples` SELECT queries.
const COLUMNS: &str = "id, sensor_id, value, recorded_at, created_at";

/// Provides query operations for light samples.
pub struct SampleRepo;

impl SampleRepo {
    /// Append one reading.
    pub async fn insert(
        pool: &PgPool,
        sensor_id: &str,
        value: f64,
        recorded_at: Timestamp,
    ) -> Result<SampleRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO ldr_samples (sensor_id, value, recorded_at) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SampleRow>(&query)
            .bind(sensor_id)
            .bind(value)
            .bind(recorded_at)
            .fetch_one(pool)
            .await
    }

    /// Readings for a sensor, oldest first, optionally bounded below.
    pub async fn list_for_sensor(
        pool: &PgPool,
        sensor_id: &str,
        since: Option<Timestamp>,
    ) -> Result<Vec<SampleRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM ldr_samples \
             WHERE sensor_id = $1 AND ($2::timestamptz IS NULL OR recorded_at >= $2) \
             ORDER BY recorded_at ASC"
        );
        sqlx::query_as::<_, SampleRow>(&query)
            .bind(sensor_id)
            .bind(since)
            .fetch_all(pool)
            .await
    }
}
