//! Repository for the `ldr_forecasts` table.

use ldr_core::types::{ForecastPoint, Timestamp};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::forecast::ForecastRow;

/// Column list for `ldr_forecasts` SELECT queries.
const COLUMNS: &str = "\
    id, sensor_id, run_id, target_at, \
    yhat, yhat_lower, yhat_upper, created_at";

/// Column list for INSERT statements (excludes `id` and `created_at`).
const INSERT_COLUMNS: &str = "sensor_id, run_id, target_at, yhat, yhat_lower, yhat_upper";

const INSERT_COLUMN_COUNT: u32 = 6;

/// Provides query operations for forecast points.
pub struct ForecastRepo;

impl ForecastRepo {
    /// Write a run's points, replacing any earlier point for the same
    /// sensor and target timestamp.
    ///
    /// Uses a single multi-row INSERT.
    pub async fn upsert_batch(
        pool: &PgPool,
        sensor_id: &str,
        run_id: Uuid,
        points: &[ForecastPoint],
    ) -> Result<(), sqlx::Error> {
        if points.is_empty() {
            return Ok(());
        }

        let mut query = format!("INSERT INTO ldr_forecasts ({INSERT_COLUMNS}) VALUES ");
        let mut param_idx = 1u32;
        for i in 0..points.len() {
            if i > 0 {
                query.push_str(", ");
            }
            query.push('(');
            for j in 0..INSERT_COLUMN_COUNT {
                if j > 0 {
                    query.push_str(", ");
                }
                query.push('$');
                query.push_str(&param_idx.to_string());
                param_idx += 1;
            }
            query.push(')');
        }
        query.push_str(
            " ON CONFLICT (sensor_id, target_at) DO UPDATE SET \
             run_id = EXCLUDED.run_id, yhat = EXCLUDED.yhat, \
             yhat_lower = EXCLUDED.yhat_lower, yhat_upper = EXCLUDED.yhat_upper, \
             created_at = NOW()",
        );

        let mut q = sqlx::query(&query);
        for p in points {
            q = q
                .bind(sensor_id)
                .bind(run_id)
                .bind(p.timestamp)
                .bind(p.yhat)
                .bind(p.yhat_lower)
                .bind(p.yhat_upper);
        }

        q.execute(pool).await?;
        Ok(())
    }

    /// Points for a sensor with `from <= target_at [<= until]`, in order.
    pub async fn list_between(
        pool: &PgPool,
        sensor_id: &str,
        from: Timestamp,
        until: Option<Timestamp>,
    ) -> Result<Vec<ForecastRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM ldr_forecasts \
             WHERE sensor_id = $1 AND target_at >= $2 \
               AND ($3::timestamptz IS NULL OR target_at <= $3) \
             ORDER BY target_at ASC"
        );
        sqlx::query_as::<_, ForecastRow>(&query)
            .bind(sensor_id)
            .bind(from)
            .bind(until)
            .fetch_all(pool)
            .await
    }
}
