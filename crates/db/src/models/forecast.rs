//! Row model for the `ldr_forecasts` table.

use ldr_core::types::{DbId, ForecastPoint, Timestamp};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// One forecast point as stored, tagged with the batch run that wrote it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ForecastRow {
    pub id: DbId,
    pub sensor_id: String,
    pub run_id: Uuid,
    pub target_at: Timestamp,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    pub created_at: Timestamp,
}

impl From<ForecastRow> for ForecastPoint {
    fn from(row: ForecastRow) -> Self {
        ForecastPoint {
            timestamp: row.target_at,
            yhat: row.yhat,
            yhat_lower: row.yhat_lower,
            yhat_upper: row.yhat_upper,
        }
    }
}
