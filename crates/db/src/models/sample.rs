//! Row model for the `ldr_samples` table (append-only).

use ldr_core::types::{DbId, Sample, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A single stored light reading.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SampleRow {
    pub id: DbId,
    pub sensor_id: String,
    pub value: f64,
    pub recorded_at: Timestamp,
    pub created_at: Timestamp,
}

impl From<SampleRow> for Sample {
    fn from(row: SampleRow) -> Self {
        Sample::new(row.recorded_at, row.value)
    }
}
