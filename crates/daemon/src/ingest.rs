//! Entry point for device readings.
//!
//! The device protocol binding hands every reading to
//! [`Ingestor::record_reading`] as the raw payload text. Parsing failures are
//! reported to the caller; storage failures are logged and swallowed so one
//! bad write never stops ingestion.

use std::sync::Arc;

use chrono::Utc;
use ldr_core::types::Sample;
use ldr_db::SampleStore;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Reading '{0}' is not a finite number")]
    NotNumeric(String),
}

/// Parse a raw reading, rejecting anything that is not a finite number.
pub fn parse_reading(raw: &str) -> Result<f64, IngestError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(IngestError::NotNumeric(raw.to_string())),
    }
}

#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn SampleStore>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn SampleStore>) -> Self {
        Self { store }
    }

    /// Parse `raw`, stamp it with the current time and store it.
    pub async fn record_reading(&self, sensor_id: &str, raw: &str) -> Result<f64, IngestError> {
        let value = parse_reading(raw)?;
        let sample = Sample::new(Utc::now(), value);
        if let Err(e) = self.store.record_sample(sensor_id, sample).await {
            tracing::error!(sensor_id, error = %e, "Failed to store reading");
        } else {
            tracing::trace!(sensor_id, value, "Reading stored");
        }
        Ok(value)
    }
}
