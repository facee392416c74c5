use serde::{Deserialize, Serialize};

/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Sensor identifiers are the string ids declared in the sensors file.
pub type SensorId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A single light reading as recorded by a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: Timestamp,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// One forecast step: point estimate plus the interval bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: Timestamp,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

/// How much history a store query should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryWindow {
    /// Every stored point.
    All,
    /// Points within the given duration of "now" (past for samples, future
    /// for forecasts).
    Last(chrono::Duration),
}

impl HistoryWindow {
    pub fn hours(hours: i64) -> Self {
        Self::Last(chrono::Duration::hours(hours))
    }
}
