//! Typed declarative configuration.
//!
//! Two JSON documents make up one [`ConfigSnapshot`]:
//!
//! - the defaults file (device bind address, broker, database and forecast
//!   settings shared by all sensors);
//! - the sensors file (`{"sensors": [...]}`), one [`SensorDeclaration`] per
//!   device.
//!
//! Both are parsed with serde and checked with `validator` before anything
//! downstream sees them, so a snapshot that exists is a valid snapshot.

use std::collections::HashSet;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::forecast::{ForecastConfig, SeasonalTerms, DEFAULT_RIDGE_PENALTY};
use crate::holidays::{HolidayCalendar, MonthDay};
use crate::sensor::{SensorDeclaration, TransportConfig};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {document}: {source}")]
    Parse {
        document: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

impl From<validator::ValidationErrors> for ConfigLoadError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ConfigLoadError::Validation(errors.to_string())
    }
}

// ---------------------------------------------------------------------------
// Defaults file
// ---------------------------------------------------------------------------

fn default_keep_alive() -> u64 {
    60
}

fn default_publish_interval() -> u64 {
    5
}

fn default_horizon_minutes() -> u32 {
    360
}

fn default_interval_width() -> f64 {
    0.75
}

fn default_outlier_threshold() -> f64 {
    crate::cleaning::DEFAULT_THRESHOLD
}

fn default_outlier_window_minutes() -> u32 {
    240
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CoapConfig {
    /// Address every device endpoint binds to.
    #[validate(length(min = 1))]
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MqttConfig {
    #[validate(length(min = 1))]
    pub ip: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_keep_alive")]
    #[validate(range(min = 1))]
    pub keep_alive_secs: u64,
    /// Seconds between announcements of a sensor's position and period.
    #[serde(default = "default_publish_interval")]
    #[validate(range(min = 1, max = 3600))]
    pub publish_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// Overridden by `DATABASE_URL` when set.
    #[serde(default)]
    pub url: Option<String>,
    /// Forecast step and forecasting cadence, in minutes.
    #[validate(range(min = 1, max = 360))]
    pub prediction_period_min: u32,
}

/// Optional overrides for the forecasting pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ForecastSettings {
    #[serde(default = "default_horizon_minutes")]
    #[validate(range(min = 1, max = 10080))]
    pub horizon_minutes: u32,
    #[serde(default = "default_interval_width")]
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub interval_width: f64,
    #[serde(default = "default_outlier_threshold")]
    #[validate(range(exclusive_min = 0.0))]
    pub outlier_threshold: f64,
    #[serde(default = "default_outlier_window_minutes")]
    #[validate(range(min = 1))]
    pub outlier_window_minutes: u32,
    /// `MM-DD` holidays replacing the built-in Italian list.
    #[serde(default)]
    pub fixed_holidays: Option<Vec<MonthDay>>,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            horizon_minutes: default_horizon_minutes(),
            interval_width: default_interval_width(),
            outlier_threshold: default_outlier_threshold(),
            outlier_window_minutes: default_outlier_window_minutes(),
            fixed_holidays: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DefaultConfig {
    #[validate(nested)]
    pub coap: CoapConfig,
    #[validate(nested)]
    pub mqtt: MqttConfig,
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[serde(default)]
    #[validate(nested)]
    pub forecast: ForecastSettings,
}

impl DefaultConfig {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            device_ip: self.coap.ip.clone(),
            mqtt: self.mqtt.clone(),
            database: self.database.clone(),
        }
    }

    pub fn forecast_config(&self) -> ForecastConfig {
        ForecastConfig {
            step: Duration::minutes(i64::from(self.database.prediction_period_min)),
            horizon: Duration::minutes(i64::from(self.forecast.horizon_minutes)),
            interval_width: self.forecast.interval_width,
            outlier_threshold: self.forecast.outlier_threshold,
            outlier_window: Duration::minutes(i64::from(self.forecast.outlier_window_minutes)),
            terms: SeasonalTerms::default(),
            ridge_penalty: DEFAULT_RIDGE_PENALTY,
        }
    }

    pub fn holiday_calendar(&self) -> HolidayCalendar {
        match &self.forecast.fixed_holidays {
            Some(fixed) => HolidayCalendar::with_fixed_dates(fixed.clone()),
            None => HolidayCalendar::italian(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensors file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SensorsConfig {
    #[validate(nested)]
    pub sensors: Vec<SensorDeclaration>,
}

impl SensorsConfig {
    /// Reject duplicate sensor ids; field checks are done by `validate`.
    fn check_unique_ids(&self) -> Result<(), ConfigLoadError> {
        let mut seen = HashSet::new();
        for decl in &self.sensors {
            if !seen.insert(decl.sensor_id.as_str()) {
                return Err(ConfigLoadError::Validation(format!(
                    "duplicate sensor id '{}'",
                    decl.sensor_id
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConfigSnapshot
// ---------------------------------------------------------------------------

/// One consistent, validated view of both configuration files.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    pub defaults: DefaultConfig,
    pub sensors: Vec<SensorDeclaration>,
}

impl ConfigSnapshot {
    pub fn from_json(defaults_json: &str, sensors_json: &str) -> Result<Self, ConfigLoadError> {
        let defaults: DefaultConfig =
            serde_json::from_str(defaults_json).map_err(|source| ConfigLoadError::Parse {
                document: "default configuration",
                source,
            })?;
        let sensors: SensorsConfig =
            serde_json::from_str(sensors_json).map_err(|source| ConfigLoadError::Parse {
                document: "sensors configuration",
                source,
            })?;
        Self::new(defaults, sensors)
    }

    pub fn new(defaults: DefaultConfig, sensors: SensorsConfig) -> Result<Self, ConfigLoadError> {
        defaults.validate()?;
        sensors.validate()?;
        sensors.check_unique_ids()?;
        Ok(Self {
            defaults,
            sensors: sensors.sensors,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
