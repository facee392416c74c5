//! Shared fixtures for the daemon integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use ldr_core::config::{
    CoapConfig, ConfigLoadError, ConfigSnapshot, DatabaseConfig, DefaultConfig, ForecastSettings,
    MqttConfig, SensorsConfig,
};
use ldr_core::forecast::{ForecastError, SeriesForecaster};
use ldr_core::holidays::HolidaySet;
use ldr_core::sensor::{PlantDescriptor, Position, SensorDeclaration};
use ldr_core::types::{ForecastPoint, HistoryWindow, Sample, Timestamp};
use ldr_daemon::announcer::{PublishError, Publisher};
use ldr_daemon::config_source::ConfigSource;
use ldr_db::{ForecastStore, SampleStore, StoreError};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub fn defaults() -> DefaultConfig {
    DefaultConfig {
        coap: CoapConfig {
            ip: "0.0.0.0".into(),
        },
        mqtt: MqttConfig {
            ip: "127.0.0.1".into(),
            port: 1883,
            user: String::new(),
            password: String::new(),
            keep_alive_secs: 60,
            publish_interval_secs: 1,
        },
        database: DatabaseConfig {
            url: None,
            prediction_period_min: 15,
        },
        forecast: ForecastSettings::default(),
    }
}

pub fn declaration(id: &str) -> SensorDeclaration {
    SensorDeclaration {
        sensor_id: id.into(),
        coap_port: 5683,
        position: Position {
            id: format!("pos-{id}"),
            name: format!("Room {id}"),
            description: String::new(),
        },
        plant: PlantDescriptor {
            kind: "Basil".into(),
            light_need_hours: 6,
        },
        sampling_period_seconds: 10,
        accumulation_window_seconds: 60,
    }
}

pub fn snapshot(sensors: Vec<SensorDeclaration>) -> ConfigSnapshot {
    ConfigSnapshot::new(defaults(), SensorsConfig { sensors }).expect("fixture config is valid")
}

/// A [`ConfigSource`] whose next result the test sets by hand.
pub struct ScriptedSource {
    next: Mutex<Result<ConfigSnapshot, String>>,
}

impl ScriptedSource {
    pub fn new(snapshot: ConfigSnapshot) -> Arc<Self> {
        Arc::new(Self {
            next: Mutex::new(Ok(snapshot)),
        })
    }

    pub fn set(&self, snapshot: ConfigSnapshot) {
        *self.next.lock().unwrap() = Ok(snapshot);
    }

    pub fn fail(&self, reason: &str) {
        *self.next.lock().unwrap() = Err(reason.to_string());
    }
}

#[async_trait]
impl ConfigSource for ScriptedSource {
    async fn load(&self) -> Result<ConfigSnapshot, ConfigLoadError> {
        self.next
            .lock()
            .unwrap()
            .clone()
            .map_err(ConfigLoadError::Validation)
    }
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

/// Remembers every publish in order.
#[derive(Default)]
pub struct RecordingPublisher {
    pub messages: Mutex<Vec<(String, String)>>,
}

impl RecordingPublisher {
    pub fn last_on(&self, topic: &str) -> Option<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}

/// Rejects every publish to `rejected_topic` and records the rest.
pub struct RejectingPublisher {
    pub rejected_topic: String,
    pub rejections: Mutex<usize>,
    pub accepted: RecordingPublisher,
}

impl RejectingPublisher {
    pub fn rejecting(topic: String) -> Self {
        Self {
            rejected_topic: topic,
            rejections: Mutex::new(0),
            accepted: RecordingPublisher::default(),
        }
    }

    pub fn rejections(&self) -> usize {
        *self.rejections.lock().unwrap()
    }
}

#[async_trait]
impl Publisher for RejectingPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        if topic == self.rejected_topic {
            *self.rejections.lock().unwrap() += 1;
            return Err(PublishError::Rejected {
                topic: topic.to_string(),
                reason: "not authorized".into(),
            });
        }
        self.accepted.publish(topic, payload).await
    }
}

// ---------------------------------------------------------------------------
// Forecasting
// ---------------------------------------------------------------------------

/// Forecasts a flat line at the series mean, or fails for chosen sensors.
///
/// The forecaster only sees the series, so sensors are told apart by their
/// first sample value.
pub struct StubForecaster {
    pub failing_first_values: HashSet<u64>,
}

impl StubForecaster {
    pub fn new() -> Self {
        Self {
            failing_first_values: HashSet::new(),
        }
    }

    pub fn failing_on(first_value: f64) -> Self {
        Self {
            failing_first_values: HashSet::from([first_value.to_bits()]),
        }
    }
}

impl SeriesForecaster for StubForecaster {
    fn forecast(
        &self,
        series: &[Sample],
        _holidays: &HolidaySet,
        now: Timestamp,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        if series.len() < 2 {
            return Err(ForecastError::InsufficientData {
                required: 2,
                actual: series.len(),
            });
        }
        if self.failing_first_values.contains(&series[0].value.to_bits()) {
            return Err(ForecastError::ModelFit("singular design matrix".into()));
        }
        let mean = series.iter().map(|s| s.value).sum::<f64>() / series.len() as f64;
        Ok((0..=4)
            .map(|i| ForecastPoint {
                timestamp: now + Duration::minutes(15 * i),
                yhat: mean,
                yhat_lower: mean - 1.0,
                yhat_upper: mean + 1.0,
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// A store whose every call fails.
pub struct BrokenStore;

#[async_trait]
impl SampleStore for BrokenStore {
    async fn load_recent(
        &self,
        _window: HistoryWindow,
        _sensor_id: &str,
    ) -> Result<Vec<Sample>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn record_sample(&self, _sensor_id: &str, _sample: Sample) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

#[async_trait]
impl ForecastStore for BrokenStore {
    async fn store_forecast(
        &self,
        _sensor_id: &str,
        _run_id: Uuid,
        _points: &[ForecastPoint],
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn load_upcoming(
        &self,
        _window: HistoryWindow,
        _sensor_id: &str,
    ) -> Result<Vec<ForecastPoint>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}
