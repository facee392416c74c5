//! Sensor declarations (what the configuration file says) and sensor
//! entities (what the running service holds).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::{DatabaseConfig, MqttConfig};
use crate::types::SensorId;

// ---------------------------------------------------------------------------
// Declaration types
// ---------------------------------------------------------------------------

/// Where a sensor is installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Position {
    #[serde(alias = "position_id")]
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// The plant a sensor watches, as declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PlantDescriptor {
    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub kind: String,
    /// Hours of light per day the plant needs.
    #[serde(alias = "light_amount")]
    #[validate(range(max = 24))]
    pub light_need_hours: u32,
}

/// One entry of the sensors file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SensorDeclaration {
    #[serde(rename = "id")]
    #[validate(length(min = 1, max = 64))]
    pub sensor_id: SensorId,
    #[validate(range(min = 1))]
    pub coap_port: u16,
    #[validate(nested)]
    pub position: Position,
    #[validate(nested)]
    pub plant: PlantDescriptor,
    #[serde(rename = "sampling_period")]
    #[validate(range(min = 1, max = 86400))]
    pub sampling_period_seconds: u32,
    #[serde(rename = "accumulation_window")]
    #[validate(range(min = 1))]
    pub accumulation_window_seconds: u32,
}

// ---------------------------------------------------------------------------
// Entity types
// ---------------------------------------------------------------------------

/// Plant information annotated with the sensor that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plant {
    pub kind: String,
    pub light_need_hours: u32,
    pub sensor_id: SensorId,
}

impl Plant {
    fn from_descriptor(descriptor: &PlantDescriptor, sensor_id: &str) -> Self {
        Self {
            kind: descriptor.kind.clone(),
            light_need_hours: descriptor.light_need_hours,
            sensor_id: sensor_id.to_string(),
        }
    }
}

/// Address the device protocol server binds for one sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceEndpoint {
    pub ip: String,
    pub port: u16,
    /// Resource path devices post readings to.
    pub resource: String,
}

impl DeviceEndpoint {
    pub fn for_sensor(ip: &str, port: u16, sensor_id: &str) -> Self {
        Self {
            ip: ip.to_string(),
            port,
            resource: format!("ldrData{sensor_id}"),
        }
    }
}

/// Broker and database settings shared by every sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub device_ip: String,
    pub mqtt: MqttConfig,
    pub database: DatabaseConfig,
}

/// A live sensor as held by the registry.
#[derive(Debug, Clone)]
pub struct SensorEntity {
    pub sensor_id: SensorId,
    pub position: Position,
    pub plant: Plant,
    pub sampling_period_seconds: u32,
    pub accumulation_window_seconds: u32,
    pub endpoint: DeviceEndpoint,
    pub transport: Arc<TransportConfig>,
    /// Mean observed light over the last alert window.
    pub current_observed_average: f64,
    /// Mean forecast light over the next alert window.
    pub predicted_average: f64,
}

impl SensorEntity {
    pub fn from_declaration(decl: &SensorDeclaration, transport: Arc<TransportConfig>) -> Self {
        Self {
            sensor_id: decl.sensor_id.clone(),
            position: decl.position.clone(),
            plant: Plant::from_descriptor(&decl.plant, &decl.sensor_id),
            sampling_period_seconds: decl.sampling_period_seconds,
            accumulation_window_seconds: decl.accumulation_window_seconds,
            endpoint: DeviceEndpoint::for_sensor(&transport.device_ip, decl.coap_port, &decl.sensor_id),
            transport,
            current_observed_average: 0.0,
            predicted_average: 0.0,
        }
    }

    /// Copy the declaration's mutable fields onto this entity.
    ///
    /// Endpoint, transport and the light averages are left alone. Returns
    /// whether anything changed.
    pub fn apply_declaration(&mut self, decl: &SensorDeclaration) -> bool {
        let plant = Plant::from_descriptor(&decl.plant, &self.sensor_id);
        let changed = self.position != decl.position
            || self.plant != plant
            || self.sampling_period_seconds != decl.sampling_period_seconds
            || self.accumulation_window_seconds != decl.accumulation_window_seconds;

        self.position = decl.position.clone();
        self.plant = plant;
        self.sampling_period_seconds = decl.sampling_period_seconds;
        self.accumulation_window_seconds = decl.accumulation_window_seconds;
        changed
    }
}
