//! Where configuration snapshots come from.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ldr_core::config::{ConfigLoadError, ConfigSnapshot};

/// Produces a fresh, validated snapshot on every call.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load(&self) -> Result<ConfigSnapshot, ConfigLoadError>;
}

/// The two JSON files on disk.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    defaults_path: PathBuf,
    sensors_path: PathBuf,
}

impl FileConfigSource {
    pub fn new(defaults_path: impl Into<PathBuf>, sensors_path: impl Into<PathBuf>) -> Self {
        Self {
            defaults_path: defaults_path.into(),
            sensors_path: sensors_path.into(),
        }
    }

    /// Files a change notifier should watch.
    pub fn paths(&self) -> Vec<PathBuf> {
        vec![self.defaults_path.clone(), self.sensors_path.clone()]
    }
}

async fn read(path: &Path) -> Result<String, ConfigLoadError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigLoadError::Io {
            path: path.display().to_string(),
            source,
        })
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn load(&self) -> Result<ConfigSnapshot, ConfigLoadError> {
        let defaults = read(&self.defaults_path).await?;
        let sensors = read(&self.sensors_path).await?;
        ConfigSnapshot::from_json(&defaults, &sensors)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileConfigSource::new(dir.path().join("nope.json"), dir.path().join("also-nope.json"));
        assert_matches!(source.load().await, Err(ConfigLoadError::Io { .. }));
    }

    #[tokio::test]
    async fn reads_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let defaults = dir.path().join("default_config.json");
        let sensors = dir.path().join("sensors_config.json");
        std::fs::write(
            &defaults,
            r#"{"coap": {"ip": "0.0.0.0"},
                "mqtt": {"ip": "localhost", "port": 1883},
                "database": {"prediction_period_min": 15}}"#,
        )
        .unwrap();
        std::fs::write(&sensors, r#"{"sensors": []}"#).unwrap();

        let snapshot = FileConfigSource::new(&defaults, &sensors).load().await.unwrap();
        assert_eq!(snapshot.defaults.mqtt.ip, "localhost");
        assert!(snapshot.sensors.is_empty());
    }
}
