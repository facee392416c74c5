//! Periodic announcement of each sensor's live settings.
//!
//! Every interval the announcer looks the sensor up in the registry and
//! publishes its sampling period and position name, so an update applied by
//! reconciliation is visible on the next announcement without a restart.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::state::SharedRegistry;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Broker rejected publish to {topic}: {reason}")]
    Rejected { topic: String, reason: String },
}

/// Publish/subscribe broker seam.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError>;
}

/// Writes announcements to the log instead of a broker.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPublisher;

#[async_trait]
impl Publisher for TracingPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        tracing::debug!(topic, payload, "Announcement");
        Ok(())
    }
}

pub fn sampling_period_topic(sensor_id: &str) -> String {
    format!("home/ldr{sensor_id}/sampling_period")
}

pub fn position_topic(sensor_id: &str) -> String {
    format!("home/ldr{sensor_id}/position")
}

/// Publish one round for `sensor_id`.
///
/// A rejected topic is logged and the other topic is still published.
/// Returns `false` only when the sensor is not in the registry.
pub async fn announce_once(registry: &SharedRegistry, publisher: &dyn Publisher, sensor_id: &str) -> bool {
    let (period, position) = {
        let registry = registry.read().await;
        match registry.get(sensor_id) {
            Some(entity) => (
                entity.sampling_period_seconds.to_string(),
                entity.position.name.clone(),
            ),
            None => return false,
        }
    };

    for (topic, payload) in [
        (sampling_period_topic(sensor_id), period),
        (position_topic(sensor_id), position),
    ] {
        if let Err(e) = publisher.publish(&topic, &payload).await {
            tracing::warn!(sensor_id, error = %e, "Announcement failed");
        }
    }
    true
}

/// Announce every `interval` until cancelled or the sensor disappears.
pub async fn run_announcer(
    sensor_id: String,
    registry: SharedRegistry,
    publisher: std::sync::Arc<dyn Publisher>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    tracing::info!(sensor_id = %sensor_id, interval_secs = interval.as_secs(), "Announcer started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if !announce_once(&registry, publisher.as_ref(), &sensor_id).await {
                    tracing::warn!(sensor_id = %sensor_id, "Sensor no longer registered, announcer exiting");
                    break;
                }
            }
        }
    }
    tracing::debug!(sensor_id = %sensor_id, "Announcer stopped");
}
