//! Structured-log sink for bus events.
//!
//! [`EventJournal`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! writes one log line per event. Alerts and failures are raised in level so
//! they stand out in the service log.

use ldr_core::event_names;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::LdrEvent;

pub struct EventJournal;

impl EventJournal {
    /// Run until cancelled or until the bus is dropped.
    pub async fn run(mut receiver: broadcast::Receiver<LdrEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Event journal stopping");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) => Self::record(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Event journal lagged, some events were not logged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, journal shutting down");
                        break;
                    }
                },
            }
        }
    }

    fn record(event: &LdrEvent) {
        let sensor_id = event.sensor_id.as_deref().unwrap_or("-");
        match event.event_type.as_str() {
            event_names::LIGHT_LEADER_CHANGED => {
                let message = event.payload["message"].as_str().unwrap_or_default();
                tracing::info!(sensor_id, "Light leader changed\n{message}");
            }
            event_names::FORECAST_FAILED | event_names::CONFIG_RELOAD_FAILED => {
                tracing::warn!(
                    event_type = %event.event_type,
                    sensor_id,
                    payload = %event.payload,
                    "Event"
                );
            }
            _ => {
                tracing::debug!(
                    event_type = %event.event_type,
                    sensor_id,
                    payload = %event.payload,
                    "Event"
                );
            }
        }
    }
}
