//! Domain events of the LDR daemon, broadcast in process.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the reconciliation
//! loop, the forecast scheduler, the alert monitor and their subscribers.

use chrono::{DateTime, Utc};
use ldr_core::types::SensorId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// LdrEvent
// ---------------------------------------------------------------------------

/// Something that happened inside the service.
///
/// Event names live in [`ldr_core::event_names`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdrEvent {
    /// Dot-separated event name, e.g. `"sensor.created"`.
    pub event_type: String,

    /// The sensor the event is about, if any.
    pub sensor_id: Option<SensorId>,

    /// Event-specific fields, e.g. the run id of a stored forecast.
    pub payload: serde_json::Value,

    /// Creation instant in UTC.
    pub timestamp: DateTime<Utc>,
}

impl LdrEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            sensor_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_sensor(mut self, sensor_id: impl Into<SensorId>) -> Self {
        self.sensor_id = Some(sensor_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// How far a subscriber may fall behind before it loses the oldest events.
/// A reconciliation pass over a large sensors file publishes one event per
/// sensor in a single burst.
const EVENT_BACKLOG: usize = 1024;

/// Fans [`LdrEvent`]s out to the sensor supervisor, the journal and anyone
/// else holding a receiver.
///
/// A receiver sees the events published after it subscribed. One that falls
/// more than the backlog behind gets `RecvError::Lagged` and resumes at the
/// oldest event still retained.
///
/// ```rust
/// use ldr_events::{EventBus, LdrEvent};
///
/// let bus = EventBus::default();
/// let mut supervisor = bus.subscribe();
///
/// let reached = bus.publish(LdrEvent::new("sensor.created").with_sensor("1"));
/// assert_eq!(reached, 1);
/// assert_eq!(supervisor.try_recv().unwrap().sensor_id.as_deref(), Some("1"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<LdrEvent>,
}

impl EventBus {
    pub fn with_backlog(backlog: usize) -> Self {
        let (sender, _) = broadcast::channel(backlog);
        Self { sender }
    }

    /// Returns how many receivers the event reached. Zero is normal before
    /// the supervisor and journal subscribe at startup.
    pub fn publish(&self, event: LdrEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LdrEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_backlog(EVENT_BACKLOG)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
