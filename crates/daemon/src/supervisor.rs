//! Per-sensor background tasks.
//!
//! [`SensorSupervisor`] listens for `sensor.created` events and starts one
//! announcer per sensor. Each task gets a child of the supervisor's
//! cancellation token so [`shutdown`](SensorSupervisor::shutdown) can stop
//! them all.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ldr_core::event_names;
use ldr_events::LdrEvent;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::announcer::{run_announcer, Publisher};
use crate::state::{sensor_ids, SharedRegistry};

/// How long [`SensorSupervisor::shutdown`] waits for each task.
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

struct ManagedAnnouncer {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

pub struct SensorSupervisor {
    registry: SharedRegistry,
    publisher: Arc<dyn Publisher>,
    announcers: RwLock<HashMap<String, ManagedAnnouncer>>,
    cancel: CancellationToken,
}

impl SensorSupervisor {
    pub fn new(registry: SharedRegistry, publisher: Arc<dyn Publisher>, parent: &CancellationToken) -> Self {
        Self {
            registry,
            publisher,
            announcers: RwLock::new(HashMap::new()),
            cancel: parent.child_token(),
        }
    }

    /// Start an announcer for `sensor_id` unless one is already running.
    ///
    /// Returns `true` when a task was spawned.
    pub async fn ensure_announcer(&self, sensor_id: &str) -> bool {
        let interval = {
            let registry = self.registry.read().await;
            match registry.get(sensor_id) {
                Some(entity) => Duration::from_secs(entity.transport.mqtt.publish_interval_secs),
                None => return false,
            }
        };

        let mut announcers = self.announcers.write().await;
        if announcers.get(sensor_id).is_some_and(|a| !a.handle.is_finished()) {
            return false;
        }

        let cancel = self.cancel.child_token();
        let handle = tokio::spawn(run_announcer(
            sensor_id.to_string(),
            Arc::clone(&self.registry),
            Arc::clone(&self.publisher),
            interval,
            cancel.clone(),
        ));
        announcers.insert(sensor_id.to_string(), ManagedAnnouncer { handle, cancel });
        true
    }

    pub async fn active_count(&self) -> usize {
        self.announcers
            .read()
            .await
            .values()
            .filter(|a| !a.handle.is_finished())
            .count()
    }

    /// Follow bus events until cancelled or the bus closes.
    pub async fn run(self: Arc<Self>, mut events: broadcast::Receiver<LdrEvent>) {
        // Sensors registered before this task subscribed.
        for id in sensor_ids(&self.registry).await {
            self.ensure_announcer(&id).await;
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = events.recv() => match received {
                    Ok(event) if event.event_type == event_names::SENSOR_CREATED => {
                        if let Some(id) = event.sensor_id.as_deref() {
                            self.ensure_announcer(id).await;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Supervisor lagged, resynchronising announcers");
                        for id in sensor_ids(&self.registry).await {
                            self.ensure_announcer(&id).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }

    /// Cancel every task and wait for them to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let drained: Vec<(String, ManagedAnnouncer)> = self.announcers.write().await.drain().collect();
        for (sensor_id, announcer) in drained {
            announcer.cancel.cancel();
            if tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, announcer.handle).await.is_err() {
                tracing::warn!(sensor_id = %sensor_id, "Announcer did not stop in time");
            }
        }
        tracing::info!("Sensor supervisor shut down");
    }
}
