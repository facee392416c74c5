//! Configuration reconciliation loop.
//!
//! Each cycle walks `LOAD_CONFIG -> DIFF -> APPLY`:
//!
//! 1. load a fresh [`ConfigSnapshot`] from the [`ConfigSource`]; on failure
//!    the cycle is abandoned and the registry is left untouched;
//! 2. classify every declaration as new or existing;
//! 3. upsert every declaration (existing entities are rewritten in place even
//!    when nothing changed, which is a no-op by construction).
//!
//! Cycles start on a fixed tick. A pass that overruns delays the next tick
//! rather than bunching up missed ones. A [`ReloadTrigger`] requests one
//! extra pass between ticks.

use std::sync::Arc;
use std::time::Duration;

use ldr_core::config::{ConfigLoadError, ConfigSnapshot};
use ldr_core::event_names;
use ldr_core::registry::UpsertOutcome;
use ldr_core::sensor::{SensorDeclaration, TransportConfig};
use ldr_core::types::SensorId;
use ldr_events::{EventBus, LdrEvent};
use tokio::sync::{Mutex, Notify};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config_source::ConfigSource;
use crate::state::SharedRegistry;

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// Cloneable handle asking the loop for an immediate pass.
///
/// Requests made while one is already pending collapse into one pass.
#[derive(Clone)]
pub struct ReloadTrigger {
    notify: Arc<Notify>,
}

impl ReloadTrigger {
    pub fn reload_now(&self) {
        self.notify.notify_one();
    }
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// How a declaration relates to the registry at DIFF time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationStatus {
    New,
    Existing,
}

/// Summary of one completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub created: Vec<SensorId>,
    pub updated: Vec<SensorId>,
    pub unchanged: Vec<SensorId>,
}

impl PassReport {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ReconciliationLoop
// ---------------------------------------------------------------------------

pub struct ReconciliationLoop {
    source: Arc<dyn ConfigSource>,
    registry: SharedRegistry,
    events: Arc<EventBus>,
    interval: Duration,
    notify: Arc<Notify>,
    transport: Mutex<Option<Arc<TransportConfig>>>,
}

impl ReconciliationLoop {
    pub fn new(
        source: Arc<dyn ConfigSource>,
        registry: SharedRegistry,
        events: Arc<EventBus>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            registry,
            events,
            interval,
            notify: Arc::new(Notify::new()),
            transport: Mutex::new(None),
        }
    }

    pub fn trigger(&self) -> ReloadTrigger {
        ReloadTrigger {
            notify: Arc::clone(&self.notify),
        }
    }

    /// Run one `LOAD_CONFIG -> DIFF -> APPLY` pass.
    pub async fn run_pass(&self) -> Result<PassReport, ConfigLoadError> {
        let snapshot = match self.source.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, "Configuration reload failed, registry left unchanged");
                self.events.publish(
                    LdrEvent::new(event_names::CONFIG_RELOAD_FAILED)
                        .with_payload(serde_json::json!({ "error": e.to_string() })),
                );
                return Err(e);
            }
        };

        let transport = self.shared_transport(&snapshot).await;
        let report = {
            let mut registry = self.registry.write().await;
            let plan: Vec<(&SensorDeclaration, DeclarationStatus)> = snapshot
                .sensors
                .iter()
                .map(|decl| {
                    let status = if registry.contains(&decl.sensor_id) {
                        DeclarationStatus::Existing
                    } else {
                        DeclarationStatus::New
                    };
                    (decl, status)
                })
                .collect();

            tracing::trace!(
                new = plan.iter().filter(|(_, s)| *s == DeclarationStatus::New).count(),
                existing = plan.iter().filter(|(_, s)| *s == DeclarationStatus::Existing).count(),
                "Declarations classified"
            );

            let mut report = PassReport::default();
            for (decl, _) in plan {
                let id = decl.sensor_id.clone();
                match registry.upsert_from_declaration(decl, &transport) {
                    UpsertOutcome::Created => report.created.push(id),
                    UpsertOutcome::Updated { changed: true } => report.updated.push(id),
                    UpsertOutcome::Updated { changed: false } => report.unchanged.push(id),
                }
            }
            report
        };

        self.announce(&snapshot, &report);
        Ok(report)
    }

    /// Tick until cancelled, also serving [`ReloadTrigger`] requests.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Reconciliation loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Reconciliation loop stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let _ = self.run_pass().await;
                }
                _ = self.notify.notified() => {
                    tracing::info!("Out-of-band reconciliation pass requested");
                    let _ = self.run_pass().await;
                }
            }
        }
    }

    /// Reuse the previous transport handle while its contents are unchanged
    /// so every sensor created under the same settings shares one `Arc`.
    async fn shared_transport(&self, snapshot: &ConfigSnapshot) -> Arc<TransportConfig> {
        let fresh = snapshot.defaults.transport();
        let mut cached = self.transport.lock().await;
        match cached.as_ref() {
            Some(existing) if **existing == fresh => Arc::clone(existing),
            _ => {
                let handle = Arc::new(fresh);
                *cached = Some(Arc::clone(&handle));
                handle
            }
        }
    }

    fn announce(&self, snapshot: &ConfigSnapshot, report: &PassReport) {
        let declarations = |ids: &[SensorId]| -> Vec<SensorDeclaration> {
            snapshot
                .sensors
                .iter()
                .filter(|d| ids.contains(&d.sensor_id))
                .cloned()
                .collect()
        };

        for decl in declarations(&report.created) {
            tracing::info!(
                sensor_id = %decl.sensor_id,
                position = %decl.position.name,
                coap_port = decl.coap_port,
                "Sensor registered"
            );
            self.events.publish(
                LdrEvent::new(event_names::SENSOR_CREATED)
                    .with_sensor(decl.sensor_id.clone())
                    .with_payload(serde_json::json!({
                        "position": decl.position.name,
                        "coap_port": decl.coap_port,
                        "sampling_period_seconds": decl.sampling_period_seconds,
                    })),
            );
        }

        for decl in declarations(&report.updated) {
            tracing::info!(
                sensor_id = %decl.sensor_id,
                position = %decl.position.name,
                sampling_period_seconds = decl.sampling_period_seconds,
                "Sensor updated"
            );
            self.events.publish(
                LdrEvent::new(event_names::SENSOR_UPDATED)
                    .with_sensor(decl.sensor_id.clone())
                    .with_payload(serde_json::json!({
                        "position": decl.position.name,
                        "sampling_period_seconds": decl.sampling_period_seconds,
                        "accumulation_window_seconds": decl.accumulation_window_seconds,
                    })),
            );
        }

        tracing::debug!(
            created = report.created.len(),
            updated = report.updated.len(),
            unchanged = report.unchanged.len(),
            "Reconciliation pass complete"
        );
    }
}
