//! Shared handles passed between the daemon's tasks.

use std::sync::Arc;

use ldr_core::registry::SensorRegistry;
use tokio::sync::RwLock;

/// The registry as shared by every task.
///
/// Only the reconciliation loop upserts; other tasks take short read locks
/// and copy what they need for one cycle.
pub type SharedRegistry = Arc<RwLock<SensorRegistry>>;

pub fn shared_registry() -> SharedRegistry {
    Arc::new(RwLock::new(SensorRegistry::new()))
}

/// Ids of every registered sensor, in registry order.
pub async fn sensor_ids(registry: &SharedRegistry) -> Vec<String> {
    registry
        .read()
        .await
        .list()
        .iter()
        .map(|e| e.sensor_id.clone())
        .collect()
}
