//! The live set of sensor entities.
//!
//! The registry is an explicit value owned by whoever constructs it (the
//! daemon wraps it in `Arc<RwLock<_>>`); there is no process-global sensor
//! list. Entities are only ever added or updated in place, never removed.

use std::collections::HashMap;
use std::sync::Arc;

use crate::sensor::{SensorDeclaration, SensorEntity, TransportConfig};

/// What [`SensorRegistry::upsert_from_declaration`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No entity existed; one was constructed and appended.
    Created,
    /// An entity existed and its mutable fields were overwritten.
    Updated { changed: bool },
}

#[derive(Debug, Default)]
pub struct SensorRegistry {
    entities: Vec<SensorEntity>,
    index: HashMap<String, usize>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sensor_id: &str) -> Option<&SensorEntity> {
        self.index.get(sensor_id).map(|&i| &self.entities[i])
    }

    pub fn contains(&self, sensor_id: &str) -> bool {
        self.index.contains_key(sensor_id)
    }

    /// Entities in insertion order.
    pub fn list(&self) -> &[SensorEntity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Insert a new entity for `decl`, or update the existing one in place.
    ///
    /// Existing entities keep their endpoint, transport handle and light
    /// averages. Applying the same declaration twice leaves the registry
    /// exactly as after the first call.
    pub fn upsert_from_declaration(
        &mut self,
        decl: &SensorDeclaration,
        transport: &Arc<TransportConfig>,
    ) -> UpsertOutcome {
        if let Some(&i) = self.index.get(&decl.sensor_id) {
            let changed = self.entities[i].apply_declaration(decl);
            return UpsertOutcome::Updated { changed };
        }

        let entity = SensorEntity::from_declaration(decl, Arc::clone(transport));
        self.index.insert(entity.sensor_id.clone(), self.entities.len());
        self.entities.push(entity);
        UpsertOutcome::Created
    }

    /// Store the alert cycle's averages on an entity.
    ///
    /// These fields are ephemeral and never touched by reconciliation.
    /// Returns `false` when the sensor is unknown.
    pub fn record_light_averages(&mut self, sensor_id: &str, observed: f64, predicted: f64) -> bool {
        match self.index.get(sensor_id) {
            Some(&i) => {
                let entity = &mut self.entities[i];
                entity.current_observed_average = observed;
                entity.predicted_average = predicted;
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
