//! Light-leader alerting.
//!
//! Every alert cycle each sensor gets two numbers: the mean light it
//! observed over the last window and the mean light forecast for the next
//! one. The "leader" is the sensor with the highest value. An alert is
//! raised when a sensor beats the previous leader's current value by more
//! than a fixed margin, so small fluctuations do not flap the leader.

use serde::Serialize;

use crate::sensor::SensorEntity;
use crate::types::SensorId;

/// Light units a new leader must exceed the old one by.
pub const DEFAULT_MARGIN: f64 = 10.0;

/// Hours averaged on each side of "now".
pub const ALERT_WINDOW_HOURS: i64 = 4;

/// One sensor's averages for the current cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightReading {
    pub sensor_id: SensorId,
    pub position_name: String,
    pub observed_average: f64,
    pub predicted_average: f64,
}

impl From<&SensorEntity> for LightReading {
    fn from(entity: &SensorEntity) -> Self {
        Self {
            sensor_id: entity.sensor_id.clone(),
            position_name: entity.position.name.clone(),
            observed_average: entity.current_observed_average,
            predicted_average: entity.predicted_average,
        }
    }
}

/// Raised when the observed or predicted leader changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightLeaderAlert {
    pub observed_leader: LightReading,
    pub predicted_leader: LightReading,
}

impl LightLeaderAlert {
    pub fn message(&self) -> String {
        format!(
            "LDR{} ({}) has received the highest amount of light in the last {ALERT_WINDOW_HOURS}h.\n\
             LDR{} ({}) should receive the highest amount of light in the next {ALERT_WINDOW_HOURS}h.",
            self.observed_leader.sensor_id,
            self.observed_leader.position_name,
            self.predicted_leader.sensor_id,
            self.predicted_leader.position_name,
        )
    }
}

/// Remembers the last announced leaders between cycles.
#[derive(Debug, Clone)]
pub struct LightLeaderTracker {
    margin: f64,
    observed_leader: Option<SensorId>,
    predicted_leader: Option<SensorId>,
}

impl Default for LightLeaderTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MARGIN)
    }
}

impl LightLeaderTracker {
    pub fn new(margin: f64) -> Self {
        Self {
            margin,
            observed_leader: None,
            predicted_leader: None,
        }
    }

    pub fn observed_leader(&self) -> Option<&str> {
        self.observed_leader.as_deref()
    }

    pub fn predicted_leader(&self) -> Option<&str> {
        self.predicted_leader.as_deref()
    }

    /// Compare this cycle's readings (in registry order) against the
    /// remembered leaders.
    ///
    /// Before any alert the first reading stands in as leader. The
    /// comparison uses the old leader's value from *this* cycle. Ties go to
    /// the earliest reading.
    pub fn evaluate(&mut self, readings: &[LightReading]) -> Option<LightLeaderAlert> {
        let observed_max = first_max_by(readings, |r| r.observed_average)?;
        let predicted_max = first_max_by(readings, |r| r.predicted_average)?;

        let observed_baseline =
            baseline(readings, self.observed_leader.as_deref(), |r| r.observed_average);
        let predicted_baseline =
            baseline(readings, self.predicted_leader.as_deref(), |r| r.predicted_average);

        let observed_changed = observed_max.observed_average > observed_baseline + self.margin;
        let predicted_changed = predicted_max.predicted_average > predicted_baseline + self.margin;
        if !(observed_changed || predicted_changed) {
            return None;
        }

        self.observed_leader = Some(observed_max.sensor_id.clone());
        self.predicted_leader = Some(predicted_max.sensor_id.clone());
        Some(LightLeaderAlert {
            observed_leader: observed_max.clone(),
            predicted_leader: predicted_max.clone(),
        })
    }
}

fn first_max_by<F>(readings: &[LightReading], value: F) -> Option<&LightReading>
where
    F: Fn(&LightReading) -> f64,
{
    readings.iter().fold(None, |best, r| match best {
        Some(b) if value(r) <= value(b) => Some(b),
        _ => Some(r),
    })
}

fn baseline<F>(readings: &[LightReading], leader: Option<&str>, value: F) -> f64
where
    F: Fn(&LightReading) -> f64,
{
    let current = match leader {
        Some(id) => readings.iter().find(|r| r.sensor_id == id),
        None => readings.first(),
    };
    current.map(value).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(id: &str, observed: f64, predicted: f64) -> LightReading {
        LightReading {
            sensor_id: id.into(),
            position_name: format!("Room {id}"),
            observed_average: observed,
            predicted_average: predicted,
        }
    }

    #[test]
    fn no_readings_no_alert() {
        assert!(LightLeaderTracker::default().evaluate(&[]).is_none());
    }

    #[test]
    fn first_sensor_is_initial_leader() {
        let mut tracker = LightLeaderTracker::default();
        // Sensor 2 is brighter, but not by more than the margin.
        let readings = [reading("1", 100.0, 100.0), reading("2", 109.0, 105.0)];
        assert!(tracker.evaluate(&readings).is_none());
        assert_eq!(tracker.observed_leader(), None);
    }

    #[test]
    fn leader_change_beyond_margin_raises_alert() {
        let mut tracker = LightLeaderTracker::default();
        let readings = [reading("1", 100.0, 100.0), reading("2", 150.0, 90.0)];

        let alert = tracker.evaluate(&readings).unwrap();
        assert_eq!(alert.observed_leader.sensor_id, "2");
        assert_eq!(alert.predicted_leader.sensor_id, "1");
        assert_eq!(tracker.observed_leader(), Some("2"));
        assert!(alert.message().starts_with("LDR2 (Room 2) has received"));
        assert!(alert.message().contains("LDR1 (Room 1) should receive"));
    }

    #[test]
    fn same_leader_does_not_alert_twice() {
        let mut tracker = LightLeaderTracker::default();
        let readings = [reading("1", 100.0, 100.0), reading("2", 150.0, 90.0)];
        assert!(tracker.evaluate(&readings).is_some());
        assert!(tracker.evaluate(&readings).is_none());
    }

    #[test]
    fn ties_go_to_first_in_order() {
        let mut tracker = LightLeaderTracker::default();
        let readings = [
            reading("1", 0.0, 0.0),
            reading("2", 50.0, 50.0),
            reading("3", 50.0, 50.0),
        ];
        let alert = tracker.evaluate(&readings).unwrap();
        assert_eq!(alert.observed_leader.sensor_id, "2");
        assert_eq!(alert.predicted_leader.sensor_id, "2");
    }

    #[test]
    fn baseline_uses_old_leader_current_value() {
        let mut tracker = LightLeaderTracker::default();
        tracker.evaluate(&[reading("1", 0.0, 0.0), reading("2", 50.0, 50.0)]);

        // Old leader "2" dimmed to 20; "1" at 35 beats it by more than 10.
        let alert = tracker
            .evaluate(&[reading("1", 35.0, 0.0), reading("2", 20.0, 50.0)])
            .unwrap();
        assert_eq!(alert.observed_leader.sensor_id, "1");
        assert_eq!(alert.predicted_leader.sensor_id, "2");
    }
}
