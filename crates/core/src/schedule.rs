//! Wall-clock slot detection for periodic jobs.
//!
//! Jobs poll [`SlotGate::should_fire`] with the current local time; the gate
//! answers `true` once for every slot whose minute-of-day is a multiple of
//! the period, no matter how often it is polled within that minute.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotGate {
    period_minutes: u32,
    last_fired: Option<(NaiveDate, u32)>,
}

impl SlotGate {
    /// Slots every `period_minutes`, aligned to local midnight.
    ///
    /// The period is clamped to `1..=1440`.
    pub fn every_minutes(period_minutes: u32) -> Self {
        Self {
            period_minutes: period_minutes.clamp(1, MINUTES_PER_DAY),
            last_fired: None,
        }
    }

    pub fn every_hours(hours: u32) -> Self {
        Self::every_minutes(hours.saturating_mul(60))
    }

    pub fn period_minutes(&self) -> u32 {
        self.period_minutes
    }

    /// Whether `now` is inside a slot that has not fired yet. Marks the
    /// slot as fired when it returns `true`.
    pub fn should_fire(&mut self, now: NaiveDateTime) -> bool {
        let minute_of_day = now.hour() * 60 + now.minute();
        if minute_of_day % self.period_minutes != 0 {
            return false;
        }
        let slot = (now.date(), minute_of_day);
        if self.last_fired == Some(slot) {
            return false;
        }
        self.last_fired = Some(slot);
        true
    }
}
