//! LDR light monitoring daemon.
//!
//! Library half of the `ldr-daemon` binary. Each module owns one long-lived
//! concern and exposes a `run(..., cancel)` entry point plus the one-shot
//! operation it repeats, so tests can drive a single pass directly.
//!
//! - [`reconcile`]: keeps the sensor registry in step with the config files.
//! - [`forecasting`]: per-sensor forecasts, fanned out and joined per cycle.
//! - [`alerting`]: light-leader detection every alert slot.
//! - [`supervisor`] / [`announcer`]: per-sensor announcement tasks.
//! - [`watcher`]: triggers a reconciliation pass when a config file changes.
//! - [`holiday_cache`]: the current holiday set, refreshed at midnight.
//! - [`ingest`]: entry point for device readings.

pub mod alerting;
pub mod announcer;
pub mod config_source;
pub mod forecasting;
pub mod holiday_cache;
pub mod ingest;
pub mod reconcile;
pub mod settings;
pub mod state;
pub mod supervisor;
pub mod watcher;
