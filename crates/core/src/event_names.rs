//! Well-known event type constants.
//!
//! These are the `event_type` values carried by events on the in-process
//! bus. Subscribers match on them, so they must stay stable.

/// A sensor declaration was seen for the first time and an entity created.
pub const SENSOR_CREATED: &str = "sensor.created";

/// An existing sensor's mutable fields changed during reconciliation.
pub const SENSOR_UPDATED: &str = "sensor.updated";

/// A reconciliation pass could not load configuration and was aborted.
pub const CONFIG_RELOAD_FAILED: &str = "config.reload_failed";

/// A forecast was produced and handed to the forecast store.
pub const FORECAST_STORED: &str = "forecast.stored";

/// A sensor's forecast cycle failed (model fit error or timeout).
pub const FORECAST_FAILED: &str = "forecast.failed";

/// The sensor receiving the most light (observed or predicted) changed.
pub const LIGHT_LEADER_CHANGED: &str = "alert.light_leader_changed";
