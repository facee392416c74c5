//! In-process domain events for the LDR service.
//!
//! - [`EventBus`]: publish/subscribe hub backed by `tokio::sync::broadcast`.
//! - [`LdrEvent`]: the event envelope (type name, sensor, JSON payload).
//! - [`EventJournal`]: background subscriber that writes every event to the
//!   structured log.

pub mod bus;
pub mod journal;

pub use bus::{EventBus, LdrEvent};
pub use journal::EventJournal;
