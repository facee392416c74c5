//! Domain logic for the LDR light monitoring service.
//!
//! Everything in this crate is pure: no database access, no network and no
//! task spawning. The daemon crate wires these pieces to stores, timers and
//! publishers.

pub mod alert;
pub mod cleaning;
pub mod config;
pub mod error;
pub mod event_names;
pub mod forecast;
pub mod holidays;
pub mod registry;
pub mod schedule;
pub mod sensor;
pub mod types;
