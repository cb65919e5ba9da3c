//! Core abstractions shared across the crate.
//!
//! - [`types`]: Readings, actuator entries and node summaries

pub mod types;
