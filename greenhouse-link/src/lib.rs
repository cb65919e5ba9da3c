//! greenhouse-link - relay, nodes and control panel for a networked greenhouse
//!
//! Sensor/actuator nodes and control panels connect to one relay over TCP and
//! exchange newline-delimited text frames:
//!
//! ```text
//! SENSOR:4:temperature=27.4°C,humidity=80%
//! ACTUATOR:4:1:window=true
//! NODE_ADDED:4
//! NODE_REMOVED:4
//! ```
//!
//! The relay fans node updates out to every other connection and routes
//! actuator commands back to the node they address.
//!
//! ## Modules
//!
//! - [`streaming`]: wire codec, sessions, hub and relay server
//! - [`node`]: simulated nodes and the agent connecting them
//! - [`control`]: control panel cache and observers
//! - [`config`]: TOML configuration shared by the binaries

pub mod config;
pub mod control;
pub mod core;
pub mod error;
pub mod node;
pub mod streaming;
pub mod transport;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, Result};
