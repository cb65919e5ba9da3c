//! Integration tests for greenhouse-link over real loopback sockets
//!
//! Every test starts its own relay on an ephemeral port.
//!
//! ```bash
//! cargo test --test integration -- --nocapture
//! ```

mod end_to_end;
mod fan_out;
mod harness;
mod hub_concurrency;
