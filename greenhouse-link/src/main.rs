//! greenhouse-relay - line-protocol relay for greenhouse nodes and control panels
//!
//! Nodes and control panels connect over TCP (default port 12345). Updates
//! from a node are fanned out to every other connection; actuator commands
//! are routed to the node they address.
//!
//! Usage: `greenhouse-relay [<config.toml> | --config <path> | -c <path>]`

use greenhouse_link::config;
use greenhouse_link::error::{Error, Result};
use greenhouse_link::streaming::RelayServer;
use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn main() -> Result<()> {
    let config = config::load_from_args(env::args().skip(1))?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("greenhouse-relay v{} starting...", env!("CARGO_PKG_VERSION"));

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);

    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let server = RelayServer::bind(&config.relay.bind_address, running)?;
    log::info!("Relay running. Press Ctrl-C to stop.");

    server.run()?;

    log::info!("Relay stopped");
    Ok(())
}
