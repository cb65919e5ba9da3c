//! greenhouse-nodes - simulated greenhouse nodes streaming to a relay
//!
//! Usage: `greenhouse-nodes [<config.toml> | --config <path> | -c <path>]`

use greenhouse_link::config;
use greenhouse_link::error::{Error, Result};
use greenhouse_link::node::Simulator;
use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    let config = config::load_from_args(env::args().skip(1))?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("greenhouse-nodes v{} starting...", env!("CARGO_PKG_VERSION"));

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);

    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let mut simulator = Simulator::new(config.simulator)?;
    simulator.start()?;

    while running.load(Ordering::Relaxed) {
        if simulator.running_count() == 0 {
            log::warn!("All nodes disconnected from the relay");
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    simulator.stop();
    log::info!("Simulator stopped");
    Ok(())
}
