//! control-panel - headless greenhouse control panel
//!
//! Prints every node event relayed to it. Actuators are switched by typing
//! `<node> <actuator> on|off` on stdin.
//!
//! Usage: `control-panel [<config.toml> | --config <path> | -c <path>]`

use greenhouse_link::config;
use greenhouse_link::control::{ControlChannel, ControlLogic};
use greenhouse_link::core::types::{ActuatorId, NodeId};
use greenhouse_link::error::{Error, Result};
use std::env;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Parse `<node> <actuator> on|off`
fn parse_command(line: &str) -> Option<(NodeId, ActuatorId, bool)> {
    let mut parts = line.split_whitespace();
    let node = parts.next()?.parse().ok()?;
    let actuator = parts.next()?.parse().ok()?;
    let on = match parts.next()?.to_ascii_lowercase().as_str() {
        "on" | "true" => true,
        "off" | "false" => false,
        _ => return None,
    };
    parts.next().is_none().then_some((node, actuator, on))
}

fn register_printers(logic: &ControlLogic) {
    logic.on_node_added(|id| println!("+ node {}", id));
    logic.on_node_removed(|id| println!("- node {}", id));
    logic.on_sensor_data(|id, readings| {
        let values: Vec<String> = readings.iter().map(ToString::to_string).collect();
        println!("  node {}: {}", id, values.join(", "));
    });
    logic.on_actuator_state_changed(|id, actuator, on| {
        println!("  node {} actuator {}: {}", id, actuator, if on { "ON" } else { "OFF" });
    });
}

fn main() -> Result<()> {
    let config = config::load_from_args(env::args().skip(1))?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);

    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let logic = Arc::new(ControlLogic::new());
    register_printers(&logic);
    let r = Arc::clone(&running);
    logic.on_channel_closed(move || {
        println!("relay connection closed");
        r.store(false, Ordering::Relaxed);
    });

    let mut channel = ControlChannel::open(config.control_panel.server_address.as_str(), Arc::clone(&logic))?;

    // Blocking stdin reads; the thread is left behind at exit
    let commands = Arc::clone(&logic);
    thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Some((node, actuator, on)) => {
                        // Failures are logged by the logic
                        let _ = commands.request_actuator(node, actuator, on);
                    }
                    None => eprintln!("usage: <node> <actuator> on|off"),
                }
            }
        })?;

    while running.load(Ordering::Relaxed) {
        thread::sleep(POLL_INTERVAL);
    }

    channel.close();
    log::info!("Control panel stopped");
    Ok(())
}
