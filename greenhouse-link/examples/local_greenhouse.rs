//! Whole greenhouse in one process - 20 second demo
//!
//! Demo sequence:
//! 1. Start a relay on an ephemeral port
//! 2. Connect a control panel
//! 3. Start the default four simulated nodes (1 s sampling)
//! 4. Open every window the panel learns about, then close them again
//! 5. Stop everything
//!
//! ```sh
//! RUST_LOG=info cargo run --example local_greenhouse
//! ```

use greenhouse_link::config::SimulatorConfig;
use greenhouse_link::control::{ControlChannel, ControlLogic};
use greenhouse_link::node::Simulator;
use greenhouse_link::streaming::RelayServer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("=== Local greenhouse demo (20s) ===");

    // === 1. Relay ===
    let running = Arc::new(AtomicBool::new(true));
    let relay = RelayServer::bind("127.0.0.1:0", running)?.spawn()?;
    log::info!("1. Relay listening on {}", relay.local_addr());

    // === 2. Control panel ===
    let logic = Arc::new(ControlLogic::new());
    let sensor_updates = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&sensor_updates);
    logic.on_sensor_data(move |_, _| {
        counter.fetch_add(1, Ordering::Relaxed);
    });
    logic.on_actuator_state_changed(|node, actuator, on| {
        log::info!("   node {} actuator {} -> {}", node, actuator, if on { "ON" } else { "OFF" });
    });
    let mut panel = ControlChannel::open(relay.local_addr(), Arc::clone(&logic))?;
    log::info!("2. Control panel connected");

    // === 3. Nodes ===
    let mut simulator = Simulator::new(SimulatorConfig {
        server_address: relay.local_addr().to_string(),
        sample_interval_ms: 1000,
        ..SimulatorConfig::default()
    })?;
    simulator.start()?;
    log::info!("3. Started nodes {:?}", simulator.node_ids());

    thread::sleep(Duration::from_secs(5));

    // === 4. Windows open, then closed ===
    let windows: Vec<_> = logic
        .nodes()
        .iter()
        .flat_map(|node| {
            node.actuators
                .iter()
                .filter(|(_, a)| a.actuator_type.as_deref() == Some("window"))
                .map(move |(&id, _)| (node.id, id))
        })
        .collect();
    log::info!("4. Opening {} windows", windows.len());
    for &(node, actuator) in &windows {
        logic.request_actuator(node, actuator, true)?;
    }
    thread::sleep(Duration::from_secs(10));

    log::info!("   Closing windows");
    for &(node, actuator) in &windows {
        logic.request_actuator(node, actuator, false)?;
    }
    thread::sleep(Duration::from_secs(5));

    // === 5. Shutdown ===
    log::info!("5. Stopping");
    for node in logic.nodes() {
        let readings: Vec<String> = node.readings.iter().map(ToString::to_string).collect();
        log::info!("   node {}: {}", node.id, readings.join(", "));
    }
    log::info!("   {} sensor updates received", sensor_updates.load(Ordering::Relaxed));

    simulator.stop();
    panel.close();
    relay.shutdown()?;

    log::info!("=== Demo complete ===");
    Ok(())
}
