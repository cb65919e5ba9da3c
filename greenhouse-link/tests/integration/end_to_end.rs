//! Node agent, relay and control panel working together

use super::harness::{LineClient, start_relay, wait_until};
use greenhouse_link::config::SimulatorConfig;
use greenhouse_link::control::{ControlChannel, ControlLogic};
use greenhouse_link::core::types::SensorReading;
use greenhouse_link::node::{Node, NodeAgent, NoiseGenerator, Sensor, Simulator};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Node 4 with fixed readings: a zero step keeps the values put
fn node_four() -> Node {
    let mut node = Node::new(4);
    node.add_sensor(Sensor::new("temperature", "°C", 27.4, 15.0, 40.0, 0.0).unwrap());
    node.add_sensor(Sensor::new("humidity", "%", 80.0, 50.0, 100.0, 0.0).unwrap());
    node.add_actuator("window");
    node
}

#[test]
fn test_window_command_round_trip() {
    let relay = start_relay();

    let logic = Arc::new(ControlLogic::new());
    let sensor_updates = Arc::new(AtomicUsize::new(0));
    let actuator_events = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&sensor_updates);
    logic.on_sensor_data(move |_, _| {
        s.fetch_add(1, Ordering::SeqCst);
    });
    let a = Arc::clone(&actuator_events);
    logic.on_actuator_state_changed(move |node, actuator, on| a.lock().push((node, actuator, on)));

    let _panel = ControlChannel::open(relay.local_addr(), Arc::clone(&logic)).unwrap();
    let mut observer = LineClient::connect(&relay);
    wait_until("panel and observer", || relay.hub().session_count() == 2);

    let mut agent = NodeAgent::new(node_four(), NoiseGenerator::new(1), Duration::from_secs(60));
    agent.connect(relay.local_addr()).unwrap();

    wait_until("initial actuator state", || {
        logic.node(4).and_then(|n| n.actuator_state(1)).is_some()
    });
    let node = logic.node(4).unwrap();
    assert_eq!(
        node.readings,
        [
            SensorReading::new("temperature", 27.4, "°C"),
            SensorReading::new("humidity", 80.0, "%"),
        ]
    );
    assert_eq!(node.actuator_state(1), Some(false));
    assert_eq!(*actuator_events.lock(), [(4, 1, false)]);

    // Panel switches the window on
    logic.request_actuator(4, 1, true).unwrap();
    assert_eq!(logic.node(4).unwrap().actuator_state(1), Some(true));
    wait_until("node applies command", || agent.actuator_state(1) == Some(true));

    // The node's report passes through the relay
    while observer.recv() != "ACTUATOR:4:1:window=true" {}

    // A later sample is delivered after the report, so the panel has seen it
    let seen = sensor_updates.load(Ordering::SeqCst);
    agent.sample().unwrap();
    wait_until("next sample", || sensor_updates.load(Ordering::SeqCst) > seen);

    assert_eq!(*actuator_events.lock(), [(4, 1, false), (4, 1, true)]);
    assert_eq!(logic.node(4).unwrap().actuator_state(1), Some(true));

    agent.stop();
    wait_until("node removed", || !logic.has_node(4));
}

#[test]
fn test_simulated_greenhouse_reaches_panel() {
    let relay = start_relay();
    let logic = Arc::new(ControlLogic::new());
    let _panel = ControlChannel::open(relay.local_addr(), Arc::clone(&logic)).unwrap();

    let config = SimulatorConfig {
        server_address: relay.local_addr().to_string(),
        sample_interval_ms: 50,
        random_seed: 42,
        ..SimulatorConfig::default()
    };
    let mut simulator = Simulator::new(config).unwrap();
    simulator.start().unwrap();

    wait_until("all nodes reporting", || {
        let nodes = logic.nodes();
        nodes.len() == 4 && nodes.iter().all(|n| !n.readings.is_empty())
    });
    wait_until("actuator states", || {
        logic.node(4).is_some_and(|n| n.actuators.len() == 3)
    });

    let nodes = logic.nodes();
    assert_eq!(nodes.iter().map(|n| n.id).collect::<Vec<_>>(), [1, 2, 3, 4]);
    // Node 3 has sensors only
    assert!(nodes[2].actuators.is_empty());
    assert_eq!(nodes[2].readings.len(), 2);
    for reading in nodes.iter().flat_map(|n| &n.readings) {
        match reading.sensor_type.as_str() {
            "temperature" => assert!((15.0..=40.0).contains(&reading.value)),
            "humidity" => assert!((50.0..=100.0).contains(&reading.value)),
            other => panic!("unexpected sensor {}", other),
        }
    }

    simulator.stop();
    wait_until("nodes removed", || logic.nodes().is_empty());
}

#[test]
fn test_impostor_cannot_claim_node() {
    let relay = start_relay();
    let logic = Arc::new(ControlLogic::new());
    let _panel = ControlChannel::open(relay.local_addr(), Arc::clone(&logic)).unwrap();

    let mut agent = NodeAgent::new(node_four(), NoiseGenerator::new(1), Duration::from_secs(60));
    agent.connect(relay.local_addr()).unwrap();
    wait_until("node 4 known", || logic.node(4).is_some_and(|n| !n.readings.is_empty()));

    let mut impostor = LineClient::connect(&relay);
    impostor.send("SENSOR:4:temperature=99°C");
    impostor.send("NODE_REMOVED:4");
    impostor.send("SENSOR:5:humidity=60%");

    // Lines are handled in order, so once node 5 shows up the rest was refused
    wait_until("impostor node", || logic.has_node(5));
    assert!(logic.has_node(4));
    assert_eq!(logic.node(4).unwrap().readings[0].value, 27.4);
    assert_ne!(relay.hub().owner_of(4), relay.hub().owner_of(5));

    agent.stop();
}
