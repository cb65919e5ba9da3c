//! Fan-out and routing through a running relay

use super::harness::{LineClient, start_relay, wait_until};

#[test]
fn test_broadcast_excludes_origin() {
    let relay = start_relay();
    let mut a = LineClient::connect(&relay);
    let mut b = LineClient::connect(&relay);
    let mut c = LineClient::connect(&relay);
    wait_until("three sessions", || relay.hub().session_count() == 3);

    a.send("SENSOR:1:temperature=-3.5°C,light=1200lux");

    for peer in [&mut b, &mut c] {
        assert_eq!(peer.recv(), "NODE_ADDED:1");
        assert_eq!(peer.recv(), "SENSOR:1:temperature=-3.5°C,light=1200lux");
    }
    a.expect_silence();
}

#[test]
fn test_malformed_lines_do_not_break_the_session() {
    let relay = start_relay();
    let mut node = LineClient::connect(&relay);
    let mut panel = LineClient::connect(&relay);
    wait_until("two sessions", || relay.hub().session_count() == 2);

    node.send("GARBAGE");
    node.send("SENSOR:x:temperature=20°C");
    node.send("SENSOR:2:temperature=abc°C,humidity=80%,=5,light=300lux");

    assert_eq!(panel.recv(), "NODE_ADDED:2");
    assert_eq!(panel.recv(), "SENSOR:2:humidity=80%,light=300lux");
}

#[test]
fn test_command_routed_to_owner_only() {
    let relay = start_relay();
    let mut node = LineClient::connect(&relay);
    let mut panel = LineClient::connect(&relay);
    let mut bystander = LineClient::connect(&relay);
    wait_until("three sessions", || relay.hub().session_count() == 3);

    node.send("NODE_ADDED:4");
    assert_eq!(panel.recv(), "NODE_ADDED:4");
    assert_eq!(bystander.recv(), "NODE_ADDED:4");

    panel.send("ACTUATOR:99:1:true");
    panel.send("ACTUATOR:4:1:true");
    assert_eq!(node.recv(), "ACTUATOR:4:1:true");
    bystander.expect_silence();
}

#[test]
fn test_disconnect_announces_removal_and_late_joiner_replay() {
    let relay = start_relay();
    let mut node = LineClient::connect(&relay);
    let mut panel = LineClient::connect(&relay);
    wait_until("two sessions", || relay.hub().session_count() == 2);

    node.send("NODE_ADDED:3");
    assert_eq!(panel.recv(), "NODE_ADDED:3");

    let mut late = LineClient::connect(&relay);
    assert_eq!(late.recv(), "NODE_ADDED:3");

    drop(node);
    assert_eq!(panel.recv(), "NODE_REMOVED:3");
    assert_eq!(late.recv(), "NODE_REMOVED:3");
    wait_until("node session gone", || relay.hub().session_count() == 2);
    assert_eq!(relay.hub().owner_of(3), None);
}

#[test]
fn test_shutdown_closes_clients() {
    let relay = start_relay();
    let mut client = LineClient::connect(&relay);
    wait_until("one session", || relay.hub().session_count() == 1);

    relay.shutdown().unwrap();

    assert!(client.at_eof());
}
