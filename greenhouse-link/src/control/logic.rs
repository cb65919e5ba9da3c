//! Control panel logic: node cache and observer fan-out
//!
//! [`ControlLogic`] keeps what the panel knows about each node, built only
//! from relayed events, and tells registered observers about changes.
//! Observers are typed callbacks per event kind. They run on the thread
//! that delivered the event, after every internal lock has been released,
//! so an observer may call back into the logic (e.g. [`ControlLogic::request_actuator`]).
//!
//! Actuator reconciliation is idempotent: a report that matches the cache
//! produces no notification. This is what makes the optimistic update in
//! `request_actuator` and the node's later confirmation a single change.

use crate::core::types::{ActuatorId, ActuatorSummary, NodeId, NodeSummary, SensorReading};
use crate::error::{Error, Result};
use crate::streaming::messages::Message;
use crate::streaming::session::Session;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outbound path from the control logic toward the relay
pub trait CommunicationChannel: Send + Sync {
    fn send_message(&self, msg: &Message) -> Result<()>;
}

impl CommunicationChannel for Session {
    fn send_message(&self, msg: &Message) -> Result<()> {
        self.send(msg)
    }
}

type NodeObserver = Arc<dyn Fn(NodeId) + Send + Sync>;
type SensorObserver = Arc<dyn Fn(NodeId, &[SensorReading]) + Send + Sync>;
type ActuatorObserver = Arc<dyn Fn(NodeId, ActuatorId, bool) + Send + Sync>;
type ClosedObserver = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Observers {
    node_added: Vec<NodeObserver>,
    node_removed: Vec<NodeObserver>,
    sensor_data: Vec<SensorObserver>,
    actuator_changed: Vec<ActuatorObserver>,
    channel_closed: Vec<ClosedObserver>,
}

/// Control panel state and event dispatch
#[derive(Default)]
pub struct ControlLogic {
    nodes: Mutex<BTreeMap<NodeId, NodeSummary>>,
    observers: Mutex<Observers>,
    channel: Mutex<Option<Arc<dyn CommunicationChannel>>>,
}

impl ControlLogic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_channel(&self, channel: Arc<dyn CommunicationChannel>) {
        *self.channel.lock() = Some(channel);
    }

    pub fn on_node_added<F>(&self, f: F)
    where
        F: Fn(NodeId) + Send + Sync + 'static,
    {
        self.observers.lock().node_added.push(Arc::new(f));
    }

    pub fn on_node_removed<F>(&self, f: F)
    where
        F: Fn(NodeId) + Send + Sync + 'static,
    {
        self.observers.lock().node_removed.push(Arc::new(f));
    }

    pub fn on_sensor_data<F>(&self, f: F)
    where
        F: Fn(NodeId, &[SensorReading]) + Send + Sync + 'static,
    {
        self.observers.lock().sensor_data.push(Arc::new(f));
    }

    pub fn on_actuator_state_changed<F>(&self, f: F)
    where
        F: Fn(NodeId, ActuatorId, bool) + Send + Sync + 'static,
    {
        self.observers.lock().actuator_changed.push(Arc::new(f));
    }

    pub fn on_channel_closed<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.observers.lock().channel_closed.push(Arc::new(f));
    }

    pub fn has_node(&self, node_id: NodeId) -> bool {
        self.nodes.lock().contains_key(&node_id)
    }

    /// Snapshot of one node
    pub fn node(&self, node_id: NodeId) -> Option<NodeSummary> {
        self.nodes.lock().get(&node_id).cloned()
    }

    /// Snapshot of every known node, ordered by id
    pub fn nodes(&self) -> Vec<NodeSummary> {
        self.nodes.lock().values().cloned().collect()
    }

    /// Apply one relayed event to the cache and notify observers
    pub fn handle_message(&self, msg: Message) {
        match msg {
            Message::NodeAdded { node_id } => {
                if self.ensure_node(node_id) {
                    self.notify_node_added(node_id);
                }
            }
            Message::NodeRemoved { node_id } => {
                if self.nodes.lock().remove(&node_id).is_some() {
                    log::info!("Node {} removed", node_id);
                    let observers = self.observers.lock().node_removed.clone();
                    for observer in observers {
                        observer(node_id);
                    }
                }
            }
            Message::SensorUpdate { node_id, readings } => {
                let created = {
                    let mut nodes = self.nodes.lock();
                    let created = !nodes.contains_key(&node_id);
                    nodes.entry(node_id).or_insert_with(|| NodeSummary::new(node_id)).readings =
                        readings.clone();
                    created
                };
                if created {
                    self.notify_node_added(node_id);
                }
                let observers = self.observers.lock().sensor_data.clone();
                for observer in observers {
                    observer(node_id, &readings);
                }
            }
            Message::ActuatorUpdate { node_id, actuators } => {
                let (created, changes) = {
                    let mut nodes = self.nodes.lock();
                    let created = !nodes.contains_key(&node_id);
                    let node = nodes.entry(node_id).or_insert_with(|| NodeSummary::new(node_id));

                    let mut changes = Vec::new();
                    for state in actuators {
                        let Some(actuator_id) = state.actuator_id else {
                            log::warn!(
                                "Node {}: skipping actuator entry without id ({:?})",
                                node_id,
                                state.actuator_type
                            );
                            continue;
                        };
                        if reconcile(node, actuator_id, state.actuator_type, state.is_on) {
                            changes.push((actuator_id, state.is_on));
                        }
                    }
                    (created, changes)
                };

                if created {
                    self.notify_node_added(node_id);
                }
                for (actuator_id, is_on) in changes {
                    self.notify_actuator_changed(node_id, actuator_id, is_on);
                }
            }
        }
    }

    /// Ask a node to switch an actuator
    ///
    /// The cache is updated and observers notified before the command is
    /// sent. A failed send is logged and returned; the cached state is not
    /// rolled back.
    pub fn request_actuator(&self, node_id: NodeId, actuator_id: ActuatorId, on: bool) -> Result<()> {
        let (actuator_type, changed) = {
            let mut nodes = self.nodes.lock();
            match nodes.get_mut(&node_id) {
                Some(node) => {
                    let known_type = node
                        .actuators
                        .get(&actuator_id)
                        .and_then(|a| a.actuator_type.clone());
                    let changed = reconcile(node, actuator_id, None, on);
                    (known_type, changed)
                }
                None => (None, false),
            }
        };
        if changed {
            self.notify_actuator_changed(node_id, actuator_id, on);
        }

        let msg = Message::actuator_command(node_id, actuator_id, actuator_type.as_deref(), on);
        let channel = self.channel.lock().clone();
        let result = match channel {
            Some(channel) => channel.send_message(&msg),
            None => Err(Error::Closed),
        };
        if let Err(e) = &result {
            log::warn!(
                "Cannot send command for node {} actuator {}: {}",
                node_id,
                actuator_id,
                e
            );
        }
        result
    }

    /// The link to the relay is gone
    pub fn channel_closed(&self) {
        self.channel.lock().take();
        log::info!("Communication channel closed");
        let observers = self.observers.lock().channel_closed.clone();
        for observer in observers {
            observer();
        }
    }

    /// Insert an empty entry; `true` if the node was new
    fn ensure_node(&self, node_id: NodeId) -> bool {
        let mut nodes = self.nodes.lock();
        if nodes.contains_key(&node_id) {
            return false;
        }
        nodes.insert(node_id, NodeSummary::new(node_id));
        true
    }

    fn notify_node_added(&self, node_id: NodeId) {
        log::info!("Node {} added", node_id);
        let observers = self.observers.lock().node_added.clone();
        for observer in observers {
            observer(node_id);
        }
    }

    fn notify_actuator_changed(&self, node_id: NodeId, actuator_id: ActuatorId, is_on: bool) {
        let observers = self.observers.lock().actuator_changed.clone();
        for observer in observers {
            observer(node_id, actuator_id, is_on);
        }
    }
}

/// Merge one actuator state into the cache; `true` if the state is new or changed
fn reconcile(
    node: &mut NodeSummary,
    actuator_id: ActuatorId,
    actuator_type: Option<String>,
    is_on: bool,
) -> bool {
    match node.actuators.get_mut(&actuator_id) {
        Some(cached) => {
            if actuator_type.is_some() {
                cached.actuator_type = actuator_type;
            }
            let changed = cached.is_on != is_on;
            cached.is_on = is_on;
            changed
        }
        None => {
            node.actuators.insert(
                actuator_id,
                ActuatorSummary {
                    actuator_type,
                    is_on,
                },
            );
            true
        }
    }
}
