//! Message types carried over the relay.
//!
//! Every frame on the wire maps to exactly one [`Message`]. Components other
//! than the codec in [`super::wire`] only ever see these typed values.

use crate::core::types::{ActuatorState, NodeId, SensorReading};

/// Frame tag for sensor readings
pub const SENSOR_TAG: &str = "SENSOR";
/// Frame tag for actuator states and commands
pub const ACTUATOR_TAG: &str = "ACTUATOR";
/// Frame tag announcing a node
pub const NODE_ADDED_TAG: &str = "NODE_ADDED";
/// Frame tag retiring a node
pub const NODE_REMOVED_TAG: &str = "NODE_REMOVED";

/// Top-level relay message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Full sensor set of a node, in sensor order
    ///
    /// `SENSOR:<nodeId>:<type>=<value><unit>,...`
    SensorUpdate {
        node_id: NodeId,
        readings: Vec<SensorReading>,
    },

    /// Actuator states reported by a node, or a command addressed to one
    ///
    /// `ACTUATOR:<nodeId>:<actuatorId>:<type>=<bool>,...`
    ActuatorUpdate {
        node_id: NodeId,
        actuators: Vec<ActuatorState>,
    },

    /// A node became reachable through the relay
    NodeAdded { node_id: NodeId },

    /// A node left the relay
    NodeRemoved { node_id: NodeId },
}

impl Message {
    /// Node this message is about
    pub fn node_id(&self) -> NodeId {
        match self {
            Message::SensorUpdate { node_id, .. }
            | Message::ActuatorUpdate { node_id, .. }
            | Message::NodeAdded { node_id }
            | Message::NodeRemoved { node_id } => *node_id,
        }
    }

    /// Wire tag of this message kind
    pub fn tag(&self) -> &'static str {
        match self {
            Message::SensorUpdate { .. } => SENSOR_TAG,
            Message::ActuatorUpdate { .. } => ACTUATOR_TAG,
            Message::NodeAdded { .. } => NODE_ADDED_TAG,
            Message::NodeRemoved { .. } => NODE_REMOVED_TAG,
        }
    }

    /// Single actuator command as sent by a control panel
    pub fn actuator_command(
        node_id: NodeId,
        actuator_id: u32,
        actuator_type: Option<&str>,
        is_on: bool,
    ) -> Self {
        let state = match actuator_type {
            Some(t) => ActuatorState::new(actuator_id, t, is_on),
            None => ActuatorState::command(actuator_id, is_on),
        };
        Message::ActuatorUpdate {
            node_id,
            actuators: vec![state],
        }
    }
}
