//! Core data types shared by the codec, nodes and control logic.
//!
//! - [`SensorReading`]: one measured value with its unit
//! - [`ActuatorState`]: one actuator entry as it appears on the wire
//! - [`NodeSummary`]: what a control panel knows about a node

use std::collections::BTreeMap;
use std::fmt;

/// Node identifier, unique across the relay
pub type NodeId = u32;

/// Actuator identifier, unique within its node
pub type ActuatorId = u32;

/// Immutable sensor reading: `{type, value, unit}`
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub sensor_type: String,
    pub value: f64,
    pub unit: String,
}

impl SensorReading {
    pub fn new(sensor_type: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            sensor_type: sensor_type.into(),
            value,
            unit: unit.into(),
        }
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}{}", self.sensor_type, self.value, self.unit)
    }
}

/// Actuator entry of an `ACTUATOR` frame
///
/// Nodes report `id:type=bool`. Control panels may command with `id:bool`
/// when the type is unknown, and legacy nodes emit the flat `type=bool` form.
/// At least one of `actuator_id` / `actuator_type` is always set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorState {
    pub actuator_id: Option<ActuatorId>,
    pub actuator_type: Option<String>,
    pub is_on: bool,
}

impl ActuatorState {
    /// Full `id:type=bool` entry
    pub fn new(actuator_id: ActuatorId, actuator_type: impl Into<String>, is_on: bool) -> Self {
        Self {
            actuator_id: Some(actuator_id),
            actuator_type: Some(actuator_type.into()),
            is_on,
        }
    }

    /// Command entry without a type: `id:bool`
    pub fn command(actuator_id: ActuatorId, is_on: bool) -> Self {
        Self {
            actuator_id: Some(actuator_id),
            actuator_type: None,
            is_on,
        }
    }

    /// Flat entry without an id: `type=bool`
    pub fn flat(actuator_type: impl Into<String>, is_on: bool) -> Self {
        Self {
            actuator_id: None,
            actuator_type: Some(actuator_type.into()),
            is_on,
        }
    }
}

/// Cached view of one actuator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorSummary {
    pub actuator_type: Option<String>,
    pub is_on: bool,
}

/// Control-side view of a node, built only from relayed events
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeSummary {
    pub id: NodeId,
    /// Readings from the latest `SENSOR` frame
    pub readings: Vec<SensorReading>,
    pub actuators: BTreeMap<ActuatorId, ActuatorSummary>,
}

impl NodeSummary {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Cached state of an actuator, if it has been reported
    pub fn actuator_state(&self, actuator_id: ActuatorId) -> Option<bool> {
        self.actuators.get(&actuator_id).map(|a| a.is_on)
    }
}
