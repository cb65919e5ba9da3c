//! Builds simulated greenhouse nodes from an inventory

use super::device::{Node, Sensor};
use super::noise::NoiseGenerator;
use crate::config::NodeConfig;
use crate::core::types::NodeId;
use crate::error::{Error, Result};
use std::collections::BTreeSet;

const TEMPERATURE_TYPE: &str = "temperature";
const TEMPERATURE_UNIT: &str = "°C";
const TEMPERATURE_MIN: f64 = 15.0;
const TEMPERATURE_MAX: f64 = 40.0;
const TEMPERATURE_START: f64 = 20.0;
const TEMPERATURE_STEP: f64 = 1.0;

const HUMIDITY_TYPE: &str = "humidity";
const HUMIDITY_UNIT: &str = "%";
const HUMIDITY_MIN: f64 = 50.0;
const HUMIDITY_MAX: f64 = 100.0;
const HUMIDITY_START: f64 = 82.0;
const HUMIDITY_STEP: f64 = 5.0;

/// Spread of start values around the nominal start
const START_JITTER_STDDEV: f64 = 0.5;

pub const WINDOW_TYPE: &str = "window";
pub const FAN_TYPE: &str = "fan";
pub const HEATER_TYPE: &str = "heater";

/// Hands out nodes with unique ids
pub struct NodeFactory {
    noise: NoiseGenerator,
    used_ids: BTreeSet<NodeId>,
    /// Fixed ids still to be claimed; auto-assignment skips them
    reserved: BTreeSet<NodeId>,
    next_id: NodeId,
}

impl NodeFactory {
    /// `seed` only affects sensor start values (0 = random)
    pub fn new(seed: u64) -> Self {
        Self {
            noise: NoiseGenerator::new(seed),
            used_ids: BTreeSet::new(),
            reserved: BTreeSet::new(),
            next_id: 1,
        }
    }

    /// Keep `ids` out of auto-assignment so nodes listed later can claim them
    pub fn reserve(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.reserved.extend(ids);
    }

    /// Create a node from an inventory
    ///
    /// Sensors are ordered temperature first, then humidity. Actuators get
    /// ids 1..n in the order windows, fans, heaters.
    pub fn create_node(&mut self, inventory: &NodeConfig) -> Result<Node> {
        let id = match inventory.id {
            Some(id) => id,
            None => self.next_free_id()?,
        };
        if !self.used_ids.insert(id) {
            return Err(Error::Config(format!("node id {} is already in use", id)));
        }
        self.reserved.remove(&id);

        let mut node = Node::new(id);
        for _ in 0..inventory.temperature {
            node.add_sensor(self.temperature_sensor()?);
        }
        for _ in 0..inventory.humidity {
            node.add_sensor(self.humidity_sensor()?);
        }
        for (count, actuator_type) in [
            (inventory.windows, WINDOW_TYPE),
            (inventory.fans, FAN_TYPE),
            (inventory.heaters, HEATER_TYPE),
        ] {
            for _ in 0..count {
                node.add_actuator(actuator_type);
            }
        }

        log::debug!(
            "Created node {} ({} sensors, {} actuators)",
            id,
            node.sensors().len(),
            node.actuators().len()
        );
        Ok(node)
    }

    pub fn temperature_sensor(&mut self) -> Result<Sensor> {
        Sensor::new(
            TEMPERATURE_TYPE,
            TEMPERATURE_UNIT,
            TEMPERATURE_START + self.noise.gaussian(START_JITTER_STDDEV),
            TEMPERATURE_MIN,
            TEMPERATURE_MAX,
            TEMPERATURE_STEP,
        )
    }

    pub fn humidity_sensor(&mut self) -> Result<Sensor> {
        Sensor::new(
            HUMIDITY_TYPE,
            HUMIDITY_UNIT,
            HUMIDITY_START + self.noise.gaussian(START_JITTER_STDDEV),
            HUMIDITY_MIN,
            HUMIDITY_MAX,
            HUMIDITY_STEP,
        )
    }

    fn next_free_id(&mut self) -> Result<NodeId> {
        while self.used_ids.contains(&self.next_id) || self.reserved.contains(&self.next_id) {
            self.next_id = self
                .next_id
                .checked_add(1)
                .ok_or_else(|| Error::Config("node ids exhausted".to_string()))?;
        }
        Ok(self.next_id)
    }
}
