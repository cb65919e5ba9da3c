//! Simulated sensors and actuators of a greenhouse node

use super::noise::NoiseGenerator;
use crate::core::types::{ActuatorId, ActuatorState, NodeId, SensorReading};
use crate::error::{Error, Result};
use crate::streaming::messages::Message;

/// Round to the two decimals nodes report with
pub fn round_reading(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sensor with a bounded random-walk noise model
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    sensor_type: String,
    unit: String,
    value: f64,
    min: f64,
    max: f64,
    /// Largest change applied by one [`Sensor::perturb`]
    step: f64,
}

impl Sensor {
    /// Create a sensor; the start value is clamped into `[min, max]`
    ///
    /// Bounds must be finite with `min <= max` and `step` must be a
    /// finite non-negative number.
    pub fn new(
        sensor_type: impl Into<String>,
        unit: impl Into<String>,
        value: f64,
        min: f64,
        max: f64,
        step: f64,
    ) -> Result<Self> {
        let sensor_type = sensor_type.into();
        if !(min.is_finite() && max.is_finite() && value.is_finite()) || min > max {
            return Err(Error::Config(format!(
                "sensor {}: invalid range {}..{} (start {})",
                sensor_type, min, max, value
            )));
        }
        if !step.is_finite() || step < 0.0 {
            return Err(Error::Config(format!(
                "sensor {}: invalid step {}",
                sensor_type, step
            )));
        }
        Ok(Self {
            sensor_type,
            unit: unit.into(),
            value: round_reading(value.clamp(min, max)),
            min,
            max,
            step,
        })
    }

    pub fn sensor_type(&self) -> &str {
        &self.sensor_type
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Apply one random step, staying inside the bounds
    pub fn perturb(&mut self, noise: &mut NoiseGenerator) {
        let next = self.value + noise.step(self.step);
        self.value = round_reading(next.clamp(self.min, self.max));
    }

    pub fn reading(&self) -> SensorReading {
        SensorReading::new(self.sensor_type.clone(), self.value, self.unit.clone())
    }
}

/// Switchable actuator (window, fan, heater, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actuator {
    id: ActuatorId,
    actuator_type: String,
    node_id: NodeId,
    is_on: bool,
}

impl Actuator {
    pub fn new(id: ActuatorId, actuator_type: impl Into<String>, node_id: NodeId) -> Self {
        Self {
            id,
            actuator_type: actuator_type.into(),
            node_id,
            is_on: false,
        }
    }

    pub fn id(&self) -> ActuatorId {
        self.id
    }

    pub fn actuator_type(&self) -> &str {
        &self.actuator_type
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Set the state; returns whether it changed
    pub fn set(&mut self, on: bool) -> bool {
        let changed = self.is_on != on;
        self.is_on = on;
        changed
    }

    pub fn state(&self) -> ActuatorState {
        ActuatorState::new(self.id, self.actuator_type.clone(), self.is_on)
    }
}

/// A node's sensors, in reporting order, and its actuators
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    sensors: Vec<Sensor>,
    actuators: Vec<Actuator>,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            sensors: Vec::new(),
            actuators: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn actuators(&self) -> &[Actuator] {
        &self.actuators
    }

    pub fn add_sensor(&mut self, sensor: Sensor) {
        self.sensors.push(sensor);
    }

    /// Add an actuator with the next free id (1, 2, ...)
    pub fn add_actuator(&mut self, actuator_type: impl Into<String>) -> ActuatorId {
        let id = self.actuators.iter().map(Actuator::id).max().unwrap_or(0) + 1;
        self.actuators.push(Actuator::new(id, actuator_type, self.id));
        id
    }

    pub fn actuator(&self, id: ActuatorId) -> Option<&Actuator> {
        self.actuators.iter().find(|a| a.id == id)
    }

    /// Perturb every sensor and return the resulting `SENSOR` message
    ///
    /// `None` when the node has no sensors.
    pub fn sample(&mut self, noise: &mut NoiseGenerator) -> Option<Message> {
        if self.sensors.is_empty() {
            return None;
        }
        for sensor in &mut self.sensors {
            sensor.perturb(noise);
        }
        Some(Message::SensorUpdate {
            node_id: self.id,
            readings: self.sensors.iter().map(Sensor::reading).collect(),
        })
    }

    /// Current actuator states as an `ACTUATOR` message
    ///
    /// `None` when the node has no actuators.
    pub fn actuator_report(&self) -> Option<Message> {
        if self.actuators.is_empty() {
            return None;
        }
        Some(Message::ActuatorUpdate {
            node_id: self.id,
            actuators: self.actuators.iter().map(Actuator::state).collect(),
        })
    }

    /// Apply command entries addressed to this node
    ///
    /// Entries without an actuator id and unknown ids are logged and
    /// skipped. Returns the number of actuators whose state changed.
    pub fn apply_commands(&mut self, commands: &[ActuatorState]) -> usize {
        let mut changed = 0;
        for command in commands {
            let Some(actuator_id) = command.actuator_id else {
                log::warn!(
                    "Node {}: ignoring command without actuator id ({:?})",
                    self.id,
                    command.actuator_type
                );
                continue;
            };
            match self.actuators.iter_mut().find(|a| a.id == actuator_id) {
                Some(actuator) => {
                    if actuator.set(command.is_on) {
                        log::info!(
                            "Node {}: {} {} turned {}",
                            self.id,
                            actuator.actuator_type,
                            actuator_id,
                            if command.is_on { "ON" } else { "OFF" }
                        );
                        changed += 1;
                    }
                }
                None => {
                    log::warn!("Node {}: no actuator with id {}", self.id, actuator_id);
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn greenhouse_node() -> Node {
        let mut node = Node::new(4);
        node.add_sensor(Sensor::new("temperature", "°C", 27.4, 15.0, 40.0, 1.0).unwrap());
        node.add_sensor(Sensor::new("humidity", "%", 80.0, 50.0, 100.0, 5.0).unwrap());
        node.add_actuator("window");
        node.add_actuator("fan");
        node
    }

    #[test]
    fn test_start_value_clamped_and_rounded() {
        let sensor = Sensor::new("temperature", "°C", 52.345, 15.0, 40.0, 1.0).unwrap();
        assert_relative_eq!(sensor.value(), 40.0);

        let sensor = Sensor::new("humidity", "%", 81.23456, 50.0, 100.0, 5.0).unwrap();
        assert_relative_eq!(sensor.value(), 81.23);
    }

    #[test]
    fn test_perturb_stays_in_bounds() {
        let mut noise = NoiseGenerator::new(42);
        let mut sensor = Sensor::new("humidity", "%", 98.0, 50.0, 100.0, 5.0).unwrap();

        for _ in 0..1000 {
            let before = sensor.value();
            sensor.perturb(&mut noise);
            assert!((50.0..=100.0).contains(&sensor.value()));
            assert!((sensor.value() - before).abs() <= 5.0 + 0.01);
            assert_relative_eq!(sensor.value(), round_reading(sensor.value()));
        }
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        assert!(Sensor::new("temperature", "°C", 20.0, 40.0, 15.0, 1.0).is_err());
        assert!(Sensor::new("temperature", "°C", 20.0, f64::NAN, 40.0, 1.0).is_err());
        assert!(Sensor::new("temperature", "°C", 20.0, 15.0, f64::INFINITY, 1.0).is_err());
        assert!(Sensor::new("temperature", "°C", f64::NAN, 15.0, 40.0, 1.0).is_err());
        assert!(Sensor::new("temperature", "°C", 20.0, 15.0, 40.0, -1.0).is_err());
        assert!(Sensor::new("temperature", "°C", 20.0, 15.0, 40.0, f64::NAN).is_err());

        let mut noise = NoiseGenerator::new(3);
        let mut pinned = Sensor::new("humidity", "%", 70.0, 70.0, 70.0, 0.0).unwrap();
        pinned.perturb(&mut noise);
        assert_relative_eq!(pinned.value(), 70.0);
    }

    #[test]
    fn test_actuator_ids_follow_creation_order() {
        let node = greenhouse_node();
        let ids: Vec<_> = node.actuators().iter().map(|a| (a.id(), a.actuator_type())).collect();
        assert_eq!(ids, [(1, "window"), (2, "fan")]);
        assert!(node.actuators().iter().all(|a| a.node_id() == 4 && !a.is_on()));
    }

    #[test]
    fn test_sample_reports_sensor_order() {
        let mut node = greenhouse_node();
        let mut noise = NoiseGenerator::new(1);

        let Some(Message::SensorUpdate { node_id, readings }) = node.sample(&mut noise) else {
            panic!("expected a sensor update");
        };
        assert_eq!(node_id, 4);
        let types: Vec<_> = readings.iter().map(|r| r.sensor_type.as_str()).collect();
        assert_eq!(types, ["temperature", "humidity"]);
        assert_eq!(readings[0].unit, "°C");
    }

    #[test]
    fn test_empty_node_reports_nothing() {
        let mut node = Node::new(9);
        assert_eq!(node.sample(&mut NoiseGenerator::new(1)), None);
        assert_eq!(node.actuator_report(), None);
    }

    #[test]
    fn test_apply_commands() {
        let mut node = greenhouse_node();
        let commands = [
            ActuatorState::command(1, true),
            ActuatorState::new(2, "fan", false),
            ActuatorState::command(7, true),
            ActuatorState::flat("heater", true),
        ];

        assert_eq!(node.apply_commands(&commands), 1);
        assert_eq!(node.actuator(1).map(Actuator::is_on), Some(true));
        assert_eq!(node.actuator(2).map(Actuator::is_on), Some(false));

        // Same command again changes nothing
        assert_eq!(node.apply_commands(&commands[..1]), 0);

        assert_eq!(
            node.actuator_report(),
            Some(Message::ActuatorUpdate {
                node_id: 4,
                actuators: vec![
                    ActuatorState::new(1, "window", true),
                    ActuatorState::new(2, "fan", false),
                ],
            })
        );
    }
}
