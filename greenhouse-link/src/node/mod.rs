//! Simulated greenhouse nodes
//!
//! - [`device`]: sensors, actuators and the node that owns them
//! - [`agent`]: connects one node to the relay
//! - [`factory`] / [`simulator`]: build and run a whole greenhouse

pub mod agent;
pub mod device;
pub mod factory;
pub mod noise;
pub mod simulator;

pub use agent::{AgentState, NodeAgent};
pub use device::{Actuator, Node, Sensor};
pub use factory::NodeFactory;
pub use noise::NoiseGenerator;
pub use simulator::Simulator;
