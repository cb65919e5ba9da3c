//! Runs a set of simulated nodes against a relay

use super::agent::{AgentState, NodeAgent};
use super::factory::NodeFactory;
use super::noise::NoiseGenerator;
use crate::config::SimulatorConfig;
use crate::core::types::NodeId;
use crate::error::Result;
use std::time::Duration;

/// Greenhouse simulator: one [`NodeAgent`] per configured node
pub struct Simulator {
    config: SimulatorConfig,
    agents: Vec<NodeAgent>,
}

impl Simulator {
    /// Build all configured nodes; nothing connects until [`Simulator::start`]
    pub fn new(config: SimulatorConfig) -> Result<Self> {
        let mut factory = NodeFactory::new(config.random_seed);
        factory.reserve(config.nodes.iter().filter_map(|n| n.id));
        let interval = Duration::from_millis(config.sample_interval_ms);

        let mut agents = Vec::with_capacity(config.nodes.len());
        for inventory in &config.nodes {
            let node = factory.create_node(inventory)?;
            let noise = NoiseGenerator::for_node(config.random_seed, node.id());
            log::info!("Node created: {}", node.id());
            agents.push(NodeAgent::new(node, noise, interval));
        }

        Ok(Self { config, agents })
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.agents.iter().map(NodeAgent::node_id).collect()
    }

    pub fn agents(&self) -> &[NodeAgent] {
        &self.agents
    }

    /// Connect every node to the relay
    ///
    /// If one node cannot connect, the ones already started are stopped.
    pub fn start(&mut self) -> Result<()> {
        log::info!(
            "Starting {} nodes against {}",
            self.agents.len(),
            self.config.server_address
        );

        for i in 0..self.agents.len() {
            if let Err(e) = self.agents[i].connect(self.config.server_address.as_str()) {
                log::error!("Node {} failed to connect: {}", self.agents[i].node_id(), e);
                self.stop();
                return Err(e);
            }
        }

        log::info!("Simulator started");
        Ok(())
    }

    /// Number of agents still streaming
    pub fn running_count(&self) -> usize {
        self.agents
            .iter()
            .filter(|a| a.state() == AgentState::Streaming)
            .count()
    }

    pub fn stop(&mut self) {
        for agent in &mut self.agents {
            agent.stop();
        }
    }
}
